/*
 * layout.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Page layout compositor: stacks pages, adds backgrounds and shadows.
 */

//! Page layout compositor.
//!
//! The engine emits each page as a group marked with the `typst-page` class
//! and carrying `data-page-width` / `data-page-height`. [`composite`] turns
//! that into a continuous-scroll sheet stack:
//!
//! - a shared drop-shadow filter in a leading `<defs>`
//! - an opaque background rectangle as each page's first child
//! - for more than one page, pages translated down by their running offset
//!   plus a fixed gap, and the document's height grown to fit
//!
//! Compositing never fails. Markup without page markers is returned
//! byte-for-byte, and markup that cannot be processed is returned unmodified.

use typeview_xml::{XmlDocument, XmlElement, XmlNode};

use crate::engine::PageMeta;

/// Class marking a page group in engine output.
pub const PAGE_CLASS: &str = "typst-page";

/// Class given to synthesized page backgrounds.
pub const BACKGROUND_CLASS: &str = "page-background";

/// Id of the shared drop-shadow filter.
pub const SHADOW_FILTER_ID: &str = "page-shadow";

/// Default vertical gap between pages, in points.
pub const DEFAULT_PAGE_GAP: f64 = 20.0;

/// Where one page ended up in the composited document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PagePlacement {
    /// Vertical offset of the page's top edge.
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Display-ready output of a compile.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutResult {
    pub markup: String,
    pub total_width: f64,
    pub total_height: f64,
    /// Placements in document order; empty when no pages were composited.
    pub pages: Vec<PagePlacement>,
}

impl LayoutResult {
    /// Wrap markup that was not composited.
    fn passthrough(markup: &str) -> Self {
        let (total_width, total_height) = typeview_xml::parse(markup)
            .map(|doc| declared_size(&doc.root))
            .unwrap_or((0.0, 0.0));
        Self {
            markup: markup.to_string(),
            total_width,
            total_height,
            pages: Vec::new(),
        }
    }
}

/// Composite engine markup into a stacked, decorated page layout.
///
/// ```
/// use typeview_core::layout::composite;
///
/// let svg = r#"<svg viewBox="0 0 100 200" height="200"><g class="typst-page" data-page-width="100" data-page-height="100"/><g class="typst-page" transform="translate(0, 100)" data-page-width="100" data-page-height="100"/></svg>"#;
/// let layout = composite(svg, 20.0);
/// assert_eq!(layout.total_height, 220.0);
/// assert_eq!(layout.pages[1].y, 120.0);
/// ```
pub fn composite(markup: &str, gap: f64) -> LayoutResult {
    match try_composite(markup, gap) {
        Ok(Some(result)) => result,
        Ok(None) => LayoutResult::passthrough(markup),
        Err(e) => {
            tracing::warn!(error = %e, "Page compositing failed; showing undecorated output");
            LayoutResult::passthrough(markup)
        }
    }
}

fn try_composite(markup: &str, gap: f64) -> typeview_xml::Result<Option<LayoutResult>> {
    let mut doc = typeview_xml::parse(markup)?;

    let page_count = doc
        .root
        .descendants_with_class(PAGE_CLASS)
        .into_iter()
        .filter(|page| page_size(page).is_some())
        .count();
    if page_count == 0 {
        return Ok(None);
    }
    let multi_page = page_count > 1;

    doc.root.prepend_child(XmlNode::Element(
        XmlElement::new("defs").with_child(shadow_filter()),
    ));

    let mut offset = 0.0;
    let mut placements = Vec::with_capacity(page_count);
    doc.root.for_each_descendant_mut(&mut |element| {
        if !element.has_class(PAGE_CLASS) {
            return;
        }
        let Some(meta) = page_size(element) else {
            return;
        };

        element.prepend_child(XmlNode::Element(background(meta)));
        element.set_attribute("filter", format!("url(#{})", SHADOW_FILTER_ID));

        let y = if multi_page {
            element.set_attribute("transform", format!("translate(0, {})", offset));
            offset
        } else {
            translate_y(element.get_attribute("transform")).unwrap_or(0.0)
        };
        placements.push(PagePlacement {
            y,
            width: meta.width,
            height: meta.height,
        });
        offset += meta.height + gap;
    });

    let (declared_width, declared_height) = declared_size(&doc.root);
    let total_width = if declared_width > 0.0 {
        declared_width
    } else {
        placements.iter().map(|p| p.width).fold(0.0, f64::max)
    };
    let total_height = if multi_page {
        let total = offset - gap;
        resize_height(&mut doc, total_width, total);
        total
    } else if declared_height > 0.0 {
        declared_height
    } else {
        placements[0].height
    };

    Ok(Some(LayoutResult {
        markup: doc.to_xml_string(),
        total_width,
        total_height,
        pages: placements,
    }))
}

/// Page sizes declared by the page markers in `markup`, in document order.
///
/// Pages with a missing or non-positive size are skipped.
pub fn page_meta(markup: &str) -> Vec<PageMeta> {
    let Ok(doc) = typeview_xml::parse(markup) else {
        return Vec::new();
    };
    doc.root
        .descendants_with_class(PAGE_CLASS)
        .into_iter()
        .filter_map(page_size)
        .collect()
}

fn page_size(page: &XmlElement) -> Option<PageMeta> {
    let dimension = |name: &str| {
        page.get_attribute(name)
            .and_then(parse_number)
            .filter(|value| value.is_finite() && *value > 0.0)
    };
    Some(PageMeta {
        width: dimension("data-page-width")?,
        height: dimension("data-page-height")?,
    })
}

fn shadow_filter() -> XmlElement {
    XmlElement::new("filter")
        .with_attribute("id", SHADOW_FILTER_ID)
        .with_attribute("x", "-10%")
        .with_attribute("y", "-10%")
        .with_attribute("width", "120%")
        .with_attribute("height", "120%")
        .with_child(
            XmlElement::new("feDropShadow")
                .with_attribute("dx", "0")
                .with_attribute("dy", "2")
                .with_attribute("stdDeviation", "4")
                .with_attribute("flood-opacity", "0.15"),
        )
}

fn background(meta: PageMeta) -> XmlElement {
    XmlElement::new("rect")
        .with_attribute("x", "0")
        .with_attribute("y", "0")
        .with_attribute("width", meta.width.to_string())
        .with_attribute("height", meta.height.to_string())
        .with_attribute("fill", "white")
        .with_attribute("class", BACKGROUND_CLASS)
}

/// Set the root's viewBox height and `height` attribute to `total`.
fn resize_height(doc: &mut XmlDocument, width: f64, total: f64) {
    let root = &mut doc.root;
    let view_box = root.get_attribute("viewBox").and_then(parse_view_box);
    let rewritten = match view_box {
        Some([min_x, min_y, view_width, _]) => {
            format!("{} {} {} {}", min_x, min_y, view_width, total)
        }
        None => format!("0 0 {} {}", width, total),
    };
    root.set_attribute("viewBox", rewritten);

    // Keep any unit suffix on the declared height, e.g. "pt"
    let unit = root
        .get_attribute("height")
        .map(|height| height.trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == '-'))
        .unwrap_or("")
        .to_string();
    root.set_attribute("height", format!("{}{}", total, unit));
}

/// The document's declared size: viewBox first, then width/height attributes.
pub(crate) fn declared_size(root: &XmlElement) -> (f64, f64) {
    if let Some([_, _, width, height]) = root.get_attribute("viewBox").and_then(parse_view_box) {
        return (width, height);
    }
    let attribute = |name: &str| root.get_attribute(name).and_then(parse_number).unwrap_or(0.0);
    (attribute("width"), attribute("height"))
}

fn parse_view_box(value: &str) -> Option<[f64; 4]> {
    let numbers: Vec<f64> = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<f64>().ok())
        .collect::<Option<Vec<_>>>()?;
    numbers.try_into().ok()
}

/// Parse a number with an optional unit suffix (`841.89pt`).
pub(crate) fn parse_number(value: &str) -> Option<f64> {
    let value = value.trim();
    let end = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+' || c == 'e' || c == 'E'))
        .unwrap_or(value.len());
    value[..end].parse().ok()
}

/// Vertical component of a `translate(x, y)` transform.
pub(crate) fn translate_y(transform: Option<&str>) -> Option<f64> {
    let transform = transform?;
    let start = transform.find("translate(")? + "translate(".len();
    let end = start + transform[start..].find(')')?;
    let mut parts = transform[start..end]
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty());
    let _x = parts.next()?;
    match parts.next() {
        Some(y) => y.parse().ok(),
        None => Some(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(width: f64, height: f64) -> String {
        format!(
            r#"<g class="typst-page" transform="translate(0, 0)" data-page-width="{}" data-page-height="{}"><path d="M0 0"/></g>"#,
            width, height
        )
    }

    fn document(pages: &[(f64, f64)]) -> String {
        let width = pages.iter().map(|p| p.0).fold(0.0, f64::max);
        let height: f64 = pages.iter().map(|p| p.1).sum();
        let body: String = pages.iter().map(|&(w, h)| page(w, h)).collect();
        format!(
            r#"<svg class="typst-doc" viewBox="0 0 {w} {h}" width="{w}" height="{h}" xmlns="http://www.w3.org/2000/svg">{body}</svg>"#,
            w = width,
            h = height,
            body = body
        )
    }

    fn backgrounds(markup: &str) -> Vec<(String, String)> {
        let doc = typeview_xml::parse(markup).unwrap();
        doc.root
            .descendants_with_class(BACKGROUND_CLASS)
            .iter()
            .map(|rect| {
                (
                    rect.get_attribute("width").unwrap().to_string(),
                    rect.get_attribute("height").unwrap().to_string(),
                )
            })
            .collect()
    }

    #[test]
    fn test_three_pages_total_height() {
        let layout = composite(&document(&[(600.0, 800.0), (600.0, 600.0), (600.0, 800.0)]), 20.0);

        assert_eq!(layout.total_height, 3040.0);
        assert_eq!(layout.total_width, 600.0);
        let offsets: Vec<f64> = layout.pages.iter().map(|p| p.y).collect();
        assert_eq!(offsets, vec![0.0, 820.0, 1440.0]);

        let doc = typeview_xml::parse(&layout.markup).unwrap();
        assert_eq!(doc.root.get_attribute("viewBox"), Some("0 0 600 3040"));
        assert_eq!(doc.root.get_attribute("height"), Some("3040"));

        let transforms: Vec<_> = doc
            .root
            .descendants_with_class(PAGE_CLASS)
            .iter()
            .map(|p| p.get_attribute("transform").unwrap().to_string())
            .collect();
        assert_eq!(
            transforms,
            vec!["translate(0, 0)", "translate(0, 820)", "translate(0, 1440)"]
        );
    }

    #[test]
    fn test_heterogeneous_page_sizes_get_own_backgrounds() {
        let layout = composite(&document(&[(600.0, 800.0), (400.0, 300.0)]), 10.0);
        assert_eq!(
            backgrounds(&layout.markup),
            vec![
                ("600".to_string(), "800".to_string()),
                ("400".to_string(), "300".to_string())
            ]
        );
        assert_eq!(layout.total_height, 1110.0);
        // Width stays as declared
        assert_eq!(layout.total_width, 600.0);
    }

    #[test]
    fn test_single_page_background() {
        let layout = composite(&document(&[(595.0, 842.0)]), 20.0);
        assert_eq!(backgrounds(&layout.markup), vec![("595".to_string(), "842".to_string())]);
        assert_eq!(layout.total_height, 842.0);
        assert_eq!(layout.pages.len(), 1);

        let doc = typeview_xml::parse(&layout.markup).unwrap();
        // Shadow definition comes first, the page references it
        let defs = doc.root.elements().next().unwrap();
        assert_eq!(defs.name, "defs");
        assert_eq!(defs.get_children("filter")[0].get_attribute("id"), Some(SHADOW_FILTER_ID));
        let page = doc.root.descendants_with_class(PAGE_CLASS)[0];
        assert_eq!(page.get_attribute("filter"), Some("url(#page-shadow)"));
        // Background is drawn beneath existing content
        assert!(page.elements().next().unwrap().has_class(BACKGROUND_CLASS));
        // Single pages keep their size and transform
        assert_eq!(doc.root.get_attribute("viewBox"), Some("0 0 595 842"));
    }

    #[test]
    fn test_multi_page_shares_one_filter() {
        let layout = composite(&document(&[(100.0, 100.0), (100.0, 100.0)]), 20.0);
        let doc = typeview_xml::parse(&layout.markup).unwrap();
        let filters: Vec<_> = doc
            .root
            .descendants()
            .into_iter()
            .filter(|e| e.name == "filter")
            .collect();
        assert_eq!(filters.len(), 1);
    }

    #[test]
    fn test_no_markers_is_byte_identical() {
        let markup = r#"<svg viewBox="0 0 10 10"><rect  width="10" height='10'/></svg>"#;
        let layout = composite(markup, 20.0);
        assert_eq!(layout.markup, markup);
        assert!(layout.pages.is_empty());
        assert_eq!(layout.total_width, 10.0);
    }

    #[test]
    fn test_malformed_markup_falls_back() {
        let markup = r#"<svg><g class="typst-page" data-page-width="1" data-page-height="1"></svg>"#;
        let layout = composite(markup, 20.0);
        assert_eq!(layout.markup, markup);
        assert!(layout.pages.is_empty());
    }

    #[test]
    fn test_pages_without_size_are_skipped() {
        let markup = r#"<svg viewBox="0 0 10 10"><g class="typst-page"/></svg>"#;
        assert_eq!(composite(markup, 20.0).markup, markup);
    }

    #[test]
    fn test_height_unit_suffix_is_kept() {
        let markup = format!(
            r#"<svg viewBox="0 0 100 200" height="200pt">{}{}</svg>"#,
            page(100.0, 100.0),
            page(100.0, 100.0)
        );
        let layout = composite(&markup, 5.0);
        let doc = typeview_xml::parse(&layout.markup).unwrap();
        assert_eq!(doc.root.get_attribute("height"), Some("205pt"));
    }

    #[test]
    fn test_translate_y() {
        assert_eq!(translate_y(Some("translate(0, 820)")), Some(820.0));
        assert_eq!(translate_y(Some("translate(5 12.5)")), Some(12.5));
        assert_eq!(translate_y(Some("translate(5)")), Some(0.0));
        assert_eq!(translate_y(Some("scale(2)")), None);
        assert_eq!(translate_y(None), None);
    }

    #[test]
    fn test_parse_number_with_units() {
        assert_eq!(parse_number("841.89pt"), Some(841.89));
        assert_eq!(parse_number(" 20 "), Some(20.0));
        assert_eq!(parse_number("auto"), None);
    }
}
