//! Inspect command - show page placements and link targets

use std::path::PathBuf;

use anyhow::{Result, bail};
use serde::Serialize;
use typeview_core::viewport::extract_location_links;
use typeview_core::{
    Commit, CompileStatus, LayoutResult, LocationLink, ScrollBehavior, ScrollSurface, Viewport,
};

use super::{EngineArgs, open_session, report_diagnostics};

pub struct InspectArgs {
    pub dir: PathBuf,
    pub zoom: Option<u32>,
    pub json: bool,
    pub engine: EngineArgs,
}

pub fn execute(args: InspectArgs) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(inspect(args))
}

/// Records scroll requests instead of performing them.
#[derive(Debug, Default)]
struct ScrollLog {
    last: Option<f64>,
}

impl ScrollSurface for ScrollLog {
    fn scroll_to(&mut self, top: f64, _behavior: ScrollBehavior) {
        self.last = Some(top);
    }
}

#[derive(Debug, Serialize)]
struct Report {
    zoom: u32,
    total_width: f64,
    total_height: f64,
    effective_width: f64,
    effective_height: f64,
    pages: Vec<PageReport>,
    links: Vec<LinkReport>,
    warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
struct PageReport {
    page: usize,
    y: f64,
    width: f64,
    height: f64,
}

#[derive(Debug, Serialize)]
struct LinkReport {
    page: i64,
    x: f64,
    y: f64,
    /// Scroll offset at the inspected zoom, if the page exists.
    scroll_top: Option<f64>,
}

async fn inspect(args: InspectArgs) -> Result<()> {
    let session = open_session(&args.dir, &args.engine)?;
    let source = session.start().await?;

    let commit = session.compile(&source).await;
    let state = session.compile_state();
    if commit != Commit::Applied(CompileStatus::Succeeded) {
        report_diagnostics(&state, &source, &session.config().main_file);
        bail!("Compilation failed");
    }
    let Some(layout) = state.output.as_ref() else {
        bail!("Compilation produced no output");
    };

    let mut viewport = session.viewport(ScrollLog::default())?;
    if let Some(level) = args.zoom {
        if !viewport.set_zoom(level) {
            bail!(
                "Zoom {}% is not one of the configured levels {:?}",
                level,
                viewport.zoom().levels()
            );
        }
    }

    let mut report = build_report(&mut viewport, layout);
    report.warnings = state.warnings.iter().map(|w| w.to_text()).collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn build_report(viewport: &mut Viewport<ScrollLog>, layout: &LayoutResult) -> Report {
    viewport.bind(&layout.markup);
    let (effective_width, effective_height) = viewport.effective_box(layout);

    let pages = layout
        .pages
        .iter()
        .enumerate()
        .map(|(index, placement)| PageReport {
            page: index + 1,
            y: placement.y,
            width: placement.width,
            height: placement.height,
        })
        .collect();

    let links = extract_location_links(&layout.markup)
        .into_iter()
        .map(|link: LocationLink| LinkReport {
            page: link.page,
            x: link.x,
            y: link.y,
            scroll_top: resolve(viewport, &link),
        })
        .collect();

    Report {
        zoom: viewport.zoom().current(),
        total_width: layout.total_width,
        total_height: layout.total_height,
        effective_width,
        effective_height,
        pages,
        links,
        warnings: Vec::new(),
    }
}

fn resolve(viewport: &mut Viewport<ScrollLog>, link: &LocationLink) -> Option<f64> {
    if viewport.jump(link) {
        viewport.surface().last
    } else {
        None
    }
}

fn print_report(report: &Report) {
    println!(
        "Document: {} x {} pt, {} x {} at {}%",
        report.total_width,
        report.total_height,
        report.effective_width,
        report.effective_height,
        report.zoom
    );
    println!();
    println!("Pages ({}):", report.pages.len());
    for page in &report.pages {
        println!(
            "  {:>3}  y={:<10} {} x {}",
            page.page, page.y, page.width, page.height
        );
    }
    if !report.links.is_empty() {
        println!();
        println!("Links ({}):", report.links.len());
        for link in &report.links {
            match link.scroll_top {
                Some(top) => println!(
                    "  page {} ({}, {}) -> scroll {}",
                    link.page, link.x, link.y, top
                ),
                None => println!("  page {} ({}, {}) -> out of range", link.page, link.x, link.y),
            }
        }
    }
    for warning in &report.warnings {
        eprintln!("{}", warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use typeview_core::ZoomState;
    use typeview_core::layout::composite;

    const MARKUP: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 200" width="100" height="200"><g class="typst-page" data-page-width="100" data-page-height="100"><a onclick="handleTypstLocation(this, 2, 5, 10)"/><a onclick="handleTypstLocation(this, 9, 0, 0)"/></g><g class="typst-page" transform="translate(0, 100)" data-page-width="100" data-page-height="100"/></svg>"#;

    #[test]
    fn test_report_places_pages_and_resolves_links() {
        let layout = composite(MARKUP, 20.0);
        let zoom = ZoomState::new(vec![100, 200], 200).unwrap();
        let mut viewport = Viewport::new(zoom, ScrollLog::default());

        let report = build_report(&mut viewport, &layout);
        assert_eq!(report.zoom, 200);
        assert_eq!(report.pages.len(), 2);
        assert_eq!(report.pages[1].y, 120.0);
        assert_eq!(
            (report.effective_width, report.effective_height),
            (layout.total_width * 2.0, layout.total_height * 2.0)
        );

        assert_eq!(report.links.len(), 2);
        assert_eq!(report.links[0].scroll_top, Some((120.0 + 10.0) * 2.0));
        assert_eq!(report.links[1].scroll_top, None);
    }
}
