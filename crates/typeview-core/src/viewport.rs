/*
 * viewport.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Zoom state and jump-to-location navigation.
 */

//! Zoom state and in-document navigation.
//!
//! Rendered documents embed links whose activation supplies a target page
//! (1-based) and an `(x, y)` offset within that page. A [`Viewport`] binds to
//! composited markup, capturing each page's vertical placement and the
//! current zoom scale, and turns such a link into a scroll offset on its
//! [`ScrollSurface`]. Changing the zoom re-binds with the new scale.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{ConfigError, PreviewConfig, validate_zoom};
use crate::layout::{self, LayoutResult, PAGE_CLASS};

/// `handleTypstLocation(this, page, x, y)` as emitted in link handlers.
static LOCATION_HANDLER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"handleTypstLocation\(\s*this\s*,\s*(?P<page>-?\d+)\s*,\s*(?P<x>[-+0-9.eE]+)\s*,\s*(?P<y>[-+0-9.eE]+)\s*\)",
    )
    .expect("location handler regex is valid")
});

/// Discrete zoom levels with a current and a default level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoomState {
    levels: Vec<u32>,
    default_index: usize,
    index: usize,
}

impl ZoomState {
    /// Create a zoom state. `levels` must be ascending and contain `default`.
    pub fn new(levels: Vec<u32>, default: u32) -> Result<Self, ConfigError> {
        validate_zoom(&levels, default)?;
        let default_index = levels
            .iter()
            .position(|level| *level == default)
            .ok_or_else(|| ConfigError::Invalid(format!("default_zoom {} missing", default)))?;
        Ok(Self {
            levels,
            default_index,
            index: default_index,
        })
    }

    pub fn from_config(config: &PreviewConfig) -> Result<Self, ConfigError> {
        Self::new(config.zoom_levels.clone(), config.default_zoom)
    }

    /// Current zoom percentage.
    pub fn current(&self) -> u32 {
        self.levels[self.index]
    }

    pub fn default_level(&self) -> u32 {
        self.levels[self.default_index]
    }

    pub fn levels(&self) -> &[u32] {
        &self.levels
    }

    /// Move one level up. A no-op at the highest level.
    pub fn zoom_in(&mut self) -> u32 {
        if self.can_zoom_in() {
            self.index += 1;
        }
        self.current()
    }

    /// Move one level down. A no-op at the lowest level.
    pub fn zoom_out(&mut self) -> u32 {
        if self.can_zoom_out() {
            self.index -= 1;
        }
        self.current()
    }

    /// Return to the default level.
    pub fn reset(&mut self) -> u32 {
        self.index = self.default_index;
        self.current()
    }

    /// Jump to `level` if it is one of the levels.
    pub fn set(&mut self, level: u32) -> bool {
        match self.levels.iter().position(|l| *l == level) {
            Some(index) => {
                self.index = index;
                true
            }
            None => false,
        }
    }

    pub fn can_zoom_in(&self) -> bool {
        self.index + 1 < self.levels.len()
    }

    pub fn can_zoom_out(&self) -> bool {
        self.index > 0
    }

    /// Display scale factor (`150%` → `1.5`).
    pub fn scale(&self) -> f64 {
        f64::from(self.current()) / 100.0
    }

    /// Human-readable level, e.g. `150%`.
    pub fn label(&self) -> String {
        format!("{}%", self.current())
    }
}

impl Default for ZoomState {
    fn default() -> Self {
        let config = PreviewConfig::default();
        let default_index = config
            .zoom_levels
            .iter()
            .position(|level| *level == config.default_zoom)
            .unwrap_or(0);
        Self {
            levels: config.zoom_levels,
            default_index,
            index: default_index,
        }
    }
}

/// How a scroll request should be animated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    Smooth,
    Instant,
}

/// The scroll container a viewport drives.
pub trait ScrollSurface {
    /// Scroll so that `top` (in scaled units) is at the top of the view.
    fn scroll_to(&mut self, top: f64, behavior: ScrollBehavior);
}

/// An intra-document link target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationLink {
    /// 1-based page index.
    pub page: i64,
    pub x: f64,
    pub y: f64,
}

/// Location links embedded in rendered markup, in document order.
pub fn extract_location_links(markup: &str) -> Vec<LocationLink> {
    LOCATION_HANDLER
        .captures_iter(markup)
        .filter_map(|caps| {
            Some(LocationLink {
                page: caps["page"].parse().ok()?,
                x: caps["x"].parse().ok()?,
                y: caps["y"].parse().ok()?,
            })
        })
        .collect()
}

/// Vertical placement of each page in composited markup, read back from the
/// page transforms.
pub fn page_offsets(markup: &str) -> Vec<f64> {
    let Ok(doc) = typeview_xml::parse(markup) else {
        return Vec::new();
    };
    doc.root
        .descendants_with_class(PAGE_CLASS)
        .into_iter()
        .map(|page| layout::translate_y(page.get_attribute("transform")).unwrap_or(0.0))
        .collect()
}

/// Page offsets and the zoom scale captured when a viewport was bound.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationBinding {
    pub scale: f64,
    pub offsets: Vec<f64>,
}

impl NavigationBinding {
    pub fn bind(markup: &str, scale: f64) -> Self {
        Self {
            scale,
            offsets: page_offsets(markup),
        }
    }

    /// Scroll offset for a link, or `None` if its page is out of range.
    pub fn resolve(&self, link: &LocationLink) -> Option<f64> {
        if link.page < 1 {
            return None;
        }
        let index = usize::try_from(link.page - 1).ok()?;
        let offset = self.offsets.get(index)?;
        Some((offset + link.y) * self.scale)
    }

    pub fn page_count(&self) -> usize {
        self.offsets.len()
    }
}

/// Zoom plus navigation over one scroll surface.
pub struct Viewport<S: ScrollSurface> {
    zoom: ZoomState,
    surface: S,
    markup: Option<String>,
    binding: Option<NavigationBinding>,
}

impl<S: ScrollSurface> Viewport<S> {
    pub fn new(zoom: ZoomState, surface: S) -> Self {
        Self {
            zoom,
            surface,
            markup: None,
            binding: None,
        }
    }

    pub fn zoom(&self) -> &ZoomState {
        &self.zoom
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn binding(&self) -> Option<&NavigationBinding> {
        self.binding.as_ref()
    }

    /// Bind navigation to freshly rendered markup.
    pub fn bind(&mut self, markup: &str) {
        let binding = NavigationBinding::bind(markup, self.zoom.scale());
        tracing::debug!(pages = binding.page_count(), scale = binding.scale, "Bound navigation");
        self.markup = Some(markup.to_string());
        self.binding = Some(binding);
    }

    /// Tear down navigation; later jumps are ignored until the next bind.
    pub fn unbind(&mut self) {
        self.markup = None;
        self.binding = None;
    }

    pub fn zoom_in(&mut self) -> u32 {
        let level = self.zoom.zoom_in();
        self.rebind();
        level
    }

    pub fn zoom_out(&mut self) -> u32 {
        let level = self.zoom.zoom_out();
        self.rebind();
        level
    }

    pub fn zoom_reset(&mut self) -> u32 {
        let level = self.zoom.reset();
        self.rebind();
        level
    }

    pub fn set_zoom(&mut self, level: u32) -> bool {
        let changed = self.zoom.set(level);
        if changed {
            self.rebind();
        }
        changed
    }

    fn rebind(&mut self) {
        if let Some(markup) = self.markup.take() {
            self.bind(&markup);
        }
    }

    /// Scroll smoothly to a link target. Returns `false`, leaving the scroll
    /// position alone, if nothing is bound or the page is out of range.
    pub fn jump(&mut self, link: &LocationLink) -> bool {
        let Some(top) = self.binding.as_ref().and_then(|binding| binding.resolve(link)) else {
            tracing::debug!(page = link.page, "Ignoring jump to unknown page");
            return false;
        };
        self.surface.scroll_to(top, ScrollBehavior::Smooth);
        true
    }

    /// On-screen size of a layout at the current zoom.
    pub fn effective_box(&self, layout: &LayoutResult) -> (f64, f64) {
        let scale = self.zoom.scale();
        (layout.total_width * scale, layout.total_height * scale)
    }
}
