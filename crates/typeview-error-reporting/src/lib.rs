//! Diagnostic normalization and reporting for typeview.
//!
//! This crate turns whatever the typesetting engine reports (line-oriented
//! text, structured records, error objects) into a single [`Diagnostic`] shape,
//! and renders diagnostics for humans: a one-line-per-diagnostic display
//! string for the preview, and ariadne source snippets for the terminal.
//!
//! # Example
//!
//! ```
//! use typeview_error_reporting::{display_string, normalize, DiagnosticSource};
//!
//! let diags = normalize(&DiagnosticSource::from(
//!     "/main.typ:15:8-15:20: error: cannot divide ratio by length",
//! ));
//! assert_eq!(display_string(&diags), "Error at 15:8: cannot divide ratio by length");
//! ```

pub mod diagnostic;
pub mod normalize;

pub use diagnostic::{
    Diagnostic, Position, Severity, display_string, has_blocking, render_with_source,
};
pub use normalize::{DiagnosticSource, normalize, normalize_text, parse_line};
