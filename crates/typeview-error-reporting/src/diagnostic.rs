//! Core diagnostic types.
//!
//! A [`Diagnostic`] is the only error shape the rest of the pipeline ever sees.
//! Every engine-specific payload is converted into this type by
//! [`crate::normalize`].

use serde::Serialize;
use std::fmt;

/// How serious a diagnostic is.
///
/// Only [`Severity::Error`] blocks rendering. Severity tokens the engine emits
/// that are neither `error` nor `warning` are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// A problem that prevents producing output
    Error,
    /// A problem worth reporting that does not prevent output
    Warning,
    /// Any other engine-reported severity (e.g. `hint`)
    #[serde(untagged)]
    Other(String),
}

impl Severity {
    /// Map an engine severity token onto a [`Severity`].
    ///
    /// ```
    /// use typeview_error_reporting::Severity;
    ///
    /// assert_eq!(Severity::from_token("error"), Severity::Error);
    /// assert_eq!(Severity::from_token("Warning"), Severity::Warning);
    /// assert_eq!(Severity::from_token("hint"), Severity::Other("hint".into()));
    /// ```
    pub fn from_token(token: &str) -> Self {
        if token.eq_ignore_ascii_case("error") {
            Severity::Error
        } else if token.eq_ignore_ascii_case("warning") {
            Severity::Warning
        } else {
            Severity::Other(token.to_string())
        }
    }

    /// Display label, capitalized for the first-class severities.
    pub fn label(&self) -> &str {
        match self {
            Severity::Error => "Error",
            Severity::Warning => "Warning",
            Severity::Other(token) => token,
        }
    }
}

/// A 1-based line/column pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// A normalized compile-time diagnostic.
///
/// `line` and `column` are 1-based. The value 0 in both is the "unlocated"
/// sentinel: the diagnostic is still shown, without a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub line: usize,
    pub column: usize,
    pub message: String,

    /// File the engine attributed the diagnostic to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// End of the reported range, when the engine gave one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<Position>,
}

impl Diagnostic {
    /// Create a located diagnostic.
    pub fn new(severity: Severity, line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            severity,
            line,
            column,
            message: message.into(),
            path: None,
            end: None,
        }
    }

    /// Create an unlocated error.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, 0, 0, message)
    }

    /// Create an unlocated warning.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, 0, 0, message)
    }

    /// The worst-case diagnostic: an input nobody knew how to read.
    pub fn unrecognized(input: impl fmt::Display) -> Self {
        Self::error(format!("unrecognized error: {}", input))
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_end(mut self, line: usize, column: usize) -> Self {
        self.end = Some(Position { line, column });
        self
    }

    /// Whether this diagnostic carries a real position.
    pub fn is_located(&self) -> bool {
        self.line > 0 && self.column > 0
    }

    /// Whether this diagnostic prevents rendering.
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Render as a single human-readable line.
    ///
    /// ```
    /// use typeview_error_reporting::{Diagnostic, Severity};
    ///
    /// let located = Diagnostic::new(Severity::Error, 15, 8, "cannot divide ratio by length");
    /// assert_eq!(located.to_text(), "Error at 15:8: cannot divide ratio by length");
    ///
    /// let unlocated = Diagnostic::warning("font not found");
    /// assert_eq!(unlocated.to_text(), "Warning: font not found");
    /// ```
    pub fn to_text(&self) -> String {
        if self.is_located() {
            format!(
                "{} at {}:{}: {}",
                self.severity.label(),
                self.line,
                self.column,
                self.message
            )
        } else {
            format!("{}: {}", self.severity.label(), self.message)
        }
    }

    /// Render as a JSON value for machine-readable output.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            serde_json::json!({ "severity": self.severity.label(), "message": self.message })
        })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Join diagnostics into the single display string the preview shows.
///
/// One line per diagnostic, in the order given.
pub fn display_string(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(Diagnostic::to_text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whether any diagnostic in the list blocks rendering.
pub fn has_blocking(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_blocking)
}

/// Render diagnostics with ariadne source snippets against `source`.
///
/// Diagnostics that are located and attributed to `file_name` (or to no file)
/// get a snippet; everything else falls back to [`Diagnostic::to_text`].
pub fn render_with_source(diagnostics: &[Diagnostic], source: &str, file_name: &str) -> String {
    let mut result = String::new();
    for diagnostic in diagnostics {
        let belongs_here = diagnostic
            .path
            .as_deref()
            .is_none_or(|p| p.trim_start_matches('/') == file_name.trim_start_matches('/'));

        let rendered = if diagnostic.is_located() && belongs_here {
            render_ariadne(diagnostic, source, file_name)
        } else {
            None
        };

        match rendered {
            Some(snippet) => result.push_str(&snippet),
            None => {
                result.push_str(&diagnostic.to_text());
                result.push('\n');
            }
        }
    }
    result
}

fn render_ariadne(diagnostic: &Diagnostic, source: &str, file_name: &str) -> Option<String> {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let (report_kind, color) = match &diagnostic.severity {
        Severity::Error => (ReportKind::Error, Color::Red),
        Severity::Warning => (ReportKind::Warning, Color::Yellow),
        Severity::Other(_) => (ReportKind::Advice, Color::Cyan),
    };

    let start = char_offset(source, diagnostic.line, diagnostic.column);
    let end = match diagnostic.end {
        Some(end) => char_offset(source, end.line, end.column).max(start),
        None => start,
    };
    // ariadne needs a non-empty span to draw the marker
    let end = if end == start {
        (start + 1).min(source.chars().count())
    } else {
        end
    };

    let file = file_name.to_string();
    let report = Report::build(report_kind, file.clone(), start)
        .with_message(&diagnostic.message)
        .with_label(
            Label::new((file.clone(), start..end))
                .with_message(&diagnostic.message)
                .with_color(color),
        )
        .finish();

    let mut output = Vec::new();
    report
        .write((file, Source::from(source)), &mut output)
        .ok()?;
    String::from_utf8(output).ok()
}

/// Convert a 1-based line/column into a char offset, clamped to the source.
fn char_offset(source: &str, line: usize, column: usize) -> usize {
    let mut offset = 0;
    for (index, text) in source.split('\n').enumerate() {
        let length = text.chars().count();
        if index + 1 == line {
            return offset + column.saturating_sub(1).min(length);
        }
        offset += length + 1;
    }
    source.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_mapping() {
        assert_eq!(Severity::from_token("error"), Severity::Error);
        assert_eq!(Severity::from_token("warning"), Severity::Warning);
        assert_eq!(Severity::from_token("hint"), Severity::Other("hint".into()));
        assert_eq!(Severity::Other("hint".into()).label(), "hint");
    }

    #[test]
    fn test_only_errors_block() {
        assert!(Diagnostic::error("x").is_blocking());
        assert!(!Diagnostic::warning("x").is_blocking());
        assert!(!Diagnostic::new(Severity::Other("hint".into()), 1, 1, "x").is_blocking());
        assert!(has_blocking(&[Diagnostic::warning("a"), Diagnostic::error("b")]));
        assert!(!has_blocking(&[Diagnostic::warning("a")]));
    }

    #[test]
    fn test_unlocated_sentinel() {
        let diag = Diagnostic::error("something broke");
        assert_eq!(diag.line, 0);
        assert_eq!(diag.column, 0);
        assert!(!diag.is_located());
        assert_eq!(diag.to_text(), "Error: something broke");
    }

    #[test]
    fn test_display_string_preserves_order() {
        let diags = vec![
            Diagnostic::new(Severity::Error, 3, 1, "first"),
            Diagnostic::warning("second"),
        ];
        assert_eq!(display_string(&diags), "Error at 3:1: first\nWarning: second");
        assert_eq!(display_string(&[]), "");
    }

    #[test]
    fn test_json_shape() {
        let diag = Diagnostic::new(Severity::Warning, 2, 4, "unused").with_path("/main.typ");
        let json = diag.to_json();
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["line"], 2);
        assert_eq!(json["path"], "/main.typ");
        assert!(json.get("end").is_none());

        let other = Diagnostic::new(Severity::Other("hint".into()), 1, 1, "try this");
        assert_eq!(other.to_json()["severity"], "hint");
    }

    #[test]
    fn test_char_offset() {
        let source = "ab\ncde\nf";
        assert_eq!(char_offset(source, 1, 1), 0);
        assert_eq!(char_offset(source, 2, 2), 4);
        assert_eq!(char_offset(source, 3, 1), 7);
        // Columns past the end of a line clamp to the line end
        assert_eq!(char_offset(source, 1, 99), 2);
        // Lines past the end clamp to the source end
        assert_eq!(char_offset(source, 10, 1), 8);
    }

    #[test]
    fn test_render_with_source_includes_snippet() {
        let source = "= Title\n#let x = 1fr / 1pt\n";
        let diags = vec![
            Diagnostic::new(Severity::Error, 2, 10, "cannot divide ratio by length")
                .with_path("/main.typ"),
            Diagnostic::warning("no position"),
        ];
        let text = render_with_source(&diags, source, "main.typ");
        assert!(text.contains("cannot divide ratio by length"));
        assert!(text.contains("main.typ"));
        assert!(text.contains("Warning: no position"));
    }

    #[test]
    fn test_render_with_source_skips_other_files() {
        let diags = vec![
            Diagnostic::new(Severity::Error, 1, 1, "bad import").with_path("/chapter.typ"),
        ];
        let text = render_with_source(&diags, "= Title", "main.typ");
        assert_eq!(text, "Error at 1:1: bad import\n");
    }
}
