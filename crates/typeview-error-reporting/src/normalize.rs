//! Normalization of engine diagnostics.
//!
//! The typesetting engine reports problems in several shapes depending on how
//! it failed: line-oriented text, a list of structured records, a bare error
//! object, or an exception carrying a message. [`normalize`] flattens all of
//! them into [`Diagnostic`]s. It never fails; input that cannot be understood
//! becomes a single `unrecognized error` diagnostic.

use crate::diagnostic::{Diagnostic, Severity};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Pattern for a single line of engine output:
/// `<path>:<line>:<col>[-<line>:<col>]: <severity>: <message>`
static DIAGNOSTIC_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<path>.*?):(?P<line>\d+):(?P<column>\d+)(?:-(?P<end_line>\d+):(?P<end_column>\d+))?:\s*(?P<severity>[A-Za-z]+):\s?(?P<message>.*)$",
    )
    .expect("diagnostic line pattern is valid")
});

/// Range strings inside structured records, e.g. `15:8-15:20`.
static RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+):(\d+)(?:\s*-\s*(\d+):(\d+))?\s*$").expect("range pattern is valid")
});

/// Raw diagnostic payload as produced by an engine.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticSource {
    /// Nothing was reported.
    None,

    /// Line-oriented text, one diagnostic per line.
    Text(String),

    /// A list of structured records (objects or strings).
    Structured(Vec<Value>),

    /// A bare error object, typically with `message` and/or `diagnostics`.
    Object(Value),

    /// A native exception: a message plus any diagnostics it carried.
    Exception {
        message: String,
        diagnostics: Vec<Value>,
    },
}

impl DiagnosticSource {
    pub fn is_empty(&self) -> bool {
        match self {
            DiagnosticSource::None => true,
            DiagnosticSource::Text(text) => text.trim().is_empty(),
            DiagnosticSource::Structured(items) => items.is_empty(),
            DiagnosticSource::Object(_) | DiagnosticSource::Exception { .. } => false,
        }
    }
}

impl From<String> for DiagnosticSource {
    fn from(text: String) -> Self {
        DiagnosticSource::Text(text)
    }
}

impl From<&str> for DiagnosticSource {
    fn from(text: &str) -> Self {
        DiagnosticSource::Text(text.to_string())
    }
}

/// Convert any engine payload into an ordered list of diagnostics.
///
/// [`DiagnosticSource::None`] and blank text yield an empty list. Every other
/// input yields at least one diagnostic.
///
/// ```
/// use typeview_error_reporting::{normalize, DiagnosticSource, Severity};
///
/// let diags = normalize(&DiagnosticSource::from(
///     "/main.typ:15:8-15:20: error: cannot divide ratio by length",
/// ));
/// assert_eq!(diags.len(), 1);
/// assert_eq!(diags[0].severity, Severity::Error);
/// assert_eq!((diags[0].line, diags[0].column), (15, 8));
/// assert_eq!(diags[0].message, "cannot divide ratio by length");
/// ```
pub fn normalize(source: &DiagnosticSource) -> Vec<Diagnostic> {
    let diagnostics = match source {
        DiagnosticSource::None => return Vec::new(),
        DiagnosticSource::Text(text) => return normalize_text(text),
        DiagnosticSource::Structured(items) => normalize_list(items),
        DiagnosticSource::Object(value) => normalize_object(value),
        DiagnosticSource::Exception {
            message,
            diagnostics,
        } => {
            if diagnostics.is_empty() {
                normalize_text(message)
            } else {
                normalize_list(diagnostics)
            }
        }
    };

    if diagnostics.is_empty() {
        vec![Diagnostic::unrecognized(describe(source))]
    } else {
        diagnostics
    }
}

/// Parse line-oriented engine output. Lines that do not match the expected
/// pattern are kept verbatim as unlocated errors.
pub fn normalize_text(text: &str) -> Vec<Diagnostic> {
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(|line| parse_line(line).unwrap_or_else(|| Diagnostic::error(line)))
        .collect()
}

/// Parse a single `path:line:col: severity: message` line.
pub fn parse_line(line: &str) -> Option<Diagnostic> {
    let caps = DIAGNOSTIC_LINE.captures(line)?;
    let number = |name: &str| caps.name(name).and_then(|m| m.as_str().parse::<usize>().ok());

    let mut diagnostic = Diagnostic::new(
        Severity::from_token(&caps["severity"]),
        number("line")?,
        number("column")?,
        caps["message"].trim(),
    );

    let path = caps["path"].trim();
    if !path.is_empty() {
        diagnostic = diagnostic.with_path(path);
    }
    if let (Some(end_line), Some(end_column)) = (number("end_line"), number("end_column")) {
        diagnostic = diagnostic.with_end(end_line, end_column);
    }
    Some(diagnostic)
}

fn normalize_list(items: &[Value]) -> Vec<Diagnostic> {
    items.iter().flat_map(normalize_item).collect()
}

fn normalize_item(item: &Value) -> Vec<Diagnostic> {
    match item {
        Value::String(text) => {
            let parsed = normalize_text(text);
            if parsed.is_empty() {
                vec![Diagnostic::unrecognized(item)]
            } else {
                parsed
            }
        }
        Value::Object(_) => vec![structured_record(item)],
        _ => vec![Diagnostic::unrecognized(item)],
    }
}

fn normalize_object(value: &Value) -> Vec<Diagnostic> {
    if let Some(items) = value.get("diagnostics").and_then(Value::as_array) {
        if !items.is_empty() {
            return normalize_list(items);
        }
    }
    if let Some(message) = value.get("message").and_then(Value::as_str) {
        return normalize_text(message);
    }
    match value {
        Value::String(text) => normalize_text(text),
        Value::Array(items) => normalize_list(items),
        _ => Vec::new(),
    }
}

/// Convert one structured record. Missing fields fall back to the unlocated
/// sentinel; a missing message falls back to the record's JSON text.
fn structured_record(record: &Value) -> Diagnostic {
    let severity = record
        .get("severity")
        .and_then(Value::as_str)
        .map(Severity::from_token)
        .unwrap_or(Severity::Error);

    let message = match record.get("message").and_then(Value::as_str) {
        Some(message) => message.trim().to_string(),
        None => record.to_string(),
    };

    let mut diagnostic = Diagnostic::new(severity, 0, 0, message);

    let line = record.get("line").and_then(Value::as_u64);
    let column = record.get("column").and_then(Value::as_u64);
    if let (Some(line), Some(column)) = (line, column) {
        diagnostic.line = line as usize;
        diagnostic.column = column as usize;
    } else if let Some(caps) = record
        .get("range")
        .and_then(Value::as_str)
        .and_then(|range| RANGE.captures(range))
    {
        let at = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<usize>().ok());
        if let (Some(line), Some(column)) = (at(1), at(2)) {
            diagnostic.line = line;
            diagnostic.column = column;
        }
        if let (Some(end_line), Some(end_column)) = (at(3), at(4)) {
            diagnostic = diagnostic.with_end(end_line, end_column);
        }
    }

    if let Some(path) = record.get("path").and_then(Value::as_str) {
        diagnostic = diagnostic.with_path(path);
    }
    diagnostic
}

fn describe(source: &DiagnosticSource) -> String {
    match source {
        DiagnosticSource::None => String::new(),
        DiagnosticSource::Text(text) => text.clone(),
        DiagnosticSource::Structured(items) => Value::Array(items.clone()).to_string(),
        DiagnosticSource::Object(value) => value.to_string(),
        DiagnosticSource::Exception { message, .. } => message.clone(),
    }
}
