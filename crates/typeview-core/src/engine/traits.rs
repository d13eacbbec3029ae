/*
 * engine/traits.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * TypesetEngine trait definition.
 */

//! TypesetEngine trait for the opaque compile/render capability.

use std::path::Path;

use async_trait::async_trait;
use typeview_error_reporting::DiagnosticSource;

use super::error::EngineError;
use crate::layout;

/// Declared size of one page, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageMeta {
    pub width: f64,
    pub height: f64,
}

/// A compiled document.
///
/// `payload` is engine-owned and only ever handed back to the engine that
/// produced it. `pages` is derived from the page-boundary markers in the
/// document's vector markup.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorDocument {
    pub payload: String,
    pub pages: Vec<PageMeta>,
}

impl VectorDocument {
    /// Wrap vector markup, deriving page metadata from its page markers.
    pub fn from_markup(markup: impl Into<String>) -> Self {
        let payload = markup.into();
        let pages = layout::page_meta(&payload);
        Self { payload, pages }
    }
}

/// What a compile produced: a document, diagnostics, or both.
///
/// A document with only non-blocking diagnostics (warnings) is a success; a
/// missing document is a failure whatever the diagnostics say.
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    pub document: Option<VectorDocument>,
    pub diagnostics: DiagnosticSource,
}

impl CompileOutcome {
    pub fn success(document: VectorDocument) -> Self {
        Self {
            document: Some(document),
            diagnostics: DiagnosticSource::None,
        }
    }

    pub fn failure(diagnostics: DiagnosticSource) -> Self {
        Self {
            document: None,
            diagnostics,
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: DiagnosticSource) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

/// The compile/render engine behind the adapter.
///
/// Engines own a resource namespace: a table of absolute paths (`/main.typ`,
/// `/assets/logo.png`) that compiles read from. All methods take `&self`;
/// implementations use interior mutability for their namespace.
///
/// Callers go through [`super::EngineAdapter`], which guarantees that
/// `bootstrap` runs once and that namespace mutation and compilation are not
/// interleaved.
#[async_trait]
pub trait TypesetEngine: Send + Sync {
    /// Human-readable name for this engine, used in log messages.
    fn name(&self) -> &str;

    /// Load the engine. Called once per session, under a timeout.
    async fn bootstrap(&self) -> Result<(), EngineError>;

    /// Make a font available to subsequent compiles.
    async fn load_font(&self, name: &str, bytes: Vec<u8>) -> Result<(), EngineError>;

    /// Point the engine at a local package registry.
    async fn load_package_registry(&self, path: &Path) -> Result<(), EngineError>;

    /// Upsert a text file into the resource namespace.
    async fn map_text(&self, path: &str, content: &str) -> Result<(), EngineError>;

    /// Upsert a binary file into the resource namespace.
    async fn map_binary(&self, path: &str, bytes: &[u8]) -> Result<(), EngineError>;

    /// Remove a file from the resource namespace. Unknown paths are ignored.
    async fn unmap(&self, path: &str) -> Result<(), EngineError>;

    /// Compile the document at `main_path` in the namespace.
    ///
    /// Malformed input is reported through [`CompileOutcome::diagnostics`],
    /// never as an `Err`.
    async fn compile(&self, main_path: &str) -> Result<CompileOutcome, EngineError>;

    /// Render a compiled document to SVG markup.
    async fn render_svg(&self, document: &VectorDocument) -> Result<String, EngineError>;

    /// Compile the document at `main_path` straight to PDF bytes.
    async fn render_pdf(&self, main_path: &str) -> Result<Vec<u8>, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_document_derives_pages() {
        let doc = VectorDocument::from_markup(
            r#"<svg><g class="typst-page" data-page-width="595" data-page-height="842"/><g class="typst-page" data-page-width="595" data-page-height="421"/></svg>"#,
        );
        assert_eq!(
            doc.pages,
            vec![
                PageMeta {
                    width: 595.0,
                    height: 842.0
                },
                PageMeta {
                    width: 595.0,
                    height: 421.0
                },
            ]
        );
    }

    #[test]
    fn test_vector_document_without_pages() {
        assert!(VectorDocument::from_markup("<svg/>").pages.is_empty());
        assert!(VectorDocument::from_markup("not markup").pages.is_empty());
    }

    #[test]
    fn test_compile_outcome_constructors() {
        let ok = CompileOutcome::success(VectorDocument::from_markup("<svg/>"));
        assert!(ok.document.is_some());
        assert!(ok.diagnostics.is_empty());

        let failed = CompileOutcome::failure(DiagnosticSource::from("main.typ:1:1: error: x"));
        assert!(failed.document.is_none());
        assert!(!failed.diagnostics.is_empty());
    }
}
