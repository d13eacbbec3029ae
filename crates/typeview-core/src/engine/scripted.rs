/*
 * engine/scripted.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Scripted in-memory engine for tests and demos.
 */

//! An in-memory [`TypesetEngine`] whose behavior is scripted per source.
//!
//! Compiles look up the current content of the main document and answer
//! with the matching [`ScriptedCompile`], after its delay. Delays use
//! `tokio::time`, so tests can run them under paused time.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use typeview_error_reporting::DiagnosticSource;

use super::error::EngineError;
use super::traits::{CompileOutcome, TypesetEngine, VectorDocument};
use crate::layout::PAGE_CLASS;

/// Default PDF bytes returned by [`ScriptedEngine::render_pdf`].
pub const SCRIPTED_PDF: &[u8] = b"%PDF-1.7\n%scripted\n%%EOF\n";

/// How [`ScriptedEngine::bootstrap`] behaves.
#[derive(Debug, Clone, Default)]
pub enum ScriptedBootstrap {
    #[default]
    Ok,
    Fail(String),
    /// Never completes.
    Hang,
}

/// What a compile produces.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    /// A document with pages of the given `(width, height)`.
    Pages(Vec<(f64, f64)>),
    /// A document plus non-blocking diagnostics.
    Warnings(Vec<(f64, f64)>, DiagnosticSource),
    /// No document, only diagnostics.
    Diagnostics(DiagnosticSource),
    /// The engine itself fails.
    Fail(String),
}

/// A scripted compile: an outcome delivered after a delay.
#[derive(Debug, Clone)]
pub struct ScriptedCompile {
    pub delay: Duration,
    pub outcome: ScriptedOutcome,
}

impl ScriptedCompile {
    pub fn new(outcome: ScriptedOutcome) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Default for ScriptedCompile {
    fn default() -> Self {
        Self::new(ScriptedOutcome::Pages(vec![(595.0, 842.0)]))
    }
}

/// Markup for a document with the given page sizes, in the shape compiled
/// documents take.
pub fn page_markup(pages: &[(f64, f64)]) -> String {
    let mut offset = 0.0;
    let mut width: f64 = 0.0;
    let mut groups = String::new();
    for (w, h) in pages {
        groups.push_str(&format!(
            r#"<g class="{}" transform="translate(0, {})" data-page-width="{}" data-page-height="{}"><text>page</text></g>"#,
            PAGE_CLASS, offset, w, h
        ));
        offset += h;
        width = width.max(*w);
    }
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" class="typst-doc" viewBox="0 0 {w} {h}" width="{w}" height="{h}">{groups}</svg>"#,
        w = width,
        h = offset,
        groups = groups
    )
}

#[derive(Default)]
struct Namespace {
    text: HashMap<String, String>,
    binary: HashMap<String, Vec<u8>>,
}

/// Engine with scripted behavior and call counters.
#[derive(Default)]
pub struct ScriptedEngine {
    bootstrap: ScriptedBootstrap,
    bootstrap_delay: Duration,
    rules: HashMap<String, ScriptedCompile>,
    fallback: ScriptedCompile,
    render_failure: Option<String>,
    pdf: Option<Result<Vec<u8>, String>>,
    package_failure: Option<String>,
    namespace: Mutex<Namespace>,
    fonts: Mutex<Vec<String>>,
    compiled: Mutex<Vec<String>>,
    bootstrap_calls: AtomicUsize,
    compile_calls: AtomicUsize,
    pdf_calls: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bootstrap(mut self, bootstrap: ScriptedBootstrap) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_bootstrap_delay(mut self, delay: Duration) -> Self {
        self.bootstrap_delay = delay;
        self
    }

    /// Script the compile of an exact main-document source.
    pub fn on_source(mut self, source: &str, compile: ScriptedCompile) -> Self {
        self.rules.insert(source.to_string(), compile);
        self
    }

    /// Script every compile without a matching rule.
    pub fn on_any_source(mut self, compile: ScriptedCompile) -> Self {
        self.fallback = compile;
        self
    }

    pub fn with_render_failure(mut self, message: &str) -> Self {
        self.render_failure = Some(message.to_string());
        self
    }

    pub fn with_pdf(mut self, bytes: Vec<u8>) -> Self {
        self.pdf = Some(Ok(bytes));
        self
    }

    pub fn with_pdf_failure(mut self, message: &str) -> Self {
        self.pdf = Some(Err(message.to_string()));
        self
    }

    pub fn with_package_failure(mut self, message: &str) -> Self {
        self.package_failure = Some(message.to_string());
        self
    }

    pub fn bootstrap_calls(&self) -> usize {
        self.bootstrap_calls.load(Ordering::SeqCst)
    }

    pub fn compile_calls(&self) -> usize {
        self.compile_calls.load(Ordering::SeqCst)
    }

    pub fn pdf_calls(&self) -> usize {
        self.pdf_calls.load(Ordering::SeqCst)
    }

    /// Main-document sources in the order they were compiled.
    pub fn compiled_sources(&self) -> Vec<String> {
        self.compiled.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn fonts(&self) -> Vec<String> {
        self.fonts.lock().map(|f| f.clone()).unwrap_or_default()
    }

    pub fn text_file(&self, path: &str) -> Option<String> {
        self.namespace.lock().ok()?.text.get(path).cloned()
    }

    pub fn binary_file(&self, path: &str) -> Option<Vec<u8>> {
        self.namespace.lock().ok()?.binary.get(path).cloned()
    }

    fn lock_namespace(&self) -> Result<std::sync::MutexGuard<'_, Namespace>, EngineError> {
        self.namespace
            .lock()
            .map_err(|_| EngineError::other("namespace lock poisoned"))
    }
}

#[async_trait]
impl TypesetEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn bootstrap(&self) -> Result<(), EngineError> {
        self.bootstrap_calls.fetch_add(1, Ordering::SeqCst);
        if !self.bootstrap_delay.is_zero() {
            tokio::time::sleep(self.bootstrap_delay).await;
        }
        match &self.bootstrap {
            ScriptedBootstrap::Ok => Ok(()),
            ScriptedBootstrap::Fail(message) => Err(EngineError::bootstrap(message.clone())),
            ScriptedBootstrap::Hang => std::future::pending().await,
        }
    }

    async fn load_font(&self, name: &str, _bytes: Vec<u8>) -> Result<(), EngineError> {
        if let Ok(mut fonts) = self.fonts.lock() {
            fonts.push(name.to_string());
        }
        Ok(())
    }

    async fn load_package_registry(&self, _path: &Path) -> Result<(), EngineError> {
        match &self.package_failure {
            Some(message) => Err(EngineError::other(message.clone())),
            None => Ok(()),
        }
    }

    async fn map_text(&self, path: &str, content: &str) -> Result<(), EngineError> {
        self.lock_namespace()?
            .text
            .insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn map_binary(&self, path: &str, bytes: &[u8]) -> Result<(), EngineError> {
        self.lock_namespace()?
            .binary
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn unmap(&self, path: &str) -> Result<(), EngineError> {
        let mut namespace = self.lock_namespace()?;
        namespace.text.remove(path);
        namespace.binary.remove(path);
        Ok(())
    }

    async fn compile(&self, main_path: &str) -> Result<CompileOutcome, EngineError> {
        self.compile_calls.fetch_add(1, Ordering::SeqCst);
        let source = self
            .lock_namespace()?
            .text
            .get(main_path)
            .cloned()
            .ok_or_else(|| EngineError::other(format!("file not found: {}", main_path)))?;
        if let Ok(mut compiled) = self.compiled.lock() {
            compiled.push(source.clone());
        }

        let script = self.rules.get(&source).unwrap_or(&self.fallback).clone();
        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }

        match script.outcome {
            ScriptedOutcome::Pages(pages) => Ok(CompileOutcome::success(
                VectorDocument::from_markup(page_markup(&pages)),
            )),
            ScriptedOutcome::Warnings(pages, diagnostics) => Ok(CompileOutcome::success(
                VectorDocument::from_markup(page_markup(&pages)),
            )
            .with_diagnostics(diagnostics)),
            ScriptedOutcome::Diagnostics(diagnostics) => Ok(CompileOutcome::failure(diagnostics)),
            ScriptedOutcome::Fail(message) => Err(EngineError::other(message)),
        }
    }

    async fn render_svg(&self, document: &VectorDocument) -> Result<String, EngineError> {
        match &self.render_failure {
            Some(message) => Err(EngineError::render(message.clone())),
            None => Ok(document.payload.clone()),
        }
    }

    async fn render_pdf(&self, _main_path: &str) -> Result<Vec<u8>, EngineError> {
        self.pdf_calls.fetch_add(1, Ordering::SeqCst);
        match &self.pdf {
            None => Ok(SCRIPTED_PDF.to_vec()),
            Some(Ok(bytes)) => Ok(bytes.clone()),
            Some(Err(message)) => Err(EngineError::other(message.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout;

    #[test]
    fn test_page_markup_has_page_markers() {
        let meta = layout::page_meta(&page_markup(&[(100.0, 200.0), (100.0, 50.0)]));
        assert_eq!(meta.len(), 2);
        assert_eq!(meta[1].height, 50.0);
    }

    #[tokio::test]
    async fn test_rules_match_main_source() {
        let engine = ScriptedEngine::new().on_source(
            "bad",
            ScriptedCompile::new(ScriptedOutcome::Diagnostics("main.typ:1:1: error: nope".into())),
        );

        engine.map_text("/main.typ", "bad").await.unwrap();
        assert!(engine.compile("/main.typ").await.unwrap().document.is_none());

        engine.map_text("/main.typ", "good").await.unwrap();
        assert!(engine.compile("/main.typ").await.unwrap().document.is_some());

        assert_eq!(engine.compiled_sources(), vec!["bad", "good"]);
        assert_eq!(engine.compile_calls(), 2);
    }

    #[tokio::test]
    async fn test_compile_without_main_document_errors() {
        let engine = ScriptedEngine::new();
        assert!(engine.compile("/main.typ").await.is_err());
    }
}
