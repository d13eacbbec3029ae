/*
 * session.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * PreviewSession: one template directory wired through the pipeline.
 */

//! A preview session for one template directory.
//!
//! The session owns the resource loader, the engine adapter, the compile
//! orchestrator, and the export packager. [`PreviewSession::start`]
//! initializes the engine and registers every auxiliary resource before the
//! first compile can be issued.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;
use typeview_system_runtime::SystemRuntime;

use crate::compile::{
    Commit, CompileObserver, CompileOrchestrator, CompileState, Debouncer, PreviewState,
    TracingObserver,
};
use crate::config::PreviewConfig;
use crate::engine::{AdapterOptions, EngineAdapter, RegistrationSummary, TypesetEngine};
use crate::error::Result;
use crate::export::{DownloadTarget, ExportError, ExportPackager, ExportState};
use crate::resources::ResourceLoader;
use crate::viewport::{ScrollSurface, Viewport, ZoomState};

pub struct PreviewSession {
    config: PreviewConfig,
    loader: ResourceLoader,
    adapter: Arc<EngineAdapter>,
    orchestrator: Arc<CompileOrchestrator>,
    exporter: ExportPackager,
}

impl PreviewSession {
    /// Create a session that logs compile events through `tracing`.
    pub fn new(
        engine: Arc<dyn TypesetEngine>,
        runtime: Arc<dyn SystemRuntime>,
        root: impl Into<PathBuf>,
        config: PreviewConfig,
    ) -> Self {
        Self::with_observer(engine, runtime, root, config, Arc::new(TracingObserver))
    }

    pub fn with_observer(
        engine: Arc<dyn TypesetEngine>,
        runtime: Arc<dyn SystemRuntime>,
        root: impl Into<PathBuf>,
        config: PreviewConfig,
        observer: Arc<dyn CompileObserver>,
    ) -> Self {
        let root = root.into();
        let loader = ResourceLoader::new(runtime.clone(), root.clone(), &config);
        let adapter = Arc::new(EngineAdapter::new(
            engine,
            runtime,
            AdapterOptions::from_config(&config, root),
        ));
        let orchestrator = Arc::new(
            CompileOrchestrator::new(adapter.clone())
                .with_page_gap(config.page_gap)
                .with_observer(observer),
        );
        let exporter = ExportPackager::new(adapter.clone());
        Self {
            config,
            loader,
            adapter,
            orchestrator,
            exporter,
        }
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        self.loader.root()
    }

    pub fn loader(&self) -> &ResourceLoader {
        &self.loader
    }

    pub fn adapter(&self) -> &Arc<EngineAdapter> {
        &self.adapter
    }

    pub fn orchestrator(&self) -> &Arc<CompileOrchestrator> {
        &self.orchestrator
    }

    /// Initialize the engine, register the template's auxiliary resources,
    /// and return the primary document's source.
    pub async fn start(&self) -> Result<String> {
        self.adapter.initialize().await?;
        let summary = self.register_resources().await?;
        tracing::debug!(
            text_files = summary.text_files,
            binary_files = summary.binary_files,
            root = %self.root().display(),
            "Session started"
        );
        Ok(self.loader.load_primary_document())
    }

    /// Re-read and re-register the auxiliary resources.
    pub async fn register_resources(&self) -> Result<RegistrationSummary> {
        let resources = self.loader.load_auxiliary_resources();
        Ok(self.adapter.register_resources(&resources).await?)
    }

    pub async fn compile(&self, source: &str) -> Commit {
        self.orchestrator.compile(source).await
    }

    pub async fn export_document(
        &self,
        source: &str,
        filename: Option<&str>,
        target: &dyn DownloadTarget,
    ) -> std::result::Result<PathBuf, ExportError> {
        self.exporter.export_document(source, filename, target).await
    }

    pub fn compile_state(&self) -> CompileState {
        self.orchestrator.state()
    }

    pub fn preview_state(&self) -> PreviewState {
        self.orchestrator.preview_state()
    }

    pub fn export_state(&self) -> ExportState {
        self.exporter.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<CompileState> {
        self.orchestrator.subscribe()
    }

    /// Spawn a debouncer feeding this session's orchestrator.
    pub fn spawn_debouncer(&self) -> Debouncer {
        Debouncer::spawn(self.orchestrator.clone(), self.config.debounce())
    }

    /// A viewport using this session's zoom levels.
    pub fn viewport<S: ScrollSurface>(&self, surface: S) -> Result<Viewport<S>> {
        Ok(Viewport::new(ZoomState::from_config(&self.config)?, surface))
    }
}
