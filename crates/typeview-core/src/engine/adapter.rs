/*
 * engine/adapter.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * EngineAdapter: lifecycle and namespace ownership for a TypesetEngine.
 */

//! The single owner of a [`TypesetEngine`] for a session.
//!
//! The adapter tracks [`EngineState`], collapses concurrent initialization
//! into one bootstrap, and serializes access to the engine's resource
//! namespace so that a registration+compile sequence is never interleaved
//! with another.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::OnceCell;
use typeview_system_runtime::SystemRuntime;

use super::error::{EngineError, InitFailure};
use super::traits::{CompileOutcome, TypesetEngine, VectorDocument};
use crate::config::PreviewConfig;
use crate::resources::ResourceSet;

/// Lifecycle of the engine within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Ready,
    /// Terminal: no automatic retry.
    InitFailed,
}

/// Options the adapter needs from the preview configuration.
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    /// Namespace path of the primary document.
    pub main_path: String,
    /// Bound on engine bootstrap.
    pub init_timeout: Duration,
    /// Font files to preload (absolute, or relative to `base_dir`).
    pub fonts: Vec<PathBuf>,
    /// Package registry directory to preload.
    pub package_path: Option<PathBuf>,
    /// Directory relative font and package paths resolve against.
    pub base_dir: PathBuf,
}

impl AdapterOptions {
    pub fn from_config(config: &PreviewConfig, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            main_path: config.main_path(),
            init_timeout: config.init_timeout(),
            fonts: config.fonts.clone(),
            package_path: config.package_path.clone(),
            base_dir: base_dir.into(),
        }
    }
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self::from_config(&PreviewConfig::default(), PathBuf::new())
    }
}

/// Counts of resources registered by [`EngineAdapter::register_resources`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrationSummary {
    pub text_files: usize,
    pub binary_files: usize,
    /// Previously registered files no longer in the set.
    pub removed_files: usize,
}

/// Stable contract over an opaque [`TypesetEngine`].
pub struct EngineAdapter {
    engine: Arc<dyn TypesetEngine>,
    runtime: Arc<dyn SystemRuntime>,
    options: AdapterOptions,
    state: Mutex<EngineState>,
    init: OnceCell<Result<(), InitFailure>>,
    /// Auxiliary paths currently mapped into the engine. Held across every
    /// namespace mutation and the compile that reads it.
    namespace: tokio::sync::Mutex<BTreeSet<String>>,
}

impl EngineAdapter {
    pub fn new(
        engine: Arc<dyn TypesetEngine>,
        runtime: Arc<dyn SystemRuntime>,
        options: AdapterOptions,
    ) -> Self {
        Self {
            engine,
            runtime,
            options,
            state: Mutex::new(EngineState::Uninitialized),
            init: OnceCell::new(),
            namespace: tokio::sync::Mutex::new(BTreeSet::new()),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or(EngineState::InitFailed)
    }

    pub fn is_ready(&self) -> bool {
        self.state() == EngineState::Ready
    }

    /// Namespace path of the primary document.
    pub fn main_path(&self) -> &str {
        &self.options.main_path
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    fn set_state(&self, next: EngineState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }

    fn ensure_ready(&self) -> Result<(), EngineError> {
        match self.state() {
            EngineState::Ready => Ok(()),
            EngineState::InitFailed => Err(EngineError::InitFailed(
                self.init_failure()
                    .map(|failure| failure.message)
                    .unwrap_or_default(),
            )),
            EngineState::Uninitialized | EngineState::Initializing => Err(EngineError::NotReady),
        }
    }

    /// The failure recorded by initialization, if it failed.
    pub fn init_failure(&self) -> Option<InitFailure> {
        self.init.get().and_then(|result| result.clone().err())
    }

    /// Initialize the engine.
    ///
    /// Idempotent: concurrent and repeated calls share one bootstrap and all
    /// observe its result. A failure is terminal for the adapter.
    pub async fn initialize(&self) -> Result<(), InitFailure> {
        self.init
            .get_or_init(|| self.run_initialization())
            .await
            .clone()
    }

    async fn run_initialization(&self) -> Result<(), InitFailure> {
        self.set_state(EngineState::Initializing);
        tracing::debug!(engine = self.engine.name(), "Initializing engine");

        let bootstrap = tokio::time::timeout(self.options.init_timeout, self.engine.bootstrap()).await;
        let result = match bootstrap {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(InitFailure::new(e.to_string())),
            Err(_) => Err(InitFailure::new(
                EngineError::Timeout(self.options.init_timeout).to_string(),
            )),
        };

        if let Err(failure) = &result {
            tracing::error!(engine = self.engine.name(), error = %failure.message, "Engine initialization failed");
            self.set_state(EngineState::InitFailed);
            return result;
        }

        self.preload_fonts().await;
        self.preload_packages().await;

        self.set_state(EngineState::Ready);
        tracing::info!(engine = self.engine.name(), "Engine ready");
        Ok(())
    }

    async fn preload_fonts(&self) {
        let mut missing = 0;
        for font in &self.options.fonts {
            let path = if font.is_absolute() {
                font.clone()
            } else {
                self.options.base_dir.join(font)
            };
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "font".to_string());

            let bytes = match self.runtime.file_read(&path) {
                Ok(bytes) => bytes,
                Err(e) if e.is_not_found() => {
                    tracing::debug!(font = %path.display(), "Font file not found");
                    missing += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(font = %path.display(), error = %e, "Failed to read font");
                    continue;
                }
            };
            if let Err(e) = self.engine.load_font(&name, bytes).await {
                tracing::warn!(font = %path.display(), error = %e, "Failed to preload font");
            }
        }
        if missing > 0 {
            tracing::warn!(
                missing,
                configured = self.options.fonts.len(),
                "Some fonts were not found; the engine falls back to its own fonts"
            );
        }
    }

    async fn preload_packages(&self) {
        let Some(package_path) = &self.options.package_path else {
            return;
        };
        let path = if package_path.is_absolute() {
            package_path.clone()
        } else {
            self.options.base_dir.join(package_path)
        };
        if let Err(e) = self.engine.load_package_registry(&path).await {
            tracing::warn!(path = %path.display(), error = %e, "Failed to load package registry");
        }
    }

    /// Upsert a text file into the engine's namespace.
    pub async fn register_text_resource(&self, path: &str, content: &str) -> Result<(), EngineError> {
        self.ensure_ready()?;
        let mut registered = self.namespace.lock().await;
        let path = namespace_path(path);
        self.engine.map_text(&path, content).await?;
        registered.insert(path);
        Ok(())
    }

    /// Upsert a binary file into the engine's namespace.
    pub async fn register_binary_resource(&self, path: &str, bytes: &[u8]) -> Result<(), EngineError> {
        self.ensure_ready()?;
        let mut registered = self.namespace.lock().await;
        let path = namespace_path(path);
        self.engine.map_binary(&path, bytes).await?;
        registered.insert(path);
        Ok(())
    }

    /// Make the engine's auxiliary files match `resources` exactly.
    ///
    /// Every listed file is upserted and every previously registered file
    /// absent from `resources` is removed, all under one namespace lock so a
    /// compile never observes a half-applied set.
    pub async fn register_resources(
        &self,
        resources: &ResourceSet,
    ) -> Result<RegistrationSummary, EngineError> {
        self.ensure_ready()?;
        let mut registered = self.namespace.lock().await;

        let mut current = BTreeSet::new();
        for (path, content) in &resources.text_files {
            let path = namespace_path(path);
            self.engine.map_text(&path, content).await?;
            registered.insert(path.clone());
            current.insert(path);
        }
        for (path, bytes) in &resources.binary_files {
            let path = namespace_path(path);
            self.engine.map_binary(&path, bytes).await?;
            registered.insert(path.clone());
            current.insert(path);
        }

        let mut removed_files = 0;
        for stale in registered.difference(&current) {
            if *stale == self.options.main_path {
                continue;
            }
            self.engine.unmap(stale).await?;
            tracing::debug!(path = %stale, "Removed template resource");
            removed_files += 1;
        }
        *registered = current;

        let summary = RegistrationSummary {
            text_files: resources.text_files.len(),
            binary_files: resources.binary_files.len(),
            removed_files,
        };
        if summary.text_files > 0 || summary.binary_files > 0 || summary.removed_files > 0 {
            tracing::info!(
                text_files = summary.text_files,
                binary_files = summary.binary_files,
                removed_files = summary.removed_files,
                "Registered template resources"
            );
        }
        Ok(summary)
    }

    /// Register `source` as the primary document and compile it.
    pub async fn compile_to_vector(&self, source: &str) -> Result<CompileOutcome, EngineError> {
        self.ensure_ready()?;
        let _namespace = self.namespace.lock().await;
        self.engine.map_text(&self.options.main_path, source).await?;
        self.engine.compile(&self.options.main_path).await
    }

    /// Render a compiled document to SVG markup.
    pub async fn render_vector_to_image(&self, document: &VectorDocument) -> Result<String, EngineError> {
        self.ensure_ready()?;
        self.engine.render_svg(document).await
    }

    /// Register `source` as the primary document and produce PDF bytes.
    pub async fn render_to_pdf_bytes(&self, source: &str) -> Result<Vec<u8>, EngineError> {
        self.ensure_ready()?;
        let _namespace = self.namespace.lock().await;
        self.engine.map_text(&self.options.main_path, source).await?;
        self.engine.render_pdf(&self.options.main_path).await
    }
}

fn namespace_path(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BUILTIN_FONTS;
    use crate::engine::scripted::{ScriptedBootstrap, ScriptedEngine};
    use typeview_system_runtime::NativeRuntime;

    fn adapter(engine: Arc<ScriptedEngine>, options: AdapterOptions) -> EngineAdapter {
        EngineAdapter::new(engine, Arc::new(NativeRuntime::new()), options)
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent_under_concurrency() {
        let engine = Arc::new(ScriptedEngine::new().with_bootstrap_delay(Duration::from_millis(20)));
        let adapter = adapter(engine.clone(), AdapterOptions::default());
        assert_eq!(adapter.state(), EngineState::Uninitialized);

        let (a, b, c) = tokio::join!(adapter.initialize(), adapter.initialize(), adapter.initialize());
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert!(adapter.initialize().await.is_ok());

        assert_eq!(engine.bootstrap_calls(), 1);
        assert_eq!(adapter.state(), EngineState::Ready);
    }

    #[tokio::test]
    async fn test_init_failure_is_terminal() {
        let engine = Arc::new(
            ScriptedEngine::new().with_bootstrap(ScriptedBootstrap::Fail("no wasm".into())),
        );
        let adapter = adapter(engine.clone(), AdapterOptions::default());

        let failure = adapter.initialize().await.unwrap_err();
        assert!(failure.message.contains("no wasm"));
        assert_eq!(adapter.state(), EngineState::InitFailed);

        // No retry on later calls
        assert!(adapter.initialize().await.is_err());
        assert_eq!(engine.bootstrap_calls(), 1);

        let err = adapter.compile_to_vector("= Hi").await.unwrap_err();
        assert!(matches!(err, EngineError::InitFailed(_)));
        assert_eq!(adapter.init_failure(), Some(failure));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bootstrap_timeout() {
        let engine = Arc::new(ScriptedEngine::new().with_bootstrap(ScriptedBootstrap::Hang));
        let options = AdapterOptions {
            init_timeout: Duration::from_secs(30),
            ..AdapterOptions::default()
        };
        let adapter = adapter(engine, options);

        let failure = adapter.initialize().await.unwrap_err();
        assert!(failure.message.contains("timed out"));
        assert_eq!(adapter.state(), EngineState::InitFailed);
    }

    #[tokio::test]
    async fn test_calls_before_ready_fail_fast() {
        let engine = Arc::new(ScriptedEngine::new());
        let adapter = adapter(engine.clone(), AdapterOptions::default());

        assert!(matches!(
            adapter.compile_to_vector("= Hi").await,
            Err(EngineError::NotReady)
        ));
        assert!(matches!(
            adapter.render_to_pdf_bytes("= Hi").await,
            Err(EngineError::NotReady)
        ));
        assert!(matches!(
            adapter.register_text_resource("/a.typ", "x").await,
            Err(EngineError::NotReady)
        ));
        assert_eq!(engine.compile_calls(), 0);
    }

    #[tokio::test]
    async fn test_preload_failures_only_warn() {
        let engine = Arc::new(
            ScriptedEngine::new().with_package_failure("registry offline"),
        );
        let options = AdapterOptions {
            fonts: vec![PathBuf::from("/definitely/missing/font.ttf")],
            package_path: Some(PathBuf::from("/packages")),
            ..AdapterOptions::default()
        };
        let adapter = adapter(engine.clone(), options);

        assert!(adapter.initialize().await.is_ok());
        assert!(adapter.is_ready());
        assert!(engine.fonts().is_empty());
    }

    #[tokio::test]
    async fn test_fonts_are_preloaded() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("Inter.ttf"), b"font-bytes").unwrap();

        let engine = Arc::new(ScriptedEngine::new());
        let options = AdapterOptions {
            fonts: vec![PathBuf::from("Inter.ttf")],
            base_dir: temp.path().to_path_buf(),
            ..AdapterOptions::default()
        };
        let adapter = adapter(engine.clone(), options);
        adapter.initialize().await.unwrap();

        assert_eq!(engine.fonts(), vec!["Inter.ttf".to_string()]);
    }

    #[tokio::test]
    async fn test_default_config_preloads_builtin_fonts() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::create_dir(temp.path().join("fonts")).unwrap();
        for font in BUILTIN_FONTS {
            std::fs::write(temp.path().join(font), b"font-bytes").unwrap();
        }

        let engine = Arc::new(ScriptedEngine::new());
        let options = AdapterOptions::from_config(&PreviewConfig::default(), temp.path());
        let adapter = adapter(engine.clone(), options);
        adapter.initialize().await.unwrap();

        let fonts = engine.fonts();
        assert!(!fonts.is_empty());
        assert_eq!(fonts.len(), BUILTIN_FONTS.len());
        assert!(fonts.contains(&"inter-latin-700-normal.ttf".to_string()));
    }

    #[tokio::test]
    async fn test_registration_and_compile() {
        let engine = Arc::new(ScriptedEngine::new());
        let adapter = adapter(engine.clone(), AdapterOptions::default());
        adapter.initialize().await.unwrap();

        let mut resources = ResourceSet::new();
        resources.insert_text("chapter.typ", "= Chapter");
        resources.insert_binary("assets/logo.png", vec![1, 2, 3]);
        let summary = adapter.register_resources(&resources).await.unwrap();
        assert_eq!(
            summary,
            RegistrationSummary {
                text_files: 1,
                binary_files: 1,
                removed_files: 0,
            }
        );
        assert_eq!(engine.text_file("/chapter.typ").as_deref(), Some("= Chapter"));
        assert_eq!(engine.binary_file("/assets/logo.png"), Some(vec![1, 2, 3]));

        // Re-registering upserts
        adapter.register_text_resource("chapter.typ", "= Updated").await.unwrap();
        assert_eq!(engine.text_file("/chapter.typ").as_deref(), Some("= Updated"));

        let outcome = adapter.compile_to_vector("= Hello").await.unwrap();
        assert!(outcome.document.is_some());
        assert_eq!(engine.text_file("/main.typ").as_deref(), Some("= Hello"));

        let markup = adapter
            .render_vector_to_image(outcome.document.as_ref().unwrap())
            .await
            .unwrap();
        assert!(markup.contains("typst-page"));
    }

    #[tokio::test]
    async fn test_reregistration_removes_deleted_resources() {
        let engine = Arc::new(ScriptedEngine::new());
        let adapter = adapter(engine.clone(), AdapterOptions::default());
        adapter.initialize().await.unwrap();

        let mut resources = ResourceSet::new();
        resources.insert_text("chapter.typ", "= Chapter");
        resources.insert_text("appendix.typ", "= Appendix");
        resources.insert_binary("assets/logo.png", vec![1, 2, 3]);
        adapter.register_resources(&resources).await.unwrap();

        let mut resources = ResourceSet::new();
        resources.insert_text("appendix.typ", "= Appendix v2");
        let summary = adapter.register_resources(&resources).await.unwrap();

        assert_eq!(summary.removed_files, 2);
        assert_eq!(engine.text_file("/chapter.typ"), None);
        assert_eq!(engine.binary_file("/assets/logo.png"), None);
        assert_eq!(engine.text_file("/appendix.typ").as_deref(), Some("= Appendix v2"));

        // Compiling afterwards leaves the primary document mapped
        adapter.compile_to_vector("= Hello").await.unwrap();
        let summary = adapter.register_resources(&ResourceSet::new()).await.unwrap();
        assert_eq!(summary.removed_files, 1);
        assert_eq!(engine.text_file("/appendix.typ"), None);
        assert_eq!(engine.text_file("/main.typ").as_deref(), Some("= Hello"));
    }

    #[tokio::test]
    async fn test_pdf_registers_source_first() {
        let engine = Arc::new(ScriptedEngine::new());
        let adapter = adapter(engine.clone(), AdapterOptions::default());
        adapter.initialize().await.unwrap();

        let bytes = adapter.render_to_pdf_bytes("= Export me").await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(engine.text_file("/main.typ").as_deref(), Some("= Export me"));
    }
}
