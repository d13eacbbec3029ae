//! Command implementations and the session setup they share.

pub mod export;
pub mod inspect;
pub mod render;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use typeview_core::{CompileState, PreviewConfig, PreviewSession, TypstCliEngine};
use typeview_error_reporting::render_with_source;
use typeview_system_runtime::NativeRuntime;

/// Engine options shared by every command.
#[derive(Debug, Clone, Default, Args)]
pub struct EngineArgs {
    /// Path to the typst binary (default: $TYPST_BIN, then PATH)
    #[arg(long, value_name = "PATH")]
    pub typst: Option<PathBuf>,

    /// Gap between pages, in points
    #[arg(long, value_name = "PT")]
    pub page_gap: Option<f64>,

    /// Local package registry directory
    #[arg(long, value_name = "DIR")]
    pub package_path: Option<PathBuf>,

    /// Font file to preload (repeatable)
    #[arg(long = "font", value_name = "FILE")]
    pub fonts: Vec<PathBuf>,
}

impl EngineArgs {
    /// Apply command-line overrides on top of the file configuration.
    fn apply(&self, config: &mut PreviewConfig) {
        if let Some(typst) = &self.typst {
            config.typst_binary = Some(typst.clone());
        }
        if let Some(gap) = self.page_gap {
            config.page_gap = gap;
        }
        if let Some(package_path) = &self.package_path {
            config.package_path = Some(package_path.clone());
        }
        config.fonts.extend(self.fonts.iter().cloned());
    }
}

/// Resolve the template directory and load its configuration.
pub fn load_config(
    dir: &Path,
    engine: &EngineArgs,
    runtime: &NativeRuntime,
) -> Result<(PathBuf, PreviewConfig)> {
    let root = dir
        .canonicalize()
        .with_context(|| format!("Template directory not found: {}", dir.display()))?;
    let mut config = PreviewConfig::load(runtime, &root)
        .with_context(|| format!("Failed to load configuration for {}", root.display()))?;
    engine.apply(&mut config);
    config.validate()?;
    Ok((root, config))
}

/// Build a session for `dir` backed by the typst CLI engine.
pub fn open_session(dir: &Path, engine: &EngineArgs) -> Result<PreviewSession> {
    open_session_with(dir, engine, |_| {})
}

/// Like [`open_session`], with a hook to adjust the configuration.
pub fn open_session_with(
    dir: &Path,
    engine: &EngineArgs,
    adjust: impl FnOnce(&mut PreviewConfig),
) -> Result<PreviewSession> {
    let runtime = Arc::new(NativeRuntime::new());
    let (root, mut config) = load_config(dir, engine, &runtime)?;
    adjust(&mut config);
    config.validate()?;

    let typst = Arc::new(TypstCliEngine::new(runtime.clone(), config.typst_binary.clone()));
    Ok(PreviewSession::new(typst, runtime, root, config))
}

/// Print a failed compile's diagnostics with source snippets to stderr.
pub fn report_diagnostics(state: &CompileState, source: &str, main_file: &str) {
    if !state.diagnostics.is_empty() {
        eprintln!("{}", render_with_source(&state.diagnostics, source, main_file));
    }
    if !state.warnings.is_empty() {
        eprintln!("{}", render_with_source(&state.warnings, source, main_file));
    }
}

/// Default SVG output path: `<root>/<main stem>.svg`.
pub fn default_svg_path(session: &PreviewSession) -> PathBuf {
    let stem = Path::new(&session.config().main_file)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "main".to_string());
    session.root().join(format!("{}.svg", stem))
}
