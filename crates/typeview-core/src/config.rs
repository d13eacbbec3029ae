/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Preview configuration loaded from typeview.json.
 */

//! Preview configuration.
//!
//! Every field has a default, so an absent or partial `typeview.json` in the
//! template root is fine. CLI flags are applied on top by the caller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use typeview_system_runtime::{RuntimeError, SystemRuntime};

/// Name of the optional configuration file in the template root.
pub const CONFIG_FILE_NAME: &str = "typeview.json";

/// Fonts preloaded when the configuration names none, relative to the
/// template root. Missing files are skipped at initialization.
pub const BUILTIN_FONTS: &[&str] = &[
    "fonts/noto-sans-latin-400-normal.ttf",
    "fonts/noto-sans-latin-700-normal.ttf",
    "fonts/noto-serif-latin-400-normal.ttf",
    "fonts/noto-serif-latin-700-normal.ttf",
    "fonts/noto-sans-sc-chinese-simplified-400-normal.ttf",
    "fonts/fira-code-latin-400-normal.ttf",
    "fonts/inter-latin-400-normal.ttf",
    "fonts/inter-latin-700-normal.ttf",
    "fonts/roboto-latin-400-normal.ttf",
    "fonts/roboto-latin-700-normal.ttf",
];

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: RuntimeError,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for a preview session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Primary document file name, registered at `/<main_file>`.
    pub main_file: String,

    /// Asset subdirectory of the template root.
    pub assets_dir: String,

    /// Accepted asset extensions (without the dot, case-insensitive).
    pub asset_extensions: Vec<String>,

    /// Debounce quiescence interval in milliseconds.
    pub debounce_ms: u64,

    /// Vertical gap between composited pages, in points.
    pub page_gap: f64,

    /// Ascending zoom percentages.
    pub zoom_levels: Vec<u32>,

    /// Initial zoom percentage; must be one of `zoom_levels`.
    pub default_zoom: u32,

    /// Engine bootstrap timeout in milliseconds.
    pub init_timeout_ms: u64,

    /// Font files preloaded into the engine at initialization. Defaults to
    /// [`BUILTIN_FONTS`]; an empty list disables preloading.
    pub fonts: Vec<PathBuf>,

    /// Local package registry directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_path: Option<PathBuf>,

    /// Explicit engine binary. Falls back to `TYPST_BIN`, then `PATH`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typst_binary: Option<PathBuf>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            main_file: "main.typ".to_string(),
            assets_dir: "assets".to_string(),
            asset_extensions: ["png", "jpg", "jpeg", "gif", "svg", "webp"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            debounce_ms: 400,
            page_gap: 20.0,
            zoom_levels: vec![50, 75, 100, 125, 150, 200],
            default_zoom: 150,
            init_timeout_ms: 30_000,
            fonts: BUILTIN_FONTS.iter().map(PathBuf::from).collect(),
            package_path: None,
            typst_binary: None,
        }
    }
}

impl PreviewConfig {
    /// Load `typeview.json` from `root`, or defaults if it does not exist.
    pub fn load(runtime: &dyn SystemRuntime, root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE_NAME);
        let exists = runtime
            .is_file(&path)
            .map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
        if !exists {
            tracing::debug!(path = %path.display(), "No configuration file; using defaults");
            return Ok(Self::default());
        }

        let content = runtime
            .file_read_string(&path)
            .map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
        let config: PreviewConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_zoom(&self.zoom_levels, self.default_zoom)?;
        if !self.page_gap.is_finite() || self.page_gap < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "page_gap must be a non-negative number, got {}",
                self.page_gap
            )));
        }
        if self.main_file.trim().is_empty() {
            return Err(ConfigError::Invalid("main_file must not be empty".into()));
        }
        Ok(())
    }

    /// Absolute resource path of the primary document, e.g. `/main.typ`.
    pub fn main_path(&self) -> String {
        format!("/{}", self.main_file.trim_start_matches('/'))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    /// Whether `file_name` carries one of the accepted asset extensions.
    pub fn is_asset(&self, file_name: &str) -> bool {
        let Some((_, extension)) = file_name.rsplit_once('.') else {
            return false;
        };
        self.asset_extensions
            .iter()
            .any(|accepted| accepted.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }

    /// Extension of the primary document, used to list auxiliary documents.
    pub fn document_extension(&self) -> &str {
        self.main_file
            .rsplit_once('.')
            .map_or("typ", |(_, extension)| extension)
    }
}

/// Zoom levels must be positive and strictly ascending, and contain the
/// default.
pub(crate) fn validate_zoom(levels: &[u32], default: u32) -> Result<(), ConfigError> {
    if levels.is_empty() {
        return Err(ConfigError::Invalid("zoom_levels must not be empty".into()));
    }
    if levels.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(ConfigError::Invalid(
            "zoom_levels must be strictly ascending".into(),
        ));
    }
    if levels.contains(&0) {
        return Err(ConfigError::Invalid("zoom_levels must be positive".into()));
    }
    if !levels.contains(&default) {
        return Err(ConfigError::Invalid(format!(
            "default_zoom {} is not one of zoom_levels {:?}",
            default, levels
        )));
    }
    Ok(())
}
