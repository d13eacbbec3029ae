/*
 * export.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * PDF export packaging.
 */

//! PDF export.
//!
//! [`ExportPackager::export_document`] checks its preconditions, asks the
//! engine for PDF bytes, wraps them as a [`PdfArtifact`], and hands the
//! artifact to a [`DownloadTarget`]. The artifact lives only for the duration
//! of that call. Export never touches the compile state.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::engine::{EngineAdapter, EngineError};

/// File name used when the caller does not supply one.
pub const DEFAULT_EXPORT_FILENAME: &str = "document.pdf";

/// Media type of exported artifacts.
pub const PDF_MIME: &str = "application/pdf";

/// Export failures. The display string is what the user sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    #[error("Typst compiler not ready")]
    NotReady,

    #[error("No content to export")]
    EmptySource,

    #[error("PDF generation returned no data")]
    EmptyOutput,

    /// Engine failure, with the engine's message verbatim.
    #[error("{0}")]
    Engine(String),

    #[error("Failed to save {}: {message}", .path.display())]
    Save { path: PathBuf, message: String },
}

impl From<EngineError> for ExportError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::NotReady => ExportError::NotReady,
            other => ExportError::Engine(other.to_string()),
        }
    }
}

/// A typed binary export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfArtifact {
    pub filename: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Where exported artifacts are delivered.
pub trait DownloadTarget: Send + Sync {
    /// Deliver an artifact, returning where it ended up.
    fn deliver(&self, artifact: &PdfArtifact) -> Result<PathBuf, ExportError>;
}

/// Writes artifacts into a directory, atomically.
#[derive(Debug, Clone)]
pub struct DirectoryTarget {
    dir: PathBuf,
}

impl DirectoryTarget {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadTarget for DirectoryTarget {
    fn deliver(&self, artifact: &PdfArtifact) -> Result<PathBuf, ExportError> {
        use std::io::Write;

        let path = self.dir.join(&artifact.filename);
        let save_error = |message: String| ExportError::Save {
            path: path.clone(),
            message,
        };

        let mut file =
            tempfile::NamedTempFile::new_in(&self.dir).map_err(|e| save_error(e.to_string()))?;
        file.write_all(&artifact.bytes)
            .map_err(|e| save_error(e.to_string()))?;
        file.persist(&path)
            .map_err(|e| save_error(e.error.to_string()))?;
        Ok(path)
    }
}

/// Export progress, tracked separately from compile state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportState {
    pub is_exporting: bool,
    pub export_error: Option<String>,
}

/// Turns source text into a delivered PDF.
pub struct ExportPackager {
    adapter: Arc<EngineAdapter>,
    state: Mutex<ExportState>,
}

impl ExportPackager {
    pub fn new(adapter: Arc<EngineAdapter>) -> Self {
        Self {
            adapter,
            state: Mutex::new(ExportState::default()),
        }
    }

    pub fn state(&self) -> ExportState {
        self.state.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn update(&self, f: impl FnOnce(&mut ExportState)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }

    /// Export `source` as a PDF named `filename` (default
    /// [`DEFAULT_EXPORT_FILENAME`]) into `target`.
    pub async fn export_document(
        &self,
        source: &str,
        filename: Option<&str>,
        target: &dyn DownloadTarget,
    ) -> Result<PathBuf, ExportError> {
        let result = self.try_export(source, filename, target).await;
        self.update(|state| {
            state.is_exporting = false;
            state.export_error = result.as_ref().err().map(ToString::to_string);
        });
        if let Err(e) = &result {
            tracing::warn!(error = %e, "PDF export failed");
        }
        result
    }

    async fn try_export(
        &self,
        source: &str,
        filename: Option<&str>,
        target: &dyn DownloadTarget,
    ) -> Result<PathBuf, ExportError> {
        if !self.adapter.is_ready() {
            return Err(ExportError::NotReady);
        }
        if source.trim().is_empty() {
            return Err(ExportError::EmptySource);
        }

        self.update(|state| {
            state.is_exporting = true;
            state.export_error = None;
        });

        let bytes = self.adapter.render_to_pdf_bytes(source).await?;
        if bytes.is_empty() {
            return Err(ExportError::EmptyOutput);
        }

        let artifact = PdfArtifact {
            filename: sanitize_filename(filename),
            mime_type: PDF_MIME,
            bytes,
        };
        let path = target.deliver(&artifact)?;
        tracing::info!(path = %path.display(), bytes = artifact.bytes.len(), "Exported PDF");
        Ok(path)
    }
}

/// Keep only the final path component of a requested file name.
fn sanitize_filename(filename: Option<&str>) -> String {
    filename
        .and_then(|name| Path::new(name.trim()).file_name())
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_EXPORT_FILENAME)
        .to_string()
}
