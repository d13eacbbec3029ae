/*
 * compile/state.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Compile state owned by the orchestrator.
 */

use sha2::{Digest, Sha256};
use typeview_error_reporting::{Diagnostic, display_string};

use crate::layout::LayoutResult;

/// Where the orchestrator is in its compile cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompileStatus {
    #[default]
    Idle,
    Compiling,
    Succeeded,
    Failed,
}

impl CompileStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// The current compile state.
///
/// When `status` is `Succeeded`, `output` is set and `diagnostics` is empty;
/// when it is `Failed`, `diagnostics` is non-empty and `output` is `None`.
/// Non-blocking diagnostics of a successful compile go to `warnings`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompileState {
    pub status: CompileStatus,
    /// Hash of the source text this state belongs to.
    pub source_hash: Option<String>,
    pub output: Option<LayoutResult>,
    pub diagnostics: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl CompileState {
    /// Single display string for the current diagnostics, if any.
    pub fn error(&self) -> Option<String> {
        if self.diagnostics.is_empty() {
            None
        } else {
            Some(display_string(&self.diagnostics))
        }
    }
}

/// The externally observable state tuple.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreviewState {
    pub is_ready: bool,
    pub is_compiling: bool,
    pub error: Option<String>,
    /// Display-ready composited markup.
    pub output: Option<String>,
}

impl PreviewState {
    pub fn from_compile_state(state: &CompileState, is_ready: bool) -> Self {
        Self {
            is_ready,
            is_compiling: state.status == CompileStatus::Compiling,
            error: state.error(),
            output: state.output.as_ref().map(|layout| layout.markup.clone()),
        }
    }
}

/// Hex SHA-256 of a source text.
pub fn source_hash(source: &str) -> String {
    hex::encode(Sha256::digest(source.as_bytes()))
}

/// Hash prefix used in log fields.
pub(crate) fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
