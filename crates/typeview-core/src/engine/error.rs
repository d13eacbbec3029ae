/*
 * engine/error.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Error types for typesetting engines.
 */

//! Error types for typesetting engines.

use std::time::Duration;

use thiserror::Error;
use typeview_system_runtime::RuntimeError;

/// Message used whenever the engine is asked to work before it is ready.
pub const NOT_READY_MESSAGE: &str = "Typst compiler not ready";

/// Engine-level failures.
///
/// Expected compiler errors (malformed markup) are *not* represented here;
/// they travel as diagnostics in [`super::CompileOutcome`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// A call was made before initialization completed, or after it failed.
    #[error("Typst compiler not ready")]
    NotReady,

    /// Initialization failed earlier in this session.
    #[error("Typst compiler failed to initialize: {0}")]
    InitFailed(String),

    /// The engine could not be started.
    #[error("Engine bootstrap failed: {0}")]
    Bootstrap(String),

    /// Bootstrap did not finish within the configured timeout.
    #[error("Engine bootstrap timed out after {0:?}")]
    Timeout(Duration),

    /// The engine process exited unsuccessfully outside of a normal compile.
    #[error("{message}")]
    Process {
        /// Exit code of the engine process
        code: i32,
        /// What the process reported
        message: String,
    },

    /// IO error while preparing engine input or reading its output.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Runtime failure (filesystem, subprocess spawn).
    #[error("{0}")]
    Runtime(#[from] RuntimeError),

    /// The engine compiled the document but could not render it.
    #[error("Render failed: {0}")]
    Render(String),

    /// Engine-specific error with custom message.
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    /// Create a "bootstrap failed" error.
    pub fn bootstrap(message: impl Into<String>) -> Self {
        Self::Bootstrap(message.into())
    }

    /// Create a "render failed" error.
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render(message.into())
    }

    /// Create an error from any message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Create a process error, falling back to the exit code when the
    /// process printed nothing.
    pub fn process(code: i32, stderr: &str) -> Self {
        let trimmed = stderr.trim();
        let message = if trimmed.is_empty() {
            format!("typst exited with code {}", code)
        } else {
            trimmed.to_string()
        };
        Self::Process { code, message }
    }

    /// Whether this error means "try again once the engine is ready".
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotReady | Self::InitFailed(_))
    }
}

/// Terminal initialization failure for a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to initialize Typst: {message}")]
pub struct InitFailure {
    pub message: String,
}

impl InitFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ready_message() {
        assert_eq!(EngineError::NotReady.to_string(), NOT_READY_MESSAGE);
        assert!(EngineError::NotReady.is_not_ready());
        assert!(EngineError::InitFailed("x".into()).is_not_ready());
        assert!(!EngineError::other("x").is_not_ready());
    }

    #[test]
    fn test_process_error_message() {
        let err = EngineError::process(1, "  error: file not found\n");
        assert_eq!(err.to_string(), "error: file not found");

        let err = EngineError::process(101, "");
        assert_eq!(err.to_string(), "typst exited with code 101");
    }

    #[test]
    fn test_init_failure_display() {
        let failure = InitFailure::new("typst binary not found");
        assert_eq!(
            failure.to_string(),
            "Failed to initialize Typst: typst binary not found"
        );
    }
}
