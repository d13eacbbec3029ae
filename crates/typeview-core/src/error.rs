//! Error types for typeview-core

use thiserror::Error;
use typeview_system_runtime::RuntimeError;

use crate::config::ConfigError;
use crate::engine::{EngineError, InitFailure};
use crate::export::ExportError;

#[derive(Error, Debug)]
pub enum TypeviewError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Init(#[from] InitFailure),

    #[error("{0}")]
    Engine(#[from] EngineError),

    #[error("{0}")]
    Export(#[from] ExportError),

    #[error("{0}")]
    Runtime(#[from] RuntimeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl TypeviewError {
    /// Create an error from any message.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, TypeviewError>;
