/*
 * engine/mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Typesetting engine infrastructure.
 */

//! Typesetting engine infrastructure.
//!
//! - [`TypesetEngine`] - The opaque compile/render capability
//! - [`EngineAdapter`] - Session owner of an engine: lifecycle, namespace
//!   serialization, readiness checks
//! - Concrete engines:
//!   - [`TypstCliEngine`] - Drives the `typst` binary
//!   - [`ScriptedEngine`] - In-memory engine with scripted outcomes
//!
//! # Example
//!
//! ```ignore
//! use typeview_core::engine::{AdapterOptions, EngineAdapter, TypstCliEngine};
//!
//! let engine = Arc::new(TypstCliEngine::new(runtime.clone(), None));
//! let adapter = EngineAdapter::new(engine, runtime, AdapterOptions::default());
//! adapter.initialize().await?;
//! let outcome = adapter.compile_to_vector("= Hello").await?;
//! ```

mod adapter;
mod error;
pub mod scripted;
mod traits;
mod typst_cli;

pub use adapter::{AdapterOptions, EngineAdapter, EngineState, RegistrationSummary};
pub use error::{EngineError, InitFailure, NOT_READY_MESSAGE};
pub use scripted::{ScriptedBootstrap, ScriptedCompile, ScriptedEngine, ScriptedOutcome};
pub use traits::{CompileOutcome, PageMeta, TypesetEngine, VectorDocument};
pub use typst_cli::TypstCliEngine;
