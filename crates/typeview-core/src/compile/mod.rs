/*
 * compile/mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Compile orchestration.
 */

//! Compile orchestration.
//!
//! - [`CompileOrchestrator`] - The `Idle → Compiling → Succeeded | Failed`
//!   state machine, with stale-result discard
//! - [`Debouncer`] - Coalesces source changes into compile requests
//! - [`CompileObserver`] - Hook for compile events

mod debounce;
mod observer;
mod orchestrator;
mod state;

pub use debounce::Debouncer;
pub use observer::{CompileObserver, NoopObserver, TracingObserver};
pub use orchestrator::{Commit, CompileOrchestrator};
pub use state::{CompileState, CompileStatus, PreviewState, source_hash};
