/*
 * typeview-system-runtime
 * Copyright (c) 2025 Posit, PBC
 *
 * Runtime abstraction layer for typeview system operations.
 *
 * This crate provides a trait-based abstraction for the system operations the
 * preview pipeline depends on (template reads, engine subprocesses, scratch
 * directories), so that the pipeline can be driven against a real machine or
 * against an in-memory double in tests.
 *
 * - NativeRuntime: Full system access using std and tokio (default)
 */

mod native;
mod traits;

// Re-export core types (API surface)
pub use traits::{
    CommandOutput, PathKind, RuntimeError, RuntimeResult, SystemRuntime, TempDir, join_relative,
};

// Re-export runtime implementations
pub use native::NativeRuntime;

/// Create a default runtime for the current platform.
pub fn default_runtime() -> NativeRuntime {
    NativeRuntime::new()
}
