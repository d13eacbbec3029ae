/*
 * compile/observer.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Observer for compile orchestration events.
 */

//! Observer abstraction for compile events.
//!
//! All methods have empty default implementations, so observers implement
//! only the events they care about.

use super::state::{CompileStatus, short_hash};

/// Receives compile lifecycle events from the orchestrator.
pub trait CompileObserver: Send + Sync {
    /// A compile of the source with this hash started.
    fn on_compile_start(&self, _source_hash: &str) {}

    /// A compile finished and its result became the current state.
    fn on_commit(&self, _source_hash: &str, _status: CompileStatus) {}

    /// A compile finished after a newer request superseded it; its result
    /// was dropped.
    fn on_discard(&self, _source_hash: &str) {}

    /// A committed compile failed with this many diagnostics.
    fn on_failure(&self, _source_hash: &str, _diagnostics: usize) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl CompileObserver for NoopObserver {}

/// Observer that logs events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl CompileObserver for TracingObserver {
    fn on_compile_start(&self, source_hash: &str) {
        tracing::debug!(compile.hash = short_hash(source_hash), "Starting compile");
    }

    fn on_commit(&self, source_hash: &str, status: CompileStatus) {
        tracing::info!(
            compile.hash = short_hash(source_hash),
            compile.status = ?status,
            "Compile committed"
        );
    }

    fn on_discard(&self, source_hash: &str) {
        tracing::debug!(compile.hash = short_hash(source_hash), "Discarded stale compile");
    }

    fn on_failure(&self, source_hash: &str, diagnostics: usize) {
        tracing::warn!(
            compile.hash = short_hash(source_hash),
            compile.diagnostics = diagnostics,
            "Compile failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingObserver {
        commits: AtomicUsize,
        discards: AtomicUsize,
    }

    impl CompileObserver for CountingObserver {
        fn on_commit(&self, _source_hash: &str, _status: CompileStatus) {
            self.commits.fetch_add(1, Ordering::SeqCst);
        }

        fn on_discard(&self, _source_hash: &str) {
            self.discards.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_noop_and_tracing_observers() {
        for observer in [&NoopObserver as &dyn CompileObserver, &TracingObserver] {
            observer.on_compile_start("abc");
            observer.on_commit("abc", CompileStatus::Succeeded);
            observer.on_discard("abc");
            observer.on_failure("abc", 2);
        }
    }

    #[test]
    fn test_default_methods_are_optional() {
        let observer = CountingObserver::default();
        observer.on_compile_start("abc");
        observer.on_commit("abc", CompileStatus::Failed);
        observer.on_discard("def");
        observer.on_discard("ghi");
        assert_eq!(observer.commits.load(Ordering::SeqCst), 1);
        assert_eq!(observer.discards.load(Ordering::SeqCst), 2);
    }
}
