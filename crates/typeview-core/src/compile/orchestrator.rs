/*
 * compile/orchestrator.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Compile orchestration: state machine and stale-result discard.
 */

//! The compile state machine.
//!
//! Every request is stamped with the hash of its source text. A finished
//! compile commits its result only if its hash is still the latest requested
//! one; otherwise the result is discarded. Results are therefore applied in
//! request order, whatever order the engine finishes them in.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use typeview_error_reporting::{Diagnostic, has_blocking, normalize};

use super::observer::{CompileObserver, NoopObserver};
use super::state::{CompileState, CompileStatus, PreviewState, short_hash, source_hash};
use crate::engine::{EngineAdapter, NOT_READY_MESSAGE};
use crate::layout::{self, DEFAULT_PAGE_GAP};

/// Diagnostic used when the engine yields neither a document nor diagnostics.
const COMPILE_FAILED_MESSAGE: &str = "Compilation failed";

/// What happened to a compile's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    /// The result became the current state.
    Applied(CompileStatus),
    /// A newer request superseded this one; the result was dropped.
    Stale,
}

/// Drives compiles through an [`EngineAdapter`] and owns [`CompileState`].
pub struct CompileOrchestrator {
    adapter: Arc<EngineAdapter>,
    page_gap: f64,
    /// Hash of the most recently requested source.
    latest: Mutex<Option<String>>,
    state: watch::Sender<CompileState>,
    observer: Arc<dyn CompileObserver>,
}

impl CompileOrchestrator {
    pub fn new(adapter: Arc<EngineAdapter>) -> Self {
        let (state, _) = watch::channel(CompileState::default());
        Self {
            adapter,
            page_gap: DEFAULT_PAGE_GAP,
            latest: Mutex::new(None),
            state,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_page_gap(mut self, page_gap: f64) -> Self {
        self.page_gap = page_gap;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn CompileObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn adapter(&self) -> &Arc<EngineAdapter> {
        &self.adapter
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> CompileState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<CompileState> {
        self.state.subscribe()
    }

    /// The UI-facing state tuple.
    pub fn preview_state(&self) -> PreviewState {
        PreviewState::from_compile_state(&self.state.borrow(), self.adapter.is_ready())
    }

    /// Mark `source` as the latest request without compiling it, so that any
    /// compile in flight for an older source is discarded.
    pub fn supersede(&self, source: &str) {
        let hash = source_hash(source);
        *self.latest() = Some(hash);
    }

    /// Compile `source` and, unless superseded meanwhile, commit the result.
    pub async fn compile(&self, source: &str) -> Commit {
        let hash = source_hash(source);

        if source.trim().is_empty() {
            let next = CompileState {
                source_hash: Some(hash.clone()),
                ..CompileState::default()
            };
            return self.request_and_commit(&hash, next);
        }

        if !self.adapter.is_ready() {
            let next = failed(&hash, vec![Diagnostic::error(NOT_READY_MESSAGE)]);
            return self.request_and_commit(&hash, next);
        }

        self.begin(&hash);
        self.observer.on_compile_start(&hash);
        tracing::debug!(compile.hash = short_hash(&hash), "Compile started");

        let next = self.run(&hash, source).await;

        tracing::debug!(
            compile.hash = short_hash(&hash),
            compile.status = ?next.status,
            "Compile finished"
        );
        self.commit(&hash, next)
    }

    async fn run(&self, hash: &str, source: &str) -> CompileState {
        let outcome = match self.adapter.compile_to_vector(source).await {
            Ok(outcome) => outcome,
            Err(e) => return failed(hash, vec![Diagnostic::error(e.to_string())]),
        };

        let diagnostics = normalize(&outcome.diagnostics);
        let document = match outcome.document {
            Some(document) if !has_blocking(&diagnostics) => document,
            _ => {
                let diagnostics = if diagnostics.is_empty() {
                    vec![Diagnostic::error(COMPILE_FAILED_MESSAGE)]
                } else {
                    diagnostics
                };
                return failed(hash, diagnostics);
            }
        };

        match self.adapter.render_vector_to_image(&document).await {
            Ok(markup) => CompileState {
                status: CompileStatus::Succeeded,
                source_hash: Some(hash.to_string()),
                output: Some(layout::composite(&markup, self.page_gap)),
                diagnostics: Vec::new(),
                warnings: diagnostics,
            },
            Err(e) => failed(hash, vec![Diagnostic::error(e.to_string())]),
        }
    }

    /// Record `hash` as the latest request and enter `Compiling`.
    fn begin(&self, hash: &str) {
        let mut latest = self.latest();
        *latest = Some(hash.to_string());
        self.state.send_modify(|state| {
            state.status = CompileStatus::Compiling;
            state.source_hash = Some(hash.to_string());
            state.diagnostics.clear();
            state.warnings.clear();
        });
    }

    /// Record `hash` as the latest request and commit `next` immediately.
    fn request_and_commit(&self, hash: &str, next: CompileState) -> Commit {
        *self.latest() = Some(hash.to_string());
        self.commit(hash, next)
    }

    fn commit(&self, hash: &str, next: CompileState) -> Commit {
        // Holding the lock keeps a newer request from slipping in between
        // the check and the state update.
        let latest = self.latest();
        if latest.as_deref() != Some(hash) {
            drop(latest);
            self.observer.on_discard(hash);
            return Commit::Stale;
        }

        let status = next.status;
        let diagnostics = next.diagnostics.len();
        self.state.send_replace(next);
        drop(latest);

        if status == CompileStatus::Failed {
            self.observer.on_failure(hash, diagnostics);
        }
        self.observer.on_commit(hash, status);
        Commit::Applied(status)
    }

    /// The latest requested hash. A panic while holding the lock cannot leave
    /// the hash half-written, so a poisoned lock is recovered.
    fn latest(&self) -> MutexGuard<'_, Option<String>> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn failed(hash: &str, diagnostics: Vec<Diagnostic>) -> CompileState {
    CompileState {
        status: CompileStatus::Failed,
        source_hash: Some(hash.to_string()),
        output: None,
        diagnostics,
        warnings: Vec::new(),
    }
}
