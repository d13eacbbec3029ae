/*
 * compile/debounce.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Debounced compile scheduling.
 */

//! Debounced compile scheduling.
//!
//! Source-change notifications go into a channel drained by one worker task.
//! The worker compiles only after a quiescence interval with no further
//! notifications, and runs at most one compile at a time. Notifications that
//! arrive while a compile is in flight supersede it (its result is
//! discarded) and are compiled once the current one settles and the
//! interval has passed again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::orchestrator::CompileOrchestrator;

/// Handle to a debounce worker.
pub struct Debouncer {
    sender: mpsc::UnboundedSender<String>,
    token: CancellationToken,
    worker: JoinHandle<()>,
}

impl Debouncer {
    /// Spawn a worker on the current tokio runtime.
    pub fn spawn(orchestrator: Arc<CompileOrchestrator>, delay: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let worker = tokio::spawn(run(orchestrator, receiver, delay, token.clone()));
        tracing::debug!(debounce_ms = delay.as_millis() as u64, "Started compile debouncer");
        Self {
            sender,
            token,
            worker,
        }
    }

    /// Report a new source text. Returns `false` if the worker has stopped.
    pub fn notify(&self, source: impl Into<String>) -> bool {
        self.sender.send(source.into()).is_ok()
    }

    /// Stop accepting notifications, compile whatever is pending, and wait
    /// for the worker to finish.
    pub async fn close(self) {
        let Self { sender, worker, .. } = self;
        drop(sender);
        if let Err(e) = worker.await {
            tracing::warn!(error = %e, "Debounce worker ended abnormally");
        }
    }

    /// Stop immediately. Pending notifications are dropped and a compile in
    /// flight is abandoned.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.worker.await {
            tracing::warn!(error = %e, "Debounce worker ended abnormally");
        }
    }
}

async fn run(
    orchestrator: Arc<CompileOrchestrator>,
    mut receiver: mpsc::UnboundedReceiver<String>,
    delay: Duration,
    token: CancellationToken,
) {
    let mut pending: Option<String> = None;
    let mut open = true;

    loop {
        let mut source = match pending.take() {
            Some(source) => source,
            None if !open => return,
            None => tokio::select! {
                biased;
                _ = token.cancelled() => return,
                received = receiver.recv() => match received {
                    Some(source) => source,
                    None => return,
                },
            },
        };

        // Wait for quiescence.
        while open {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                received = receiver.recv() => match received {
                    Some(newer) => source = newer,
                    None => open = false,
                },
                _ = tokio::time::sleep(delay) => break,
            }
        }

        let compile = orchestrator.compile(&source);
        tokio::pin!(compile);
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = &mut compile => break,
                received = receiver.recv(), if open => match received {
                    Some(newer) => {
                        orchestrator.supersede(&newer);
                        pending = Some(newer);
                    }
                    None => open = false,
                },
            }
        }
    }
}
