//! Signal watch loop: the single entry point into shutdown.

use std::sync::Arc;

use crate::lifecycle::shutdown::ShutdownOrchestrator;
use crate::lifecycle::signals::{SignalAction, TerminationSource};

/// Why the watch loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchExit {
    /// A termination signal arrived and the shutdown sequence finished.
    ShutdownComplete,
    /// The source stopped producing signals before any termination request.
    SourceClosed,
}

/// Waits for termination signals and runs the shutdown sequence once.
pub struct SignalWatcher<S> {
    source: S,
    orchestrator: Arc<ShutdownOrchestrator>,
}

impl<S: TerminationSource> SignalWatcher<S> {
    pub fn new(source: S, orchestrator: Arc<ShutdownOrchestrator>) -> Self {
        Self { source, orchestrator }
    }

    /// Watch until a termination signal has been fully handled.
    pub async fn run(mut self) -> WatchExit {
        loop {
            let Some(signal) = self.source.next_signal().await else {
                tracing::warn!("Signal source closed, shutdown can no longer be triggered");
                self.orchestrator.abandon();
                return WatchExit::SourceClosed;
            };

            match signal.action() {
                SignalAction::Shutdown => {
                    tracing::warn!(signal = %signal, "Received signal, stopping the process");
                    self.orchestrator.shutdown().await;
                    return WatchExit::ShutdownComplete;
                }
                SignalAction::Reload => {
                    tracing::info!(signal = %signal, "Received reload signal, nothing to reload");
                }
                SignalAction::Unrecognized => {
                    tracing::warn!(signal = %signal, "Ignoring unrecognized signal");
                }
            }
        }
    }
}
