//! Listener shutdown handle.
//!
//! # Responsibilities
//! - Stop the serve loop from accepting new connections
//! - Let hyper drain in-flight connections with keep-alive disabled
//!
//! # Design Decisions
//! - Closing only initiates shutdown; it never waits for the drain
//! - Idempotent: closing twice, or before serving starts, is harmless

use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

/// Handle that stops the HTTP listener.
///
/// The serve loop passes [`ListenerCloser::closed`] to axum's graceful
/// shutdown. Once it resolves, hyper stops accepting, turns off keep-alive on
/// open HTTP/1 connections and lets in-flight requests finish.
#[derive(Debug, Clone, Default)]
pub struct ListenerCloser {
    token: CancellationToken,
}

impl ListenerCloser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the listener to stop accepting new work.
    pub fn close(&self) {
        if self.token.is_cancelled() {
            tracing::debug!("Listener already closed");
            return;
        }
        tracing::info!("Closing HTTP listener, keep-alive disabled");
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Future that resolves once [`close`](Self::close) has been called.
    pub fn closed(&self) -> WaitForCancellationFutureOwned {
        self.token.clone().cancelled_owned()
    }
}
