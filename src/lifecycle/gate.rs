//! Process gate: holds the main path until shutdown work has finished.

use tokio::sync::oneshot;

/// Error returned by [`GateWaiter::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// The release side was dropped without opening the gate, e.g. because
    /// a post-drain hook panicked.
    #[error("process gate was abandoned before shutdown completed")]
    Abandoned,
}

/// Single-use barrier between the shutdown orchestrator and the main path.
///
/// A waiter can only be obtained by arming the gate, so the main path can
/// never block on a gate that nothing will release.
pub struct ProcessGate;

impl ProcessGate {
    /// Arm the gate, returning the producer and consumer halves.
    pub fn arm() -> (GateRelease, GateWaiter) {
        let (tx, rx) = oneshot::channel();
        (GateRelease { tx }, GateWaiter { rx })
    }
}

/// Producer half. Opening consumes it, so the gate opens at most once.
#[derive(Debug)]
pub struct GateRelease {
    tx: oneshot::Sender<()>,
}

impl GateRelease {
    pub fn release(self) {
        // Waiter may already be gone if the main path bailed on a serve error.
        let _ = self.tx.send(());
    }
}

/// Consumer half held by the main path.
#[derive(Debug)]
pub struct GateWaiter {
    rx: oneshot::Receiver<()>,
}

impl GateWaiter {
    /// Block until the gate is released.
    pub async fn wait(self) -> Result<(), GateError> {
        self.rx.await.map_err(|_| GateError::Abandoned)
    }
}
