//! OS signal handling.
//!
//! # Responsibilities
//! - Register handlers for SIGHUP, SIGINT, SIGQUIT and SIGTERM
//! - Translate delivered signals into [`TerminationSignal`] values
//! - Offer an in-process source so shutdown can be driven without real signals
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGINT/SIGQUIT/SIGTERM request shutdown; SIGHUP is reserved for reload
//! - The watcher depends on the [`TerminationSource`] trait, not on the OS

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// A termination-class signal observed by the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Hangup,
    Interrupt,
    Quit,
    Terminate,
    /// Any other signal number delivered by a custom source.
    Other(i32),
}

/// What the watcher does with a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// Run the shutdown sequence.
    Shutdown,
    /// Reload-class signal; keep watching.
    Reload,
    /// Not a signal the watcher knows how to handle.
    Unrecognized,
}

impl TerminationSignal {
    pub fn action(&self) -> SignalAction {
        match self {
            TerminationSignal::Interrupt
            | TerminationSignal::Quit
            | TerminationSignal::Terminate => SignalAction::Shutdown,
            TerminationSignal::Hangup => SignalAction::Reload,
            TerminationSignal::Other(_) => SignalAction::Unrecognized,
        }
    }
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationSignal::Hangup => f.write_str("SIGHUP"),
            TerminationSignal::Interrupt => f.write_str("SIGINT"),
            TerminationSignal::Quit => f.write_str("SIGQUIT"),
            TerminationSignal::Terminate => f.write_str("SIGTERM"),
            TerminationSignal::Other(n) => write!(f, "signal {}", n),
        }
    }
}

/// Something that can be waited on for termination requests.
#[async_trait]
pub trait TerminationSource: Send {
    /// Wait for the next signal. `None` means no further signals can arrive.
    async fn next_signal(&mut self) -> Option<TerminationSignal>;
}

/// Real OS signals.
#[cfg(unix)]
pub struct OsSignals {
    hangup: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl OsSignals {
    /// Install handlers for the four termination-class signals.
    pub fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            hangup: signal(SignalKind::hangup())?,
            interrupt: signal(SignalKind::interrupt())?,
            quit: signal(SignalKind::quit())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }
}

#[cfg(unix)]
#[async_trait]
impl TerminationSource for OsSignals {
    async fn next_signal(&mut self) -> Option<TerminationSignal> {
        tokio::select! {
            s = self.hangup.recv() => s.map(|_| TerminationSignal::Hangup),
            s = self.interrupt.recv() => s.map(|_| TerminationSignal::Interrupt),
            s = self.quit.recv() => s.map(|_| TerminationSignal::Quit),
            s = self.terminate.recv() => s.map(|_| TerminationSignal::Terminate),
        }
    }
}

/// Real OS signals. Only Ctrl+C is available off unix.
#[cfg(not(unix))]
pub struct OsSignals {
    _private: (),
}

#[cfg(not(unix))]
impl OsSignals {
    pub fn install() -> std::io::Result<Self> {
        Ok(Self { _private: () })
    }
}

#[cfg(not(unix))]
#[async_trait]
impl TerminationSource for OsSignals {
    async fn next_signal(&mut self) -> Option<TerminationSignal> {
        match tokio::signal::ctrl_c().await {
            Ok(()) => Some(TerminationSignal::Interrupt),
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                None
            }
        }
    }
}

/// In-process signal source fed by a [`SignalTrigger`].
pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<TerminationSignal>,
}

/// Sending half of a [`ChannelSource`].
#[derive(Debug, Clone)]
pub struct SignalTrigger {
    tx: mpsc::UnboundedSender<TerminationSignal>,
}

impl ChannelSource {
    pub fn channel() -> (SignalTrigger, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SignalTrigger { tx }, Self { rx })
    }
}

impl SignalTrigger {
    /// Deliver a signal. Returns `false` if the watcher has already exited.
    pub fn send(&self, signal: TerminationSignal) -> bool {
        self.tx.send(signal).is_ok()
    }
}

#[async_trait]
impl TerminationSource for ChannelSource {
    async fn next_signal(&mut self) -> Option<TerminationSignal> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_actions() {
        assert_eq!(TerminationSignal::Interrupt.action(), SignalAction::Shutdown);
        assert_eq!(TerminationSignal::Quit.action(), SignalAction::Shutdown);
        assert_eq!(TerminationSignal::Terminate.action(), SignalAction::Shutdown);
        assert_eq!(TerminationSignal::Hangup.action(), SignalAction::Reload);
        assert_eq!(TerminationSignal::Other(10).action(), SignalAction::Unrecognized);
    }

    #[test]
    fn display_names() {
        assert_eq!(TerminationSignal::Terminate.to_string(), "SIGTERM");
        assert_eq!(TerminationSignal::Other(12).to_string(), "signal 12");
    }

    #[tokio::test]
    async fn channel_source_delivers_in_order_then_closes() {
        let (trigger, mut source) = ChannelSource::channel();
        assert!(trigger.send(TerminationSignal::Hangup));
        assert!(trigger.send(TerminationSignal::Terminate));
        drop(trigger);

        assert_eq!(source.next_signal().await, Some(TerminationSignal::Hangup));
        assert_eq!(source.next_signal().await, Some(TerminationSignal::Terminate));
        assert_eq!(source.next_signal().await, None);
    }
}
