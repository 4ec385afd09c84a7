//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Serve (http/server.rs):
//!     Bind listener → Arm gate → Spawn watcher → Serve until closed → Wait on gate
//!
//! Signals (signals.rs, watcher.rs):
//!     SIGTERM/SIGINT/SIGQUIT → Run shutdown sequence
//!     SIGHUP → Ignored (reload)
//!
//! Shutdown (shutdown.rs):
//!     Close listener → Pre-drain hooks (bounded) → Grace wait
//!         → Cancel deadline → Post-drain hooks (unbounded) → Release gate
//! ```
//!
//! # Design Decisions
//! - Hooks are collected into an explicit [`ShutdownPlan`] before serving
//! - The signal source is injectable so shutdown is testable without the OS
//! - Exactly one shutdown sequence per process; later triggers are no-ops
//! - The main path never returns before post-drain hooks complete

pub mod closer;
pub mod gate;
pub mod hooks;
pub mod shutdown;
pub mod signals;
pub mod watcher;

pub use closer::ListenerCloser;
pub use gate::{GateError, GateRelease, GateWaiter, ProcessGate};
pub use hooks::{DrainPolicy, Hook, HookContext, HookPhase, PhasePolicy, ShutdownPlan, ShutdownPlanBuilder};
pub use shutdown::{PhaseOutcome, ShutdownOrchestrator, ShutdownOutcome, ShutdownState};
pub use signals::{ChannelSource, OsSignals, SignalAction, SignalTrigger, TerminationSignal, TerminationSource};
pub use watcher::{SignalWatcher, WatchExit};
