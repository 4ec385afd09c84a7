//! Shutdown coordination for the server.
//!
//! # State Machine
//! ```text
//! Idle ──signal──▶ Draining ──post-drain hooks done──▶ Exited
//! ```
//!
//! # Sequence
//! 1. Close the listener (no new connections, keep-alive off)
//! 2. Launch pre-drain hooks on their own task with a grace deadline
//! 3. Wait out the drain window (see [`DrainPolicy`])
//! 4. Cancel the deadline context
//! 5. Run post-drain hooks in order, unbounded
//! 6. Release the process gate

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinError, JoinHandle};

use crate::lifecycle::closer::ListenerCloser;
use crate::lifecycle::gate::GateRelease;
use crate::lifecycle::hooks::{DrainPolicy, Hook, HookContext, HookPhase, PhasePolicy, ShutdownPlan};
use crate::observability::metrics;

/// Lifecycle state of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Idle,
    Draining,
    Exited,
}

/// Result of a call to [`ShutdownOrchestrator::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// This call ran the sequence to completion.
    Completed,
    /// Shutdown was already triggered; nothing was run.
    AlreadyTriggered,
}

/// How a hook phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// Every hook in the phase ran.
    Completed { ran: usize },
    /// The drain window closed before every hook was started.
    Cancelled { ran: usize, skipped: usize },
    /// A hook panicked and the panic was recovered.
    Panicked,
}

impl PhaseOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseOutcome::Completed { .. } => "completed",
            PhaseOutcome::Cancelled { .. } => "cancelled",
            PhaseOutcome::Panicked => "panicked",
        }
    }
}

/// Runs the shutdown sequence exactly once.
pub struct ShutdownOrchestrator {
    plan: Arc<ShutdownPlan>,
    grace: Duration,
    drain_policy: DrainPolicy,
    closer: ListenerCloser,
    started: AtomicBool,
    state: watch::Sender<ShutdownState>,
    release: Mutex<Option<GateRelease>>,
}

impl ShutdownOrchestrator {
    pub fn new(
        plan: ShutdownPlan,
        grace: Duration,
        closer: ListenerCloser,
        release: GateRelease,
    ) -> Self {
        let (state, _) = watch::channel(ShutdownState::Idle);
        Self {
            drain_policy: plan.drain_policy().unwrap_or_default(),
            plan: Arc::new(plan),
            grace,
            closer,
            started: AtomicBool::new(false),
            state,
            release: Mutex::new(Some(release)),
        }
    }

    pub fn state(&self) -> ShutdownState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ShutdownState> {
        self.state.subscribe()
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    pub fn drain_policy(&self) -> DrainPolicy {
        self.drain_policy
    }

    /// Run the shutdown sequence.
    ///
    /// Only the first call does any work. A panic from a phase that does not
    /// recover panics propagates out of this call and leaves the gate closed.
    pub async fn shutdown(&self) -> ShutdownOutcome {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Shutdown already triggered, ignoring");
            return ShutdownOutcome::AlreadyTriggered;
        }

        // Dropped unreleased if anything below unwinds.
        let release = self.take_release();

        self.state.send_replace(ShutdownState::Draining);
        tracing::info!(
            grace_ms = self.grace.as_millis() as u64,
            drain_policy = ?self.drain_policy,
            "Shutdown started"
        );

        self.closer.close();

        let ctx = HookContext::with_timeout(self.grace);
        let (launched_tx, launched_rx) = oneshot::channel();
        let mut runner = tokio::spawn(run_phase(
            HookPhase::PreDrain,
            self.plan.hooks(HookPhase::PreDrain).to_vec(),
            ctx.clone(),
            self.plan.policy(HookPhase::PreDrain),
            Some(launched_tx),
        ));
        // The first pre-drain hook is running before the drain window opens.
        // An empty phase drops the sender.
        let _ = launched_rx.await;

        tracing::info!(grace = ?self.grace, "Waiting for the process to finish");
        let mut finished = None;
        match self.drain_policy {
            DrainPolicy::Fixed => tokio::time::sleep(self.grace).await,
            DrainPolicy::EarliestOf => {
                tokio::select! {
                    _ = tokio::time::sleep(self.grace) => {}
                    res = &mut runner => finished = Some(res),
                }
            }
        }
        ctx.cancel();

        if finished.is_none() {
            if runner.is_finished() {
                finished = Some(runner.await);
            } else {
                watch_late_runner(runner);
            }
        }
        report_pre_drain(finished);

        let outcome = run_phase(
            HookPhase::PostDrain,
            self.plan.hooks(HookPhase::PostDrain).to_vec(),
            HookContext::unbounded(),
            self.plan.policy(HookPhase::PostDrain),
            None,
        )
        .await;
        tracing::debug!(outcome = outcome.as_str(), "Post-drain hooks finished");

        if let Some(release) = release {
            release.release();
        }
        self.state.send_replace(ShutdownState::Exited);
        tracing::info!("Shutdown sequence complete");

        ShutdownOutcome::Completed
    }

    /// Give up on the gate without running shutdown, so the main path does
    /// not wait forever on a sequence that can no longer be triggered.
    ///
    /// The listener is closed too; hooks do not run.
    pub(crate) fn abandon(&self) {
        if self.take_release().is_some() {
            tracing::warn!("Process gate abandoned");
            self.closer.close();
        }
    }

    fn take_release(&self) -> Option<GateRelease> {
        self.release
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

fn report_pre_drain(finished: Option<Result<PhaseOutcome, JoinError>>) {
    match finished {
        Some(Ok(outcome)) => {
            tracing::debug!(outcome = outcome.as_str(), "Pre-drain hooks finished");
        }
        Some(Err(e)) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Some(Err(e)) => tracing::warn!(error = %e, "Pre-drain hook runner did not finish"),
        None => tracing::warn!("Pre-drain hooks still running past the grace deadline"),
    }
}

/// Keep an eye on a pre-drain runner that outlived the drain window, so a
/// panic it raises later is still logged. Resolves to that panic's message.
fn watch_late_runner(runner: JoinHandle<PhaseOutcome>) -> JoinHandle<Option<String>> {
    tokio::spawn(async move {
        match runner.await {
            Ok(outcome) => {
                tracing::info!(outcome = outcome.as_str(), "Late pre-drain hooks finished");
                None
            }
            Err(e) if e.is_panic() => {
                let message = panic_message(e.into_panic().as_ref());
                tracing::error!(panic = %message, "Pre-drain hook panicked after the drain window");
                metrics::record_hook_phase(HookPhase::PreDrain, "panicked");
                Some(message)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Late pre-drain runner did not finish");
                None
            }
        }
    })
}

async fn run_phase(
    phase: HookPhase,
    hooks: Vec<Hook>,
    ctx: HookContext,
    policy: PhasePolicy,
    launched: Option<oneshot::Sender<()>>,
) -> PhaseOutcome {
    if hooks.is_empty() {
        return PhaseOutcome::Completed { ran: 0 };
    }

    let outcome = if policy.recover_panics {
        match AssertUnwindSafe(run_hooks(phase, &hooks, &ctx, launched))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(payload) => {
                tracing::error!(
                    phase = %phase,
                    panic = %panic_message(payload.as_ref()),
                    "Recovered panic in shutdown hooks, abandoning phase"
                );
                PhaseOutcome::Panicked
            }
        }
    } else {
        run_hooks(phase, &hooks, &ctx, launched).await
    };

    metrics::record_hook_phase(phase, outcome.as_str());
    outcome
}

/// Run hooks in order. The first hook always starts; later ones are skipped
/// once `ctx` is cancelled.
async fn run_hooks(
    phase: HookPhase,
    hooks: &[Hook],
    ctx: &HookContext,
    mut launched: Option<oneshot::Sender<()>>,
) -> PhaseOutcome {
    for (i, hook) in hooks.iter().enumerate() {
        if i > 0 && ctx.is_cancelled() {
            let skipped = hooks.len() - i;
            tracing::warn!(phase = %phase, skipped, "Drain window closed, skipping remaining hooks");
            return PhaseOutcome::Cancelled { ran: i, skipped };
        }
        tracing::debug!(phase = %phase, hook = hook.name(), "Running shutdown hook");
        let call = hook.call(ctx.clone());
        if let Some(tx) = launched.take() {
            let _ = tx.send(());
        }
        call.await;
    }
    PhaseOutcome::Completed { ran: hooks.len() }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
