//! Shutdown hooks and the plan that orders them.
//!
//! # Responsibilities
//! - Define the two hook phases (pre-drain, post-drain)
//! - Carry the execution context handed to each hook
//! - Collect hooks in registration order before serving starts
//!
//! # Design Decisions
//! - The plan is built once and is immutable afterwards; no global registry
//! - `None` entries are dropped at registration time
//! - Panic recovery and drain timing are explicit per-plan policies

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Phase a hook belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    /// Runs concurrently with connection draining, bounded by the grace period.
    PreDrain,
    /// Runs after the grace period, sequentially and to completion.
    PostDrain,
}

impl HookPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookPhase::PreDrain => "pre_drain",
            HookPhase::PostDrain => "post_drain",
        }
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How long the orchestrator waits before starting post-drain hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainPolicy {
    /// Always wait the full grace period, even if pre-drain hooks finish early.
    #[default]
    Fixed,
    /// Stop waiting as soon as pre-drain hooks finish or the grace period ends.
    EarliestOf,
}

/// Per-phase execution policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhasePolicy {
    /// Catch a panic raised by any hook in the phase and abandon the rest
    /// of the phase instead of propagating it.
    ///
    /// A pre-drain panic only propagates if it lands before the drain
    /// window closes; a later one is logged.
    pub recover_panics: bool,
}

impl PhasePolicy {
    pub const fn recovering() -> Self {
        Self { recover_panics: true }
    }

    pub const fn propagating() -> Self {
        Self { recover_panics: false }
    }
}

/// Execution context handed to a hook.
///
/// Pre-drain hooks receive a context carrying the grace deadline; it is
/// cancelled once the drain window closes. Post-drain hooks receive an
/// unbounded context that is never cancelled.
#[derive(Debug, Clone)]
pub struct HookContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl HookContext {
    /// A context with no deadline.
    pub fn unbounded() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// A context whose deadline is `grace` from now.
    pub fn with_timeout(grace: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + grace),
        }
    }

    /// Deadline of the drain window, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline. `None` for unbounded contexts.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the context is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }
}

type HookFn = dyn Fn(HookContext) -> BoxFuture<'static, ()> + Send + Sync;

/// A unit of cleanup work run during shutdown.
#[derive(Clone)]
pub struct Hook {
    name: Arc<str>,
    f: Arc<HookFn>,
}

impl Hook {
    /// Create an anonymous hook.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::named("anonymous", f)
    }

    /// Create a hook with a name used in log lines.
    pub fn named<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name: String = name.into();
        let f: Arc<HookFn> =
            Arc::new(move |ctx: HookContext| -> BoxFuture<'static, ()> { Box::pin(f(ctx)) });
        Self {
            name: Arc::from(name),
            f,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn call(&self, ctx: HookContext) -> BoxFuture<'static, ()> {
        (self.f)(ctx)
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook").field("name", &self.name).finish()
    }
}

/// Ordered shutdown hooks plus the policies they run under.
#[derive(Debug, Clone)]
pub struct ShutdownPlan {
    pre_drain: Vec<Hook>,
    post_drain: Vec<Hook>,
    pre_drain_policy: PhasePolicy,
    post_drain_policy: PhasePolicy,
    drain_policy: Option<DrainPolicy>,
}

impl ShutdownPlan {
    pub fn builder() -> ShutdownPlanBuilder {
        ShutdownPlanBuilder::default()
    }

    /// A plan with no hooks and default policies.
    pub fn empty() -> Self {
        Self::builder().build()
    }

    pub fn hooks(&self, phase: HookPhase) -> &[Hook] {
        match phase {
            HookPhase::PreDrain => &self.pre_drain,
            HookPhase::PostDrain => &self.post_drain,
        }
    }

    pub fn policy(&self, phase: HookPhase) -> PhasePolicy {
        match phase {
            HookPhase::PreDrain => self.pre_drain_policy,
            HookPhase::PostDrain => self.post_drain_policy,
        }
    }

    /// Drain policy chosen on the builder, if one was set explicitly.
    pub fn drain_policy(&self) -> Option<DrainPolicy> {
        self.drain_policy
    }

    pub(crate) fn with_default_drain_policy(mut self, policy: DrainPolicy) -> Self {
        self.drain_policy.get_or_insert(policy);
        self
    }
}

impl Default for ShutdownPlan {
    fn default() -> Self {
        Self::empty()
    }
}

/// Append-only builder for a [`ShutdownPlan`].
#[derive(Debug)]
pub struct ShutdownPlanBuilder {
    plan: ShutdownPlan,
}

impl Default for ShutdownPlanBuilder {
    fn default() -> Self {
        Self {
            plan: ShutdownPlan {
                pre_drain: Vec::new(),
                post_drain: Vec::new(),
                pre_drain_policy: PhasePolicy::recovering(),
                post_drain_policy: PhasePolicy::propagating(),
                drain_policy: None,
            },
        }
    }
}

impl ShutdownPlanBuilder {
    /// Append hooks to a phase. `None` entries are skipped.
    pub fn add<I, H>(mut self, phase: HookPhase, hooks: I) -> Self
    where
        I: IntoIterator<Item = H>,
        H: Into<Option<Hook>>,
    {
        let target = match phase {
            HookPhase::PreDrain => &mut self.plan.pre_drain,
            HookPhase::PostDrain => &mut self.plan.post_drain,
        };
        target.extend(hooks.into_iter().filter_map(Into::into));
        self
    }

    /// Append hooks that run while the listener drains.
    pub fn on_shutdown<I, H>(self, hooks: I) -> Self
    where
        I: IntoIterator<Item = H>,
        H: Into<Option<Hook>>,
    {
        self.add(HookPhase::PreDrain, hooks)
    }

    /// Append hooks that run after the grace period, before the process exits.
    pub fn on_exit<I, H>(self, hooks: I) -> Self
    where
        I: IntoIterator<Item = H>,
        H: Into<Option<Hook>>,
    {
        self.add(HookPhase::PostDrain, hooks)
    }

    pub fn recover_panics(mut self, phase: HookPhase, recover: bool) -> Self {
        let policy = PhasePolicy { recover_panics: recover };
        match phase {
            HookPhase::PreDrain => self.plan.pre_drain_policy = policy,
            HookPhase::PostDrain => self.plan.post_drain_policy = policy,
        }
        self
    }

    pub fn drain_policy(mut self, policy: DrainPolicy) -> Self {
        self.plan.drain_policy = Some(policy);
        self
    }

    pub fn build(self) -> ShutdownPlan {
        self.plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &str) -> Hook {
        Hook::named(name, |_ctx| async {})
    }

    #[test]
    fn builder_preserves_insertion_order_across_calls() {
        let plan = ShutdownPlan::builder()
            .on_shutdown([noop("a"), noop("b")])
            .on_exit([noop("x")])
            .on_shutdown([noop("c")])
            .build();

        let names: Vec<_> = plan.hooks(HookPhase::PreDrain).iter().map(Hook::name).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(plan.hooks(HookPhase::PostDrain).len(), 1);
    }

    #[test]
    fn none_entries_are_ignored() {
        let plan = ShutdownPlan::builder()
            .on_exit([None, Some(noop("kept")), None])
            .build();

        assert_eq!(plan.hooks(HookPhase::PostDrain).len(), 1);
        assert_eq!(plan.hooks(HookPhase::PostDrain)[0].name(), "kept");
        assert!(plan.hooks(HookPhase::PreDrain).is_empty());
    }

    #[test]
    fn default_policies_are_asymmetric() {
        let plan = ShutdownPlan::empty();
        assert!(plan.policy(HookPhase::PreDrain).recover_panics);
        assert!(!plan.policy(HookPhase::PostDrain).recover_panics);
        assert_eq!(plan.drain_policy(), None);
    }

    #[test]
    fn explicit_drain_policy_wins_over_default() {
        let plan = ShutdownPlan::builder()
            .drain_policy(DrainPolicy::EarliestOf)
            .build()
            .with_default_drain_policy(DrainPolicy::Fixed);
        assert_eq!(plan.drain_policy(), Some(DrainPolicy::EarliestOf));

        let plan = ShutdownPlan::empty().with_default_drain_policy(DrainPolicy::Fixed);
        assert_eq!(plan.drain_policy(), Some(DrainPolicy::Fixed));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_context_reports_remaining_time() {
        let ctx = HookContext::with_timeout(Duration::from_secs(5));
        assert_eq!(ctx.remaining(), Some(Duration::from_secs(5)));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(ctx.remaining(), Some(Duration::from_secs(3)));
        assert!(!ctx.is_cancelled());

        ctx.cancel();
        assert!(ctx.is_cancelled());
        assert!(HookContext::unbounded().remaining().is_none());
    }
}
