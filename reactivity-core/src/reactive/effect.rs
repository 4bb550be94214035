//! Reactive Effect
//!
//! A [`ReactiveEffect`] is a side-effecting action that reruns whenever one
//! of the observables it read has changed.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its action immediately inside a fresh
//!    [`EffectContext`] to collect its dependencies.
//!
//! 2. When any dependency changes, the context turns dirty and the effect
//!    asks its [`Scheduler`] to run it later. At most one such request is
//!    outstanding at a time.
//!
//! 3. When the deferred run fires, the effect reruns only if its context is
//!    still dirty. Any number of changes before that point therefore produce
//!    exactly one rerun.
//!
//! 4. Every rerun disposes the previous context and collects dependencies
//!    from scratch.
//!
//! # Differences from ComputedState
//!
//! - Computed states return a value; effects do not.
//! - Computed states are lazy (compute on read); effects are eager (rerun
//!   on change, via the scheduler).
//!
//! # Cleanup
//!
//! Disposal is terminal: it releases every dependency subscription and turns
//! any run already handed to the scheduler into a no-op. Dropping the last
//! handle has the same effect.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::context::{ContextState, EffectContext};
use super::observable::Observable;
use super::owner::Dispose;
use super::subscriber::Subscription;
use crate::config::ReactivityConfig;
use crate::scheduler::Scheduler;

struct ContextSlot {
    context: EffectContext,
    _link: Subscription,
}

struct EffectInner {
    action: Box<dyn Fn() + Send + Sync>,
    scheduler: Arc<dyn Scheduler>,
    slot: Mutex<Option<ContextSlot>>,
    enabled: AtomicBool,
    disposed: AtomicBool,
    /// A deferred run has been handed to the scheduler and has not fired.
    pending: AtomicBool,
    running: AtomicBool,
    /// A run was requested while the action was executing.
    rerun_requested: AtomicBool,
    runs: AtomicU64,
    auto_dispose: bool,
}

impl EffectInner {
    fn is_fresh(&self) -> bool {
        self.slot
            .lock()
            .as_ref()
            .is_some_and(|slot| slot.context.is_fresh())
    }

    fn run(self: &Arc<Self>) {
        if self.disposed.load(Ordering::Acquire) || !self.enabled.load(Ordering::Acquire) {
            return;
        }
        if self.is_fresh() {
            return;
        }
        // A run requested from inside the action is picked up afterwards.
        if self.running.swap(true, Ordering::AcqRel) {
            self.rerun_requested.store(true, Ordering::Release);
            return;
        }
        let running = RunningFlag(&self.running);
        self.rerun_requested.store(false, Ordering::Release);

        let context = EffectContext::new();
        let weak = Arc::downgrade(self);
        let link = context.subscribe(move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_invalidated();
            }
        });

        let previous = self.slot.lock().replace(ContextSlot {
            context: context.clone(),
            _link: link,
        });
        if let Some(previous) = previous {
            previous.context.dispose();
        }

        context.run_tracked(|| (self.action)());

        let runs = self.runs.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(
            effect = context.id().raw(),
            runs,
            dependencies = context.dependency_count(),
            "effect ran"
        );

        if self.auto_dispose && !context.is_disposed() && context.is_empty() {
            tracing::debug!("effect read no observables; disposing");
            self.dispose();
            return;
        }

        let requested = self.rerun_requested.swap(false, Ordering::AcqRel);
        drop(running);
        if requested {
            // Stale the finished run so the scheduled one is not skipped as fresh.
            if let Some(slot) = self.slot.lock().take() {
                slot.context.dispose();
            }
        }
        if requested || context.state() == ContextState::Dirty {
            self.on_invalidated();
        }
    }

    fn on_invalidated(self: &Arc<Self>) {
        if self.enabled.load(Ordering::Acquire) && !self.disposed.load(Ordering::Acquire) {
            self.schedule();
        }
    }

    fn schedule(self: &Arc<Self>) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }
        if self.pending.swap(true, Ordering::AcqRel) {
            return;
        }

        let pending = PendingRun {
            effect: Arc::downgrade(self),
        };
        self.scheduler.defer(Box::new(move || pending.fire()));
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.enabled.store(false, Ordering::Release);
        if let Some(slot) = self.slot.lock().take() {
            slot.context.dispose();
        }
        tracing::debug!(runs = self.runs.load(Ordering::Acquire), "effect disposed");
    }
}

/// A run handed to the scheduler. Clears the pending flag when it fires or
/// when the scheduler drops it without running it.
struct PendingRun {
    effect: Weak<EffectInner>,
}

impl PendingRun {
    fn fire(mut self) {
        let effect = std::mem::take(&mut self.effect);
        if let Some(inner) = effect.upgrade() {
            inner.pending.store(false, Ordering::Release);
            inner.run();
        }
    }
}

impl Drop for PendingRun {
    fn drop(&mut self) {
        if let Some(inner) = self.effect.upgrade() {
            inner.pending.store(false, Ordering::Release);
        }
    }
}

struct RunningFlag<'a>(&'a AtomicBool);

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A side-effecting action that reruns when its dependencies change.
///
/// Cloning produces another handle to the same effect. The effect lives as
/// long as any handle does.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use reactivity_core::{ImmediateScheduler, ReactiveEffect, ReactiveState};
///
/// let name = ReactiveState::new(String::from("player"));
/// let effect = ReactiveEffect::new(Arc::new(ImmediateScheduler), {
///     let name = name.clone();
///     move || println!("name: {}", name.read())
/// });
///
/// name.write(String::from("host")); // reruns right away
/// assert_eq!(effect.run_count(), 2);
/// ```
#[derive(Clone)]
#[must_use = "dropping every handle to an effect disposes it"]
pub struct ReactiveEffect {
    inner: Arc<EffectInner>,
}

impl ReactiveEffect {
    /// Create an effect and run it immediately.
    pub fn new<F>(scheduler: Arc<dyn Scheduler>, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::with_config(scheduler, &ReactivityConfig::default(), action)
    }

    /// Create an effect using `config`, and run it immediately.
    pub fn with_config<F>(scheduler: Arc<dyn Scheduler>, config: &ReactivityConfig, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self {
            inner: Arc::new(EffectInner {
                action: Box::new(action),
                scheduler,
                slot: Mutex::new(None),
                enabled: AtomicBool::new(true),
                disposed: AtomicBool::new(false),
                pending: AtomicBool::new(false),
                running: AtomicBool::new(false),
                rerun_requested: AtomicBool::new(false),
                runs: AtomicU64::new(0),
                auto_dispose: config.auto_dispose_unobserved_effects,
            }),
        };

        // Run immediately to establish dependencies
        effect.inner.run();

        effect
    }

    /// Rerun even if no dependency changed.
    ///
    /// Discards the current context first, so the next run always executes.
    /// Called from inside the effect's own action, the rerun happens once the
    /// action returns.
    pub fn force_rerun(&self, deferred: bool) {
        if self.inner.running.load(Ordering::Acquire) {
            self.inner.rerun_requested.store(true, Ordering::Release);
            return;
        }
        if let Some(slot) = self.inner.slot.lock().take() {
            slot.context.dispose();
        }
        self.safe_rerun(deferred);
    }

    /// Rerun only if a dependency changed (or the effect never ran).
    ///
    /// This is how a disabled effect catches up after being re-enabled.
    pub fn safe_rerun(&self, deferred: bool) {
        if deferred {
            self.inner.schedule();
        } else {
            self.inner.run();
        }
    }

    /// Enable or disable reactions to dependency changes.
    ///
    /// A disabled effect ignores invalidations; enabling it again does not
    /// rerun it by itself. A disposed effect stays disabled.
    pub fn set_enabled(&self, enabled: bool) {
        if enabled && self.is_disposed() {
            return;
        }
        self.inner.enabled.store(enabled, Ordering::Release);
    }

    /// Whether the effect reacts to dependency changes.
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    /// Disable the effect until the returned guard is dropped.
    ///
    /// The guard restores the enabled state found on entry, so nested scopes
    /// compose.
    pub fn disabled_scope(&self) -> DisabledScope {
        let previous = self.inner.enabled.swap(false, Ordering::AcqRel);
        DisabledScope {
            effect: self.clone(),
            previous,
        }
    }

    /// Whether the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Whether the next run would execute the action.
    pub fn is_dirty(&self) -> bool {
        !self.inner.is_fresh()
    }

    /// Whether a deferred run is waiting in the scheduler.
    pub fn is_pending(&self) -> bool {
        self.inner.pending.load(Ordering::Acquire)
    }

    /// Number of completed runs.
    pub fn run_count(&self) -> u64 {
        self.inner.runs.load(Ordering::Acquire)
    }

    /// Number of dependencies read by the latest run.
    pub fn dependency_count(&self) -> usize {
        self.inner
            .slot
            .lock()
            .as_ref()
            .map_or(0, |slot| slot.context.dependency_count())
    }

    /// State of the context from the latest run.
    pub fn context_state(&self) -> Option<ContextState> {
        self.inner.slot.lock().as_ref().map(|slot| slot.context.state())
    }
}

impl Dispose for ReactiveEffect {
    /// Stop reacting, release every dependency and neutralize any pending
    /// deferred run. Terminal.
    fn dispose(&self) {
        self.inner.dispose();
    }
}

impl fmt::Debug for ReactiveEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveEffect")
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("enabled", &self.is_enabled())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Keeps an effect disabled while alive. See [`ReactiveEffect::disabled_scope`].
#[must_use = "the effect is re-enabled as soon as the scope is dropped"]
pub struct DisabledScope {
    effect: ReactiveEffect,
    previous: bool,
}

impl Drop for DisabledScope {
    fn drop(&mut self) {
        self.effect.set_enabled(self.previous);
    }
}

impl fmt::Debug for DisabledScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisabledScope")
            .field("restores", &self.previous)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::signal::ReactiveState;
    use crate::scheduler::{DeferredQueue, ImmediateScheduler};
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::AtomicI32;

    fn counter() -> (Arc<AtomicI32>, Arc<AtomicI32>) {
        let count = Arc::new(AtomicI32::new(0));
        (count.clone(), count)
    }

    fn effect_on(queue: &DeferredQueue, state: &ReactiveState<i32>) -> (ReactiveEffect, Arc<AtomicI32>) {
        let (runs, runs_clone) = counter();
        let state = state.clone();
        let effect = ReactiveEffect::new(Arc::new(queue.clone()), move || {
            state.read();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });
        (effect, runs)
    }

    #[test]
    fn runs_on_creation() {
        let (runs, runs_clone) = counter();

        let effect = ReactiveEffect::new(Arc::new(ImmediateScheduler), move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        // Effect should have run once on creation
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn rerun_is_deferred_until_flush() {
        let queue = DeferredQueue::new();
        let state = ReactiveState::new(0);
        let (effect, runs) = effect_on(&queue, &state);

        state.write(1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(effect.is_pending());
        assert_eq!(queue.pending(), 1);

        queue.flush().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(!effect.is_pending());
        assert!(!effect.is_dirty());
    }

    #[test]
    fn unread_state_does_not_trigger() {
        let queue = DeferredQueue::new();
        let read = ReactiveState::new(0);
        let unread = ReactiveState::new(0);
        let (_effect, runs) = effect_on(&queue, &read);

        unread.write(1);
        assert!(queue.is_empty());
        queue.flush().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn several_changes_coalesce_into_one_rerun() {
        let queue = DeferredQueue::new();
        let a = ReactiveState::new(0);
        let b = ReactiveState::new(0);
        let c = ReactiveState::new(0);
        let (runs, runs_clone) = counter();

        let _effect = ReactiveEffect::new(Arc::new(queue.clone()), {
            let (a, b, c) = (a.clone(), b.clone(), c.clone());
            move || {
                a.read();
                b.read();
                c.read();
                runs_clone.fetch_add(1, Ordering::SeqCst);
            }
        });

        a.write(1);
        b.write(1);
        c.write(1);
        assert_eq!(queue.pending(), 1);

        queue.flush().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn duplicate_deferred_runs_still_run_once() {
        // Manual deferred requests while a run is already queued add nothing.
        let queue = DeferredQueue::new();
        let state = ReactiveState::new(0);
        let (effect, runs) = effect_on(&queue, &state);

        state.write(1);
        effect.safe_rerun(true);
        effect.safe_rerun(true);
        queue.flush().unwrap();

        effect.safe_rerun(false);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn immediate_scheduler_reruns_synchronously() {
        let state = ReactiveState::new(0);
        let seen = Arc::new(AtomicI32::new(-1));
        let seen_clone = seen.clone();

        let effect = ReactiveEffect::new(Arc::new(ImmediateScheduler), {
            let state = state.clone();
            move || seen_clone.store(state.read(), Ordering::SeqCst)
        });

        state.write(42);
        assert_eq!(seen.load(Ordering::SeqCst), 42);
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn dispose_stops_propagation_and_releases_dependencies() {
        let queue = DeferredQueue::new();
        let flag = ReactiveState::new(true);
        let (runs, runs_clone) = counter();

        let effect = ReactiveEffect::new(Arc::new(queue.clone()), {
            let flag = flag.clone();
            move || {
                flag.read();
                runs_clone.fetch_add(1, Ordering::SeqCst);
            }
        });

        effect.dispose();
        assert!(effect.is_disposed());
        assert!(!effect.is_enabled());
        assert_eq!(flag.subscriber_count(), 0);

        for _ in 0..10 {
            flag.update(|v| !v);
            queue.flush().unwrap();
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // Terminal: cannot be re-enabled or rerun.
        effect.set_enabled(true);
        effect.force_rerun(false);
        assert!(!effect.is_enabled());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pending_run_is_a_no_op_after_dispose() {
        let queue = DeferredQueue::new();
        let state = ReactiveState::new(0);
        let (effect, runs) = effect_on(&queue, &state);

        state.write(1);
        assert_eq!(queue.pending(), 1);

        effect.dispose();
        assert_eq!(queue.flush().unwrap(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_every_handle_stops_the_effect() {
        let queue = DeferredQueue::new();
        let state = ReactiveState::new(0);
        let (effect, runs) = effect_on(&queue, &state);

        state.write(1);
        drop(effect);
        assert_eq!(state.subscriber_count(), 0);

        queue.flush().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn switching_branches_rebuilds_dependencies() {
        let queue = DeferredQueue::new();
        let use_a = ReactiveState::new(true);
        let a = ReactiveState::new(0);
        let b = ReactiveState::new(0);

        let effect = ReactiveEffect::new(Arc::new(queue.clone()), {
            let (use_a, a, b) = (use_a.clone(), a.clone(), b.clone());
            move || {
                if use_a.read() {
                    a.read();
                } else {
                    b.read();
                }
            }
        });

        use_a.write(false);
        queue.flush().unwrap();
        assert_eq!(effect.run_count(), 2);

        a.write(1);
        assert!(queue.is_empty());

        b.write(1);
        queue.flush().unwrap();
        assert_eq!(effect.run_count(), 3);
    }

    #[test]
    fn disabled_effect_ignores_changes_until_safe_rerun() {
        let queue = DeferredQueue::new();
        let state = ReactiveState::new(0);
        let (effect, runs) = effect_on(&queue, &state);

        effect.set_enabled(false);
        state.write(1);
        assert!(queue.is_empty());
        assert!(effect.is_dirty());

        effect.set_enabled(true);
        queue.flush().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        effect.safe_rerun(false);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        // Clean now, so another safe rerun does nothing.
        effect.safe_rerun(false);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn disabled_scope_restores_previous_state() {
        let queue = DeferredQueue::new();
        let state = ReactiveState::new(0);
        let (effect, _runs) = effect_on(&queue, &state);

        {
            let _outer = effect.disabled_scope();
            {
                let _inner = effect.disabled_scope();
                assert!(!effect.is_enabled());
            }
            assert!(!effect.is_enabled());
            state.write(1);
        }
        assert!(effect.is_enabled());
        assert!(queue.is_empty());
    }

    #[test]
    fn disabled_scope_is_restored_on_panic() {
        let state = ReactiveState::new(0);
        let (effect, _runs) = effect_on(&DeferredQueue::new(), &state);

        let result = catch_unwind(AssertUnwindSafe(|| {
            let _scope = effect.disabled_scope();
            panic!("work failed");
        }));
        assert!(result.is_err());
        assert!(effect.is_enabled());
    }

    #[test]
    fn disabled_scope_does_not_revive_a_disposed_effect() {
        let state = ReactiveState::new(0);
        let (effect, _runs) = effect_on(&DeferredQueue::new(), &state);

        let scope = effect.disabled_scope();
        effect.dispose();
        drop(scope);
        assert!(!effect.is_enabled());
    }

    #[test]
    fn force_rerun_runs_even_when_clean() {
        let queue = DeferredQueue::new();
        let state = ReactiveState::new(0);
        let (effect, runs) = effect_on(&queue, &state);

        effect.force_rerun(false);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        effect.force_rerun(true);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        queue.flush().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn force_rerun_from_inside_the_action_reruns_afterwards() {
        let queue = DeferredQueue::new();
        let state = ReactiveState::new(0);
        let restart = Arc::new(AtomicBool::new(false));
        let handle: Arc<Mutex<Option<ReactiveEffect>>> = Arc::new(Mutex::new(None));
        let (runs, runs_clone) = counter();
        let (observers, observers_clone) = counter();

        let effect = ReactiveEffect::new(Arc::new(queue.clone()), {
            let (state, restart, handle) = (state.clone(), restart.clone(), handle.clone());
            move || {
                state.read();
                runs_clone.fetch_add(1, Ordering::SeqCst);
                if restart.swap(false, Ordering::SeqCst) {
                    let effect = handle.lock().clone();
                    if let Some(effect) = effect {
                        effect.force_rerun(false);
                    }
                    observers_clone.store(state.subscriber_count() as i32, Ordering::SeqCst);
                }
            }
        });
        *handle.lock() = Some(effect.clone());

        restart.store(true, Ordering::SeqCst);
        effect.force_rerun(false);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(observers.load(Ordering::SeqCst), 1);
        assert_eq!(queue.pending(), 1);

        queue.flush().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(effect.dependency_count(), 1);
        assert_eq!(state.subscriber_count(), 1);

        // Still reacting.
        state.write(1);
        queue.flush().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 4);

        handle.lock().take();
    }

    #[test]
    fn panicking_run_keeps_partial_dependencies() {
        let queue = DeferredQueue::new();
        let fail = ReactiveState::new(false);
        let value = ReactiveState::new(0);
        let (runs, runs_clone) = counter();

        let effect = ReactiveEffect::new(Arc::new(queue.clone()), {
            let (fail, value) = (fail.clone(), value.clone());
            move || {
                if fail.read() {
                    panic!("effect failed");
                }
                value.read();
                runs_clone.fetch_add(1, Ordering::SeqCst);
            }
        });

        fail.write(true);
        let result = catch_unwind(AssertUnwindSafe(|| queue.flush()));
        assert!(result.is_err());
        assert_eq!(effect.context_state(), Some(ContextState::Faulted));
        assert!(effect.is_dirty());
        assert_eq!(fail.subscriber_count(), 1);
        assert_eq!(value.subscriber_count(), 0);

        // The dependency read before the panic still schedules a retry.
        fail.write(false);
        assert_eq!(queue.pending(), 1);
        queue.flush().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(effect.context_state(), Some(ContextState::Clean));
    }

    #[test]
    fn auto_dispose_releases_effects_without_dependencies() {
        let config = ReactivityConfig {
            auto_dispose_unobserved_effects: true,
            ..ReactivityConfig::default()
        };
        let state = ReactiveState::new(0);

        let idle = ReactiveEffect::with_config(Arc::new(ImmediateScheduler), &config, || {});
        assert!(idle.is_disposed());

        let observing = ReactiveEffect::with_config(Arc::new(ImmediateScheduler), &config, {
            let state = state.clone();
            move || {
                state.read();
            }
        });
        assert!(!observing.is_disposed());
    }
}
