//! Computed State
//!
//! A [`ComputedState`] is a cached derived value that re-evaluates only when
//! one of the observables it read last time has changed.
//!
//! # How Computed States Work
//!
//! 1. The compute function runs inside a fresh [`EffectContext`], which
//!    records every observable it reads.
//!
//! 2. Reading again while that context is clean returns the cached value
//!    without calling the function.
//!
//! 3. When a dependency changes, the context turns dirty and the computed
//!    notifies its own subscribers, so a computed can itself be a dependency.
//!
//! 4. The next read disposes the old context, builds a new one and
//!    recomputes. Dependencies are collected from scratch every time, so a
//!    branch that is no longer taken stops triggering recomputation.
//!
//! # Why This Matters
//!
//! Recomputation is lazy: a dependency change only flips flags. A computed
//! that is never read again never runs its function again.

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::context::{untracked, ContextState, EffectContext};
use super::observable::{Observable, ObservableValue};
use super::owner::Dispose;
use super::subscriber::{Notifier, Subscription};

/// The context of the latest computation and the link forwarding its
/// invalidation to the computed's own subscribers.
struct ContextSlot {
    context: EffectContext,
    _link: Subscription,
}

struct ComputedInner<T> {
    notifier: Arc<Notifier>,
    compute: Box<dyn Fn() -> T + Send + Sync>,
    /// `None` until the first successful computation.
    cache: Mutex<Option<T>>,
    slot: Mutex<Option<ContextSlot>>,
    computations: AtomicU64,
    disposed: AtomicBool,
}

/// A memoized value derived from other observables.
///
/// Cloning produces another handle to the same computed value.
///
/// # Example
///
/// ```rust
/// use reactivity_core::{ComputedState, ReactiveState};
///
/// let a = ReactiveState::new(1);
/// let b = ComputedState::new({
///     let a = a.clone();
///     move || a.read() * 2
/// });
///
/// assert_eq!(b.read(), 2);
/// a.write(5);
/// assert_eq!(b.read(), 10);
/// ```
pub struct ComputedState<T> {
    inner: Arc<ComputedInner<T>>,
}

impl<T> ComputedState<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a computed value and compute it immediately.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let computed = Self::lazy(compute);
        computed.recompute();
        computed
    }

    /// Create a computed value that first computes on its first read.
    pub fn lazy<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(ComputedInner {
                notifier: Notifier::new(),
                compute: Box::new(compute),
                cache: Mutex::new(None),
                slot: Mutex::new(None),
                computations: AtomicU64::new(0),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Get the current value, registering a dependency.
    ///
    /// Recomputes first if any dependency changed since the last
    /// computation.
    pub fn read(&self) -> T {
        if !self.is_disposed() {
            self.inner.notifier.notify_used();
        }
        self.current_value()
    }

    /// Get the current value without registering a dependency.
    ///
    /// Still recomputes when stale.
    pub fn read_untracked(&self) -> T {
        self.current_value()
    }

    fn current_value(&self) -> T {
        if self.is_disposed() {
            let cached = self.inner.cache.lock().clone();
            return cached.unwrap_or_else(|| untracked(|| (self.inner.compute)()));
        }

        if !self.is_stale() {
            if let Some(value) = self.inner.cache.lock().clone() {
                return value;
            }
        }
        self.recompute()
    }

    fn recompute(&self) -> T {
        let context = EffectContext::new();

        let weak = Arc::downgrade(&self.inner);
        let link = context.subscribe(move || {
            if let Some(inner) = weak.upgrade() {
                if !inner.disposed.load(Ordering::Acquire) {
                    inner.notifier.notify_changed();
                }
            }
        });

        let previous = self.inner.slot.lock().replace(ContextSlot {
            context: context.clone(),
            _link: link,
        });
        if let Some(previous) = previous {
            previous.context.dispose();
        }

        let value = context.run_tracked(|| (self.inner.compute)());
        *self.inner.cache.lock() = Some(value.clone());

        let computations = self.inner.computations.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(
            computed = self.inner.notifier.id().raw(),
            computations,
            dependencies = context.dependency_count(),
            "computed state recomputed"
        );

        value
    }
}

impl<T> ComputedState<T> {
    /// Whether the next read will run the compute function.
    pub fn is_stale(&self) -> bool {
        !self
            .inner
            .slot
            .lock()
            .as_ref()
            .is_some_and(|slot| slot.context.is_fresh())
    }

    /// How many times the compute function has completed.
    pub fn computation_count(&self) -> u64 {
        self.inner.computations.load(Ordering::Acquire)
    }

    /// State of the context from the latest computation.
    pub fn context_state(&self) -> Option<ContextState> {
        self.inner.slot.lock().as_ref().map(|slot| slot.context.state())
    }

    /// Number of dependencies read by the latest computation.
    pub fn dependency_count(&self) -> usize {
        self.inner
            .slot
            .lock()
            .as_ref()
            .map_or(0, |slot| slot.context.dependency_count())
    }

    /// Whether the computed value has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

impl<T> Clone for ComputedState<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Observable for ComputedState<T> {
    fn notifier(&self) -> &Arc<Notifier> {
        &self.inner.notifier
    }
}

impl<T> ObservableValue<T> for ComputedState<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn read(&self) -> T {
        ComputedState::read(self)
    }

    fn read_untracked(&self) -> T {
        ComputedState::read_untracked(self)
    }
}

impl<T> Dispose for ComputedState<T> {
    /// Release the dependency subscriptions and stop notifying.
    ///
    /// Later reads return the last cached value without tracking.
    fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(slot) = self.inner.slot.lock().take() {
            slot.context.dispose();
        }
        self.inner.notifier.clear();
    }
}

impl<T> Debug for ComputedState<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedState")
            .field("id", &self.inner.notifier.id())
            .field("cached", &*self.inner.cache.lock())
            .field("stale", &self.is_stale())
            .field("computations", &self.computation_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
