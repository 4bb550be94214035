//! Effect Context
//!
//! An [`EffectContext`] collects the dependencies of one execution of a
//! tracked computation. While [`EffectContext::run`] executes, the context
//! sits on top of this thread's context stack; every observable read during
//! that time calls `notify_used`, finds the context on the stack, and
//! registers itself. The context subscribes to each dependency once, and
//! turns dirty (notifying its own subscribers) when any of them changes.
//!
//! # Implementation
//!
//! The stack is thread-local, so tracking sessions on different threads never
//! see each other. Entries are pushed by an RAII guard and popped when it
//! drops, which also happens while unwinding out of a panicking computation.
//! Nested runs therefore always restore the previously current context.
//!
//! A run that unwinds keeps the dependencies it registered before the panic
//! and leaves the context [`ContextState::Faulted`]. Owners treat a faulted
//! context as stale and retry on the next read or run, and a change to any
//! of the partially registered dependencies still propagates.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::observable::Observable;
use super::owner::Dispose;
use super::subscriber::{Notifier, ObservableId, Subscription};
use crate::error::{ReactivityError, Result};

thread_local! {
    /// The active-context stack for this thread.
    ///
    /// `None` entries come from [`untracked`] and hide every context below
    /// them.
    static CONTEXT_STACK: RefCell<Vec<Option<EffectContext>>> = const { RefCell::new(Vec::new()) };
}

/// Lifecycle state of an [`EffectContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Created, never run.
    Constructed,
    /// An action is executing inside the context.
    Running,
    /// Last run completed and no dependency has changed since.
    Clean,
    /// Last run completed and at least one dependency changed.
    Dirty,
    /// Last run unwound before completing.
    Faulted,
    /// Disposed. Terminal.
    Disposed,
}

struct ContextInner {
    notifier: Arc<Notifier>,
    /// Ordered by first read.
    dependencies: Mutex<IndexMap<ObservableId, Subscription>>,
    running: AtomicUsize,
    started: AtomicBool,
    faulted: AtomicBool,
    /// A dependency changed since the latest run started.
    invalidated: AtomicBool,
    disposed: AtomicBool,
}

impl ContextInner {
    fn on_dependency_changed(&self) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }
        self.invalidated.store(true, Ordering::Release);
        self.notifier.notify_changed();
    }
}

/// Scoped dependency collector for one execution of a tracked computation.
///
/// Cloning produces another handle to the same context.
#[derive(Clone)]
pub struct EffectContext {
    inner: Arc<ContextInner>,
}

impl EffectContext {
    /// Create a fresh context with no dependencies.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ContextInner {
                notifier: Notifier::new(),
                dependencies: Mutex::new(IndexMap::new()),
                running: AtomicUsize::new(0),
                started: AtomicBool::new(false),
                faulted: AtomicBool::new(false),
                invalidated: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// The context currently collecting dependencies on this thread.
    pub fn current() -> Option<EffectContext> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned().flatten())
    }

    /// Whether reads on this thread are currently being tracked.
    pub fn is_tracking() -> bool {
        Self::current().is_some()
    }

    /// Run `action` with this context as the current one.
    ///
    /// Any observable read during `action` becomes a dependency. The
    /// previously current context is restored afterwards, including when
    /// `action` panics; the panic itself propagates.
    pub fn run<R>(&self, action: impl FnOnce() -> R) -> Result<R> {
        if self.is_disposed() {
            return Err(ReactivityError::ContextDisposed);
        }
        Ok(self.run_tracked(action))
    }

    /// Run without the disposed check. Callers own a fresh context.
    pub(crate) fn run_tracked<R>(&self, action: impl FnOnce() -> R) -> R {
        let mut guard = RunGuard::enter(self);
        let result = action();
        guard.complete();
        result
    }

    /// Register `observable` as a dependency.
    ///
    /// Subscribes at most once per observable, however often it is read.
    pub fn add_dependency<O>(&self, observable: &O)
    where
        O: Observable + ?Sized,
    {
        self.register(observable.notifier());
    }

    pub(crate) fn register(&self, notifier: &Arc<Notifier>) {
        let id = notifier.id();
        if self.is_disposed() || id == self.inner.notifier.id() {
            return;
        }

        let mut dependencies = self.inner.dependencies.lock();
        if dependencies.contains_key(&id) {
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        let subscription = notifier.subscribe(move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_dependency_changed();
            }
        });
        dependencies.insert(id, subscription);

        tracing::trace!(
            context = self.inner.notifier.id().raw(),
            dependency = id.raw(),
            "dependency registered"
        );
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ContextState {
        let inner = &self.inner;
        if inner.disposed.load(Ordering::Acquire) {
            ContextState::Disposed
        } else if inner.running.load(Ordering::Acquire) > 0 {
            ContextState::Running
        } else if !inner.started.load(Ordering::Acquire) {
            ContextState::Constructed
        } else if inner.faulted.load(Ordering::Acquire) {
            ContextState::Faulted
        } else if inner.invalidated.load(Ordering::Acquire) {
            ContextState::Dirty
        } else {
            ContextState::Clean
        }
    }

    /// Whether a completed run is still valid: no dependency changed, no
    /// panic, not disposed.
    pub fn is_fresh(&self) -> bool {
        self.state() == ContextState::Clean
    }

    /// Whether the context has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Number of distinct dependencies registered.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.lock().len()
    }

    /// Whether no dependency has been registered.
    pub fn is_empty(&self) -> bool {
        self.dependency_count() == 0
    }

    /// Whether `id` is one of this context's dependencies.
    pub fn depends_on(&self, id: ObservableId) -> bool {
        self.inner.dependencies.lock().contains_key(&id)
    }

    /// Dependency IDs in the order they were first read.
    pub fn dependencies(&self) -> Vec<ObservableId> {
        self.inner.dependencies.lock().keys().copied().collect()
    }

    fn same_as(&self, other: &EffectContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for EffectContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Observable for EffectContext {
    fn notifier(&self) -> &Arc<Notifier> {
        &self.inner.notifier
    }
}

impl Dispose for EffectContext {
    /// Unsubscribe from every dependency and drop every subscriber.
    fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let dependencies = std::mem::take(&mut *self.inner.dependencies.lock());
        let released = dependencies.len();
        drop(dependencies);
        self.inner.notifier.clear();

        tracing::trace!(
            context = self.inner.notifier.id().raw(),
            released,
            "context disposed"
        );
    }
}

impl fmt::Debug for EffectContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectContext")
            .field("id", &self.inner.notifier.id())
            .field("state", &self.state())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

/// Run `f` with dependency tracking suspended on this thread.
///
/// Reads inside `f` register with no context, even when called from within
/// a computed value or an effect.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _guard = StackGuard::push(None);
    f()
}

/// Register `notifier` with the current context, if any.
pub(crate) fn track(notifier: &Arc<Notifier>) {
    if let Some(context) = EffectContext::current() {
        context.register(notifier);
    }
}

/// Pops the thread's context stack when dropped.
struct StackGuard {
    entry: Option<EffectContext>,
}

impl StackGuard {
    fn push(entry: Option<EffectContext>) -> Self {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(entry.clone()));
        Self { entry }
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());

        // Catch mismatched push/pop pairs in debug builds.
        debug_assert!(
            match (&popped, &self.entry) {
                (Some(Some(popped)), Some(expected)) => popped.same_as(expected),
                (Some(None), None) => true,
                _ => false,
            },
            "context stack mismatch"
        );
    }
}

/// Marks a context as running for the duration of one `run` call.
struct RunGuard<'a> {
    context: &'a EffectContext,
    completed: bool,
    _stack: StackGuard,
}

impl<'a> RunGuard<'a> {
    fn enter(context: &'a EffectContext) -> Self {
        let inner = &context.inner;
        inner.started.store(true, Ordering::Release);
        inner.faulted.store(false, Ordering::Release);
        inner.invalidated.store(false, Ordering::Release);
        inner.running.fetch_add(1, Ordering::AcqRel);

        Self {
            context,
            completed: false,
            _stack: StackGuard::push(Some(context.clone())),
        }
    }

    fn complete(&mut self) {
        self.completed = true;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let inner = &self.context.inner;
        inner.running.fetch_sub(1, Ordering::AcqRel);
        if !self.completed {
            inner.faulted.store(true, Ordering::Release);
            tracing::debug!(
                context = inner.notifier.id().raw(),
                dependencies = self.context.dependency_count(),
                "context run unwound; partial dependencies kept"
            );
        }
    }
}
