//! Disposal and ownership.
//!
//! Disposal is the only way dependency subscriptions are released early, so
//! every stateful reactive type implements [`Dispose`]. An [`Owner`] ties a
//! group of handles to the lifetime of some host object: when the host is
//! torn down, disposing the owner disposes everything it adopted.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

/// A handle that can release its reactive resources.
///
/// Implementations must be idempotent.
pub trait Dispose {
    /// Release subscriptions and stop reacting to changes.
    fn dispose(&self);
}

impl<T: Dispose + ?Sized> Dispose for std::sync::Arc<T> {
    fn dispose(&self) {
        (**self).dispose();
    }
}

type Disposable = Box<dyn Dispose + Send + Sync>;

/// Teardown group for reactive handles.
///
/// ```rust
/// use reactivity_core::{ComputedState, Dispose, Owner, ReactiveState};
///
/// let owner = Owner::new();
/// let count = owner.adopt(ReactiveState::new(1));
/// let doubled = owner.adopt(ComputedState::new({
///     let count = count.clone();
///     move || count.read() * 2
/// }));
///
/// assert_eq!(doubled.read(), 2);
/// owner.dispose();
/// assert!(doubled.is_disposed());
/// ```
pub struct Owner {
    items: Mutex<Vec<Disposable>>,
    disposed: AtomicBool,
}

impl Owner {
    /// Create an empty owner.
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
        }
    }

    /// Register a handle and hand it back.
    ///
    /// The owner keeps a clone. Adopting into a disposed owner disposes the
    /// handle right away.
    pub fn adopt<T>(&self, item: T) -> T
    where
        T: Dispose + Clone + Send + Sync + 'static,
    {
        if self.is_disposed() {
            item.dispose();
            return item;
        }
        self.items.lock().push(Box::new(item.clone()));
        item
    }

    /// Run `cleanup` when the owner is disposed.
    pub fn on_dispose<F>(&self, cleanup: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.adopt(Cleanup(std::sync::Arc::new(cleanup)));
    }

    /// Number of adopted handles still held.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether nothing is held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the owner has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Default for Owner {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispose for Owner {
    /// Dispose every adopted handle, most recently adopted first.
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let items = std::mem::take(&mut *self.items.lock());
        tracing::debug!(items = items.len(), "owner disposed");
        for item in items.iter().rev() {
            item.dispose();
        }
    }
}

impl Drop for Owner {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owner")
            .field("len", &self.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[derive(Clone)]
struct Cleanup(std::sync::Arc<dyn Fn() + Send + Sync>);

impl Dispose for Cleanup {
    fn dispose(&self) {
        (self.0)();
    }
}
