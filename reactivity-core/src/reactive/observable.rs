//! Observable traits.
//!
//! [`Observable`] is the contract every reactive type participates through:
//! it exposes a [`Notifier`], and gets `notify_used`/`notify_changed` and
//! subscription for free. [`ObservableValue`] adds tracked and untracked
//! reads of a current value.
//!
//! A new observable-like type only has to call `notify_used()` from its
//! read paths and `notify_changed()` from its write paths.

use std::sync::Arc;

use super::subscriber::{Notifier, ObservableId, Subscription};

/// An entity that can be read with dependency registration and that
/// announces changes to subscribers.
pub trait Observable {
    /// The notifier backing this observable.
    fn notifier(&self) -> &Arc<Notifier>;

    /// The observable's unique ID.
    fn id(&self) -> ObservableId {
        self.notifier().id()
    }

    /// Register as a dependency of the context running on this thread.
    fn notify_used(&self) {
        self.notifier().notify_used();
    }

    /// Latch the dirty flag and notify every subscriber.
    fn notify_changed(&self) {
        self.notifier().notify_changed();
    }

    /// Whether this observable has ever changed.
    fn is_dirty(&self) -> bool {
        self.notifier().is_dirty()
    }

    /// Subscribe to change notifications.
    fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
        Self: Sized,
    {
        self.notifier().subscribe(callback)
    }

    /// Number of callbacks currently subscribed.
    fn subscriber_count(&self) -> usize {
        self.notifier().subscriber_count()
    }
}

/// An observable holding a value of type `T`.
pub trait ObservableValue<T>: Observable {
    /// Read the current value, registering a dependency.
    fn read(&self) -> T;

    /// Read the current value without registering a dependency.
    fn read_untracked(&self) -> T;
}
