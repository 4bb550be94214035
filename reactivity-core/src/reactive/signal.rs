//! Reactive State
//!
//! A [`ReactiveState`] is the mutable leaf of the dependency graph. It holds
//! a value and an equality function.
//!
//! # How States Work
//!
//! 1. Reading the state inside an effect context registers the state as a
//!    dependency of that context.
//!
//! 2. Writing a value that compares equal to the current one does nothing.
//!
//! 3. Writing a different value stores it, then notifies every subscriber
//!    exactly once.
//!
//! # Thread Safety
//!
//! The value sits behind a `parking_lot::RwLock`, so handles can be shared
//! across threads. The dependency graph is still not synchronized: writing
//! the same state from two threads at once gives no ordering guarantees.

use std::fmt::{self, Debug, Display};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::observable::{Observable, ObservableValue};
use super::owner::Dispose;
use super::subscriber::Notifier;

type Equality<T> = Box<dyn Fn(&T, &T) -> bool + Send + Sync>;

struct StateInner<T> {
    notifier: Arc<Notifier>,
    value: RwLock<T>,
    equality: Equality<T>,
}

/// A reactive value holding a `T`.
///
/// # Example
///
/// ```rust
/// use reactivity_core::{Observable, ReactiveState};
///
/// let count = ReactiveState::new(0);
/// let _sub = count.subscribe(|| println!("count changed"));
///
/// count.write(5); // prints once
/// count.write(5); // equal value, no notification
/// assert_eq!(count.read(), 5);
/// ```
pub struct ReactiveState<T> {
    inner: Arc<StateInner<T>>,
}

impl<T> ReactiveState<T>
where
    T: Send + Sync + 'static,
{
    /// Create a state using `PartialEq` to suppress redundant writes.
    pub fn new(value: T) -> Self
    where
        T: PartialEq,
    {
        Self::with_equality(value, |a, b| a == b)
    }

    /// Create a state with a custom equality function.
    ///
    /// A write is ignored when `equality(current, new)` returns true.
    pub fn with_equality<F>(value: T, equality: F) -> Self
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(StateInner {
                notifier: Notifier::new(),
                value: RwLock::new(value),
                equality: Box::new(equality),
            }),
        }
    }

    /// Borrow the current value, registering a dependency.
    ///
    /// `f` must not write to this state.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.notifier.notify_used();
        self.with_untracked(f)
    }

    /// Borrow the current value without registering a dependency.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.read())
    }

    /// Store `value` and notify, unless it equals the current value.
    ///
    /// Returns whether the value changed.
    pub fn write(&self, value: T) -> bool {
        let changed = {
            let mut guard = self.inner.value.write();
            if (self.inner.equality)(&guard, &value) {
                false
            } else {
                *guard = value;
                true
            }
        };

        if changed {
            self.inner.notifier.notify_changed();
        }
        changed
    }

    /// Write the result of `f` applied to the current value.
    ///
    /// This is useful for updates that depend on the current value.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> bool {
        let next = {
            let guard = self.inner.value.read();
            f(&guard)
        };
        self.write(next)
    }
}

impl<T> ReactiveState<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Get the current value, registering a dependency.
    pub fn read(&self) -> T {
        self.with(T::clone)
    }

    /// Get the current value without registering a dependency.
    pub fn read_untracked(&self) -> T {
        self.with_untracked(T::clone)
    }
}

impl<T> Clone for ReactiveState<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Observable for ReactiveState<T> {
    fn notifier(&self) -> &Arc<Notifier> {
        &self.inner.notifier
    }
}

impl<T> ObservableValue<T> for ReactiveState<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn read(&self) -> T {
        ReactiveState::read(self)
    }

    fn read_untracked(&self) -> T {
        ReactiveState::read_untracked(self)
    }
}

impl<T> Dispose for ReactiveState<T> {
    /// Drop every subscriber. The value stays readable and writable.
    fn dispose(&self) {
        self.inner.notifier.clear();
    }
}

impl<T> Default for ReactiveState<T>
where
    T: Default + PartialEq + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Debug for ReactiveState<T>
where
    T: Debug + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_untracked(|value| {
            f.debug_struct("ReactiveState")
                .field("id", &self.inner.notifier.id())
                .field("value", value)
                .field("subscriber_count", &self.inner.notifier.subscriber_count())
                .finish()
        })
    }
}

/// Formats the current value. This is a tracked read.
impl<T> Display for ReactiveState<T>
where
    T: Display + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with(|value| Display::fmt(value, f))
    }
}

impl<T> Serialize for ReactiveState<T>
where
    T: Serialize + Send + Sync + 'static,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.with_untracked(|value| value.serialize(serializer))
    }
}

impl<'de, T> Deserialize<'de> for ReactiveState<T>
where
    T: Deserialize<'de> + PartialEq + Send + Sync + 'static,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Self::new)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
