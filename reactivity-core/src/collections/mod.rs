//! Reactive Collections
//!
//! Lists, maps and sets that behave as a single observable each. Any read
//! (length, lookup, iteration through a snapshot) registers the collection
//! as a dependency; any mutation that actually changes the contents notifies
//! subscribers exactly once, however many elements it touched.
//!
//! Contents live behind an `Arc` and are copied on write, so a snapshot is a
//! cheap point-in-time view that later mutations never disturb.
//!
//! Closures passed to mutators such as `retain` or `update` run while the
//! collection is locked for writing and must not access the same collection.

mod list;
mod map;
mod set;

pub use list::{ListSnapshot, ReactiveList};
pub use map::{MapSnapshot, ReactiveMap};
pub use set::{ReactiveSet, SetSnapshot};

use std::sync::Arc;

use parking_lot::RwLock;

use crate::reactive::Notifier;

/// Copy-on-write container paired with the notifier that publishes it.
pub(crate) struct Store<C> {
    notifier: Arc<Notifier>,
    data: RwLock<Arc<C>>,
}

impl<C> Store<C> {
    pub(crate) fn new(data: C) -> Self {
        Self {
            notifier: Notifier::new(),
            data: RwLock::new(Arc::new(data)),
        }
    }

    pub(crate) fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    /// Current contents, registering a dependency.
    pub(crate) fn tracked(&self) -> Arc<C> {
        self.notifier.notify_used();
        self.untracked()
    }

    pub(crate) fn untracked(&self) -> Arc<C> {
        self.data.read().clone()
    }
}

impl<C: Clone + PartialEq> Store<C> {
    /// Apply `f`, which reports whether it changed anything.
    pub(crate) fn mutate<R>(&self, f: impl FnOnce(&mut C) -> (R, bool)) -> R {
        let (result, changed) = {
            let mut data = self.data.write();
            f(Arc::make_mut(&mut *data))
        };
        if changed {
            self.notifier.notify_changed();
        }
        result
    }

    /// Apply `f` and notify if the contents compare unequal afterwards.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        let (result, changed) = {
            let mut data = self.data.write();
            let before = Arc::clone(&*data);
            let result = f(Arc::make_mut(&mut *data));
            let changed = *before != **data;
            if !changed {
                *data = before;
            }
            (result, changed)
        };
        if changed {
            self.notifier.notify_changed();
        }
        result
    }

    /// Swap in `contents`; notifies if they differ.
    pub(crate) fn replace(&self, contents: C) -> bool {
        let changed = {
            let mut data = self.data.write();
            if **data == contents {
                false
            } else {
                *data = Arc::new(contents);
                true
            }
        };
        if changed {
            self.notifier.notify_changed();
        }
        changed
    }
}
