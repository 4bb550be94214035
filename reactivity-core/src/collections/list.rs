//! Reactive list.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::Store;
use crate::reactive::{Dispose, Notifier, Observable};

/// An ordered, observable sequence of `T`.
///
/// Cloning produces another handle to the same list.
///
/// # Example
///
/// ```rust
/// use reactivity_core::{ComputedState, ReactiveList};
///
/// let inventory = ReactiveList::new();
/// let count = ComputedState::new({
///     let inventory = inventory.clone();
///     move || inventory.len()
/// });
///
/// inventory.push("sword");
/// inventory.push("shield");
/// assert_eq!(count.read(), 2);
/// ```
pub struct ReactiveList<T> {
    store: Arc<Store<Vec<T>>>,
}

impl<T> ReactiveList<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create an empty list.
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Create a list holding `items`.
    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            store: Arc::new(Store::new(items)),
        }
    }

    // =========================================================================
    // READS (tracked)
    // =========================================================================

    pub fn len(&self) -> usize {
        self.store.tracked().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.tracked().is_empty()
    }

    /// Clone of the item at `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        self.store.tracked().get(index).cloned()
    }

    pub fn first(&self) -> Option<T> {
        self.store.tracked().first().cloned()
    }

    pub fn last(&self) -> Option<T> {
        self.store.tracked().last().cloned()
    }

    pub fn contains(&self, item: &T) -> bool {
        self.store.tracked().contains(item)
    }

    /// Index of the first item equal to `item`.
    pub fn position(&self, item: &T) -> Option<usize> {
        self.store.tracked().iter().position(|candidate| candidate == item)
    }

    /// Point-in-time view of the contents.
    pub fn snapshot(&self) -> ListSnapshot<T> {
        ListSnapshot {
            items: self.store.tracked(),
        }
    }

    /// Snapshot without registering a dependency.
    pub fn snapshot_untracked(&self) -> ListSnapshot<T> {
        ListSnapshot {
            items: self.store.untracked(),
        }
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.store.tracked().to_vec()
    }

    /// Borrow the contents for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.store.tracked())
    }

    // =========================================================================
    // MUTATIONS (notify once, only on change)
    // =========================================================================

    pub fn push(&self, item: T) {
        self.store.mutate(|items| {
            items.push(item);
            ((), true)
        });
    }

    /// Insert `item` at `index`, shifting later items.
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert(&self, index: usize, item: T) {
        self.store.mutate(|items| {
            items.insert(index, item);
            ((), true)
        });
    }

    pub fn pop(&self) -> Option<T> {
        self.store.mutate(|items| {
            let popped = items.pop();
            let changed = popped.is_some();
            (popped, changed)
        })
    }

    /// Remove and return the item at `index`, or `None` if out of range.
    pub fn remove(&self, index: usize) -> Option<T> {
        if index >= self.store.untracked().len() {
            return None;
        }
        self.store.mutate(|items| {
            if index < items.len() {
                (Some(items.remove(index)), true)
            } else {
                (None, false)
            }
        })
    }

    /// Remove the first item equal to `item`.
    pub fn remove_item(&self, item: &T) -> bool {
        match self.store.untracked().iter().position(|candidate| candidate == item) {
            Some(index) => self.remove(index).is_some(),
            None => false,
        }
    }

    /// Replace the item at `index`, returning the previous one.
    ///
    /// Returns `None` and changes nothing if `index` is out of range. Storing
    /// an equal item does not notify.
    pub fn set(&self, index: usize, item: T) -> Option<T> {
        match self.store.untracked().get(index) {
            None => return None,
            Some(current) if *current == item => return Some(item),
            Some(_) => {}
        }
        self.store.mutate(|items| match items.get_mut(index) {
            Some(slot) => {
                let changed = *slot != item;
                (Some(std::mem::replace(slot, item)), changed)
            }
            None => (None, false),
        })
    }

    pub fn extend(&self, iter: impl IntoIterator<Item = T>) {
        let added: Vec<T> = iter.into_iter().collect();
        if added.is_empty() {
            return;
        }
        self.store.mutate(|items| {
            items.extend(added);
            ((), true)
        });
    }

    /// Keep only the items for which `keep` returns true.
    pub fn retain(&self, keep: impl FnMut(&T) -> bool) {
        self.store.mutate(|items| {
            let before = items.len();
            items.retain(keep);
            ((), items.len() != before)
        });
    }

    pub fn truncate(&self, len: usize) {
        if self.store.untracked().len() <= len {
            return;
        }
        self.store.mutate(|items| {
            let before = items.len();
            items.truncate(len);
            ((), items.len() != before)
        });
    }

    pub fn clear(&self) {
        if self.store.untracked().is_empty() {
            return;
        }
        self.store.mutate(|items| {
            let changed = !items.is_empty();
            items.clear();
            ((), changed)
        });
    }

    /// Replace the whole contents. Notifies only if they differ.
    pub fn replace_all(&self, items: impl IntoIterator<Item = T>) -> bool {
        self.store.replace(items.into_iter().collect())
    }

    /// Apply several edits under one notification.
    ///
    /// Notifies once if the list differs afterwards, not at all otherwise.
    pub fn update<R>(&self, f: impl FnOnce(&mut Vec<T>) -> R) -> R {
        self.store.update(f)
    }
}

impl<T> Clone for ReactiveList<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<T> Default for ReactiveList<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for ReactiveList<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<T> Observable for ReactiveList<T> {
    fn notifier(&self) -> &Arc<Notifier> {
        self.store.notifier()
    }
}

impl<T> Dispose for ReactiveList<T> {
    fn dispose(&self) {
        self.store.notifier().clear();
    }
}

impl<T> fmt::Debug for ReactiveList<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.store.untracked().iter()).finish()
    }
}

impl<T> Serialize for ReactiveList<T>
where
    T: Serialize,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.store.untracked().serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for ReactiveList<T>
where
    T: Deserialize<'de> + Clone + PartialEq + Send + Sync + 'static,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<T>::deserialize(deserializer).map(Self::from_vec)
    }
}

/// Immutable view of a [`ReactiveList`] at one point in time.
///
/// Dereferences to a slice, so it can be iterated any number of times.
#[derive(Clone, PartialEq)]
pub struct ListSnapshot<T> {
    items: Arc<Vec<T>>,
}

impl<T> Deref for ListSnapshot<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<'a, T> IntoIterator for &'a ListSnapshot<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: fmt::Debug> fmt::Debug for ListSnapshot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
