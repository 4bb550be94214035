//! Reactive set.

use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::Store;
use crate::reactive::{Dispose, Notifier, Observable};

/// An observable hash set.
///
/// Comparison methods take a `&HashSet<T>`; a [`SetSnapshot`] dereferences
/// to one, so two reactive sets can be compared through a snapshot. Cloning
/// produces another handle to the same set.
pub struct ReactiveSet<T> {
    store: Arc<Store<HashSet<T>>>,
}

impl<T> ReactiveSet<T>
where
    T: Eq + Hash + Clone + Send + Sync + 'static,
{
    /// Create an empty set.
    pub fn new() -> Self {
        Self::from_set(HashSet::new())
    }

    pub fn from_set(items: HashSet<T>) -> Self {
        Self {
            store: Arc::new(Store::new(items)),
        }
    }

    // =========================================================================
    // READS (tracked)
    // =========================================================================

    pub fn contains<Q>(&self, item: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.store.tracked().contains(item)
    }

    pub fn len(&self) -> usize {
        self.store.tracked().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.tracked().is_empty()
    }

    pub fn is_subset(&self, other: &HashSet<T>) -> bool {
        self.store.tracked().is_subset(other)
    }

    pub fn is_superset(&self, other: &HashSet<T>) -> bool {
        self.store.tracked().is_superset(other)
    }

    pub fn is_proper_subset(&self, other: &HashSet<T>) -> bool {
        let items = self.store.tracked();
        items.len() < other.len() && items.is_subset(other)
    }

    pub fn is_proper_superset(&self, other: &HashSet<T>) -> bool {
        let items = self.store.tracked();
        items.len() > other.len() && items.is_superset(other)
    }

    /// Whether the sets share at least one item.
    pub fn overlaps(&self, other: &HashSet<T>) -> bool {
        !self.store.tracked().is_disjoint(other)
    }

    /// Whether both sets hold exactly the same items.
    pub fn set_equals(&self, other: &HashSet<T>) -> bool {
        *self.store.tracked() == *other
    }

    /// Point-in-time view of the contents.
    pub fn snapshot(&self) -> SetSnapshot<T> {
        SetSnapshot {
            items: self.store.tracked(),
        }
    }

    /// Snapshot without registering a dependency.
    pub fn snapshot_untracked(&self) -> SetSnapshot<T> {
        SetSnapshot {
            items: self.store.untracked(),
        }
    }

    /// Borrow the contents for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&HashSet<T>) -> R) -> R {
        f(&self.store.tracked())
    }

    // =========================================================================
    // MUTATIONS (notify once, only on change)
    // =========================================================================

    /// Add `item`. Returns whether it was newly inserted.
    pub fn insert(&self, item: T) -> bool {
        if self.store.untracked().contains(&item) {
            return false;
        }
        self.store.mutate(|items| {
            let added = items.insert(item);
            (added, added)
        })
    }

    /// Remove `item`. Returns whether it was present.
    pub fn remove<Q>(&self, item: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if !self.store.untracked().contains(item) {
            return false;
        }
        self.store.mutate(|items| {
            let removed = items.remove(item);
            (removed, removed)
        })
    }

    /// Add every item of `other`.
    pub fn union_with(&self, other: impl IntoIterator<Item = T>) {
        let other: Vec<T> = other.into_iter().collect();
        self.store.mutate(|items| {
            let mut changed = false;
            for item in other {
                changed |= items.insert(item);
            }
            ((), changed)
        });
    }

    /// Remove every item of `other`.
    pub fn except_with(&self, other: impl IntoIterator<Item = T>) {
        let other: Vec<T> = other.into_iter().collect();
        self.store.mutate(|items| {
            let mut changed = false;
            for item in other {
                changed |= items.remove(&item);
            }
            ((), changed)
        });
    }

    /// Keep only items also present in `other`.
    pub fn intersect_with(&self, other: impl IntoIterator<Item = T>) {
        let other: HashSet<T> = other.into_iter().collect();
        self.retain(|item| other.contains(item));
    }

    /// Keep items present in exactly one of the two sets.
    pub fn symmetric_except_with(&self, other: impl IntoIterator<Item = T>) {
        let other: HashSet<T> = other.into_iter().collect();
        if other.is_empty() {
            return;
        }
        self.store.mutate(|items| {
            for item in other {
                if !items.remove(&item) {
                    items.insert(item);
                }
            }
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
    pub fn update<R>(&self, f: impl FnOnce(&mut HashSet<T>) -> R) -> R {
        self.store.update(f)
    }
}

impl<T> Clone for ReactiveSet<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<T> Default for ReactiveSet<T>
where
    T: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for ReactiveSet<T>
where
    T: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_set(iter.into_iter().collect())
    }
}

impl<T> Observable for ReactiveSet<T> {
    fn notifier(&self) -> &Arc<Notifier> {
        self.store.notifier()
    }
}

impl<T> Dispose for ReactiveSet<T> {
    fn dispose(&self) {
        self.store.notifier().clear();
    }
}

impl<T: fmt::Debug> fmt::Debug for ReactiveSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.store.untracked().iter()).finish()
    }
}

impl<T> Serialize for ReactiveSet<T>
where
    T: Serialize + Eq + Hash,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.store.untracked().serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for ReactiveSet<T>
where
    T: Deserialize<'de> + Eq + Hash + Clone + Send + Sync + 'static,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        HashSet::<T>::deserialize(deserializer).map(Self::from_set)
    }
}

/// Immutable view of a [`ReactiveSet`] at one point in time.
#[derive(Clone)]
pub struct SetSnapshot<T> {
    items: Arc<HashSet<T>>,
}

impl<T> Deref for SetSnapshot<T> {
    type Target = HashSet<T>;

    fn deref(&self) -> &HashSet<T> {
        &self.items
    }
}

impl<'a, T> IntoIterator for &'a SetSnapshot<T> {
    type Item = &'a T;
    type IntoIter = std::collections::hash_set::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: fmt::Debug> fmt::Debug for SetSnapshot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.items.iter()).finish()
    }
}
