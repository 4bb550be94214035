//! Reactive map.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::Store;
use crate::reactive::{Dispose, Notifier, Observable};

/// An observable hash map.
///
/// The map is one observable: reading any key tracks the whole map, and any
/// effective change notifies once. Cloning produces another handle to the
/// same map.
///
/// # Example
///
/// ```rust
/// use reactivity_core::{Observable, ReactiveMap};
///
/// let scores = ReactiveMap::new();
/// let _sub = scores.subscribe(|| println!("scores changed"));
///
/// scores.insert("alice", 10); // prints
/// scores.insert("alice", 10); // same value, silent
/// assert_eq!(scores.get("alice"), Some(10));
/// ```
pub struct ReactiveMap<K, V> {
    store: Arc<Store<HashMap<K, V>>>,
}

impl<K, V> ReactiveMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create an empty map.
    pub fn new() -> Self {
        Self::from_map(HashMap::new())
    }

    /// Create a map holding `entries`.
    pub fn from_map(entries: HashMap<K, V>) -> Self {
        Self {
            store: Arc::new(Store::new(entries)),
        }
    }

    // =========================================================================
    // READS (tracked)
    // =========================================================================

    /// Clone of the value stored under `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.store.tracked().get(key).cloned()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.store.tracked().contains_key(key)
    }

    /// Whether `key` maps to a value equal to `value`.
    pub fn contains_entry(&self, key: &K, value: &V) -> bool {
        self.store.tracked().get(key) == Some(value)
    }

    pub fn len(&self) -> usize {
        self.store.tracked().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.tracked().is_empty()
    }

    pub fn keys(&self) -> Vec<K> {
        self.store.tracked().keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<V> {
        self.store.tracked().values().cloned().collect()
    }

    /// Point-in-time view of the contents.
    pub fn snapshot(&self) -> MapSnapshot<K, V> {
        MapSnapshot {
            entries: self.store.tracked(),
        }
    }

    /// Snapshot without registering a dependency.
    pub fn snapshot_untracked(&self) -> MapSnapshot<K, V> {
        MapSnapshot {
            entries: self.store.untracked(),
        }
    }

    /// Borrow the contents for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&HashMap<K, V>) -> R) -> R {
        f(&self.store.tracked())
    }

    // =========================================================================
    // MUTATIONS (notify once, only on change)
    // =========================================================================

    /// Store `value` under `key`, returning the previous value.
    ///
    /// Storing a value equal to the current one does not notify.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        if self.store.untracked().get(&key) == Some(&value) {
            return Some(value);
        }
        self.store.mutate(|entries| match entries.get(&key) {
            Some(current) if *current == value => (Some(value), false),
            _ => (entries.insert(key, value), true),
        })
    }

    /// Add `value` only if `key` is absent. Returns whether it was added.
    pub fn try_insert(&self, key: K, value: V) -> bool {
        if self.store.untracked().contains_key(&key) {
            return false;
        }
        self.store.mutate(|entries| {
            if entries.contains_key(&key) {
                (false, false)
            } else {
                entries.insert(key, value);
                (true, true)
            }
        })
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if !self.store.untracked().contains_key(key) {
            return None;
        }
        self.store.mutate(|entries| {
            let removed = entries.remove(key);
            let changed = removed.is_some();
            (removed, changed)
        })
    }

    /// Remove `key` only if it maps to a value equal to `value`.
    pub fn remove_entry(&self, key: &K, value: &V) -> bool {
        if self.store.untracked().get(key) != Some(value) {
            return false;
        }
        self.store.mutate(|entries| {
            if entries.get(key) == Some(value) {
                entries.remove(key);
                (true, true)
            } else {
                (false, false)
            }
        })
    }

    pub fn extend(&self, iter: impl IntoIterator<Item = (K, V)>) {
        let incoming: Vec<(K, V)> = iter.into_iter().collect();
        if incoming.is_empty() {
            return;
        }
        self.store.mutate(|entries| {
            let mut changed = false;
            for (key, value) in incoming {
                if entries.get(&key) != Some(&value) {
                    entries.insert(key, value);
                    changed = true;
                }
            }
            ((), changed)
        });
    }

    /// Keep only the entries for which `keep` returns true.
    ///
    /// `keep` may also rewrite values; the map notifies once if anything
    /// differs afterwards.
    pub fn retain(&self, keep: impl FnMut(&K, &mut V) -> bool) {
        self.store.update(|entries| entries.retain(keep));
    }

    pub fn clear(&self) {
        if self.store.untracked().is_empty() {
            return;
        }
        self.store.mutate(|entries| {
            let changed = !entries.is_empty();
            entries.clear();
            ((), changed)
        });
    }

    /// Replace the whole contents. Notifies only if they differ.
    pub fn replace_all(&self, entries: impl IntoIterator<Item = (K, V)>) -> bool {
        self.store.replace(entries.into_iter().collect())
    }

    /// Apply several edits under one notification.
    ///
    /// Notifies once if the map differs afterwards, not at all otherwise.
    pub fn update<R>(&self, f: impl FnOnce(&mut HashMap<K, V>) -> R) -> R {
        self.store.update(f)
    }
}

impl<K, V> Clone for ReactiveMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<K, V> Default for ReactiveMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FromIterator<(K, V)> for ReactiveMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_map(iter.into_iter().collect())
    }
}

impl<K, V> Observable for ReactiveMap<K, V> {
    fn notifier(&self) -> &Arc<Notifier> {
        self.store.notifier()
    }
}

impl<K, V> Dispose for ReactiveMap<K, V> {
    fn dispose(&self) {
        self.store.notifier().clear();
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for ReactiveMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.store.untracked().iter()).finish()
    }
}

impl<K, V> Serialize for ReactiveMap<K, V>
where
    K: Serialize + Eq + Hash,
    V: Serialize,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.store.untracked().serialize(serializer)
    }
}

impl<'de, K, V> Deserialize<'de> for ReactiveMap<K, V>
where
    K: Deserialize<'de> + Eq + Hash + Clone + Send + Sync + 'static,
    V: Deserialize<'de> + Clone + PartialEq + Send + Sync + 'static,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        HashMap::<K, V>::deserialize(deserializer).map(Self::from_map)
    }
}

/// Immutable view of a [`ReactiveMap`] at one point in time.
///
/// Dereferences to the underlying `HashMap`.
#[derive(Clone)]
pub struct MapSnapshot<K, V> {
    entries: Arc<HashMap<K, V>>,
}

impl<K, V> Deref for MapSnapshot<K, V> {
    type Target = HashMap<K, V>;

    fn deref(&self) -> &HashMap<K, V> {
        &self.entries
    }
}

impl<'a, K, V> IntoIterator for &'a MapSnapshot<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = std::collections::hash_map::Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for MapSnapshot<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{ComputedState, EffectContext};
    use std::sync::atomic::{AtomicI32, Ordering};

    fn notifications<K, V>(map: &ReactiveMap<K, V>) -> (Arc<AtomicI32>, crate::reactive::Subscription) {
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        let sub = map.subscribe(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        (calls, sub)
    }

    #[test]
    fn insert_get_remove() {
        let map = ReactiveMap::new();
        assert_eq!(map.insert("a", 1), None);
        assert_eq!(map.insert("b", 2), None);
        assert_eq!(map.insert("a", 10), Some(1));

        assert_eq!(map.get("a"), Some(10));
        assert!(map.contains_key("b"));
        assert!(map.contains_entry(&"b", &2));
        assert_eq!(map.len(), 2);

        assert_eq!(map.remove("a"), Some(10));
        assert_eq!(map.remove("a"), None);
        assert_eq!(map.keys(), vec!["b"]);
        assert_eq!(map.values(), vec![2]);
    }

    #[test]
    fn equal_insert_does_not_notify() {
        let map = ReactiveMap::new();
        map.insert("hp", 100);
        let (calls, _sub) = notifications(&map);

        map.insert("hp", 100);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        map.insert("hp", 90);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn try_insert_only_adds_missing_keys() {
        let map = ReactiveMap::new();
        let (calls, _sub) = notifications(&map);

        assert!(map.try_insert("a", 1));
        assert!(!map.try_insert("a", 2));
        assert_eq!(map.get("a"), Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_entry_requires_matching_value() {
        let map: ReactiveMap<&str, i32> = [("a", 1)].into_iter().collect();
        let (calls, _sub) = notifications(&map);

        assert!(!map.remove_entry(&"a", &2));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!(map.remove_entry(&"a", &1));
        assert!(map.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn bulk_mutations_notify_once() {
        let map = ReactiveMap::new();
        let (calls, _sub) = notifications(&map);

        map.extend([("a", 1), ("b", 2), ("c", 3)]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        map.extend([("a", 1)]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        map.retain(|_, value| *value > 1);
        assert_eq!(map.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        map.update(|entries| {
            entries.insert("d", 4);
            entries.remove("b");
        });
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        map.clear();
        map.clear();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn retain_notices_rewritten_values() {
        let map = ReactiveMap::new();
        map.insert("a", 1);
        let total = ComputedState::new({
            let map = map.clone();
            move || map.values().iter().sum::<i32>()
        });
        let (calls, _sub) = notifications(&map);

        map.retain(|_, value| {
            *value = 100;
            true
        });

        assert_eq!(map.get("a"), Some(100));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(total.read(), 100);

        map.retain(|_, _| true);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn replace_all_compares_contents() {
        let map: ReactiveMap<&str, i32> = [("a", 1), ("b", 2)].into_iter().collect();
        let (calls, _sub) = notifications(&map);

        assert!(!map.replace_all([("b", 2), ("a", 1)]));
        assert!(map.replace_all([("c", 3)]));
        assert_eq!(map.keys(), vec!["c"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn snapshots_survive_mutation() {
        let map: ReactiveMap<&str, i32> = [("a", 1)].into_iter().collect();
        let snapshot = map.snapshot();

        map.insert("b", 2);
        map.remove("a");

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("a"), Some(&1));
        assert_eq!((&snapshot).into_iter().count(), 1);
        assert_eq!(map.snapshot().get("b"), Some(&2));
    }

    #[test]
    fn lookups_register_the_map() {
        let map: ReactiveMap<String, i32> = ReactiveMap::new();
        let context = EffectContext::new();

        context.run(|| map.get("missing")).unwrap();
        assert!(context.depends_on(map.id()));

        map.insert("missing".to_string(), 1);
        assert!(!context.is_fresh());
    }

    #[test]
    fn computed_follows_map() {
        let map = ReactiveMap::new();
        let total = ComputedState::new({
            let map = map.clone();
            move || map.with(|entries| entries.values().sum::<i32>())
        });

        assert_eq!(total.read(), 0);
        map.extend([("a", 1), ("b", 2)]);
        assert_eq!(total.read(), 3);
    }

    #[test]
    fn serde_uses_plain_maps() {
        let map: ReactiveMap<String, i32> = [("hp".to_string(), 100)].into_iter().collect();
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"hp":100}"#);

        let back: ReactiveMap<String, i32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get("hp"), Some(100));
    }
}
