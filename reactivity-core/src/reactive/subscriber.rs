//! Subscriber lists for the reactive system.
//!
//! Every observable owns a [`Notifier`]: a latched dirty flag plus an ordered
//! list of zero-argument callbacks. Subscribing returns a [`Subscription`]
//! token, and whoever holds the token is the one responsible for the
//! callback. Dropping the token (or calling [`Subscription::unsubscribe`])
//! removes the callback again, so dependency subscriptions cannot leak.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::context;
use super::owner::Dispose;

/// Unique identifier for an observable.
///
/// Effect contexts key their dependency sets by this ID, which is what makes
/// repeated reads of the same observable register only once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObservableId(u64);

impl ObservableId {
    /// Generate a new unique observable ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ObservableId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a single subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Generate a new unique subscription ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

type Callback = Arc<dyn Fn() + Send + Sync>;

/// Change publisher shared by every observable type.
///
/// Holds the observable's identity, its latched `dirty` flag and its
/// subscribers in subscription order.
pub struct Notifier {
    id: ObservableId,
    dirty: AtomicBool,
    subscribers: Mutex<SmallVec<[(SubscriptionId, Callback); 4]>>,
}

impl Notifier {
    /// Create a new notifier with no subscribers.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: ObservableId::new(),
            dirty: AtomicBool::new(false),
            subscribers: Mutex::new(SmallVec::new()),
        })
    }

    /// The ID of the observable this notifier belongs to.
    pub fn id(&self) -> ObservableId {
        self.id
    }

    /// Whether `notify_changed` has ever been called.
    ///
    /// The flag latches: nothing resets it.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Register a callback to be invoked on every change.
    ///
    /// The callback stays registered until the returned token is dropped.
    pub fn subscribe<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.subscribers.lock().push((id, Arc::new(callback)));
        tracing::trace!(observable = self.id.raw(), subscription = ?id, "subscribed");

        Subscription {
            id,
            notifier: Arc::downgrade(self),
        }
    }

    /// Remove a subscriber. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = {
            let mut subscribers = self.subscribers.lock();
            subscribers
                .iter()
                .position(|(sub_id, _)| *sub_id == id)
                .map(|index| subscribers.remove(index))
        };
        // The callback is dropped here, outside the lock.
        removed.is_some()
    }

    /// Whether the given subscription is still registered.
    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.subscribers.lock().iter().any(|(sub_id, _)| *sub_id == id)
    }

    /// Register this observable with the context currently running on this
    /// thread, if any.
    pub fn notify_used(self: &Arc<Self>) {
        context::track(self);
    }

    /// Mark dirty, then invoke every subscriber in subscription order.
    ///
    /// Callbacks run against a snapshot of the list taken before the first
    /// one is called, with no lock held, so they may freely re-enter this
    /// notifier.
    pub fn notify_changed(&self) {
        self.dirty.store(true, Ordering::Release);

        let callbacks: SmallVec<[Callback; 4]> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        tracing::trace!(
            observable = self.id.raw(),
            subscribers = callbacks.len(),
            "notify changed"
        );

        for callback in callbacks {
            callback();
        }
    }

    /// Remove every subscriber.
    pub fn clear(&self) {
        let drained = std::mem::take(&mut *self.subscribers.lock());
        drop(drained);
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl Dispose for Notifier {
    fn dispose(&self) {
        self.clear();
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("id", &self.id)
            .field("dirty", &self.is_dirty())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Unsubscribe token returned by [`Notifier::subscribe`].
///
/// Dropping the token removes the callback. The token only holds a weak
/// reference, so it never keeps the observable alive.
#[must_use = "dropping a Subscription immediately unsubscribes its callback"]
pub struct Subscription {
    id: SubscriptionId,
    notifier: Weak<Notifier>,
}

impl Subscription {
    /// The subscription's ID.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Whether the callback is still registered with a live observable.
    pub fn is_active(&self) -> bool {
        self.notifier
            .upgrade()
            .is_some_and(|notifier| notifier.is_subscribed(self.id))
    }

    /// Remove the callback now.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Give up the token, leaving the callback registered for as long as
    /// the observable lives (or until it is disposed).
    pub fn detach(mut self) {
        self.notifier = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(notifier) = self.notifier.upgrade() {
            notifier.unsubscribe(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn ids_are_unique() {
        let id1 = SubscriptionId::new();
        let id2 = SubscriptionId::new();
        assert_ne!(id1, id2);

        let o1 = ObservableId::new();
        let o2 = ObservableId::new();
        assert_ne!(o1, o2);
    }

    #[test]
    fn notify_calls_callback() {
        let notifier = Notifier::new();
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();

        let _sub = notifier.subscribe(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!notifier.is_dirty());
        notifier.notify_changed();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(notifier.is_dirty());
    }

    #[test]
    fn subscribers_run_in_subscription_order() {
        let notifier = Notifier::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let subs: Vec<_> = (0..4)
            .map(|i| {
                let order = order.clone();
                notifier.subscribe(move || order.lock().push(i))
            })
            .collect();

        notifier.notify_changed();
        assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
        drop(subs);
    }

    #[test]
    fn dropping_token_unsubscribes() {
        let notifier = Notifier::new();
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();

        let sub = notifier.subscribe(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert!(sub.is_active());
        assert_eq!(notifier.subscriber_count(), 1);

        sub.unsubscribe();
        assert_eq!(notifier.subscriber_count(), 0);

        notifier.notify_changed();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn detached_token_keeps_callback() {
        let notifier = Notifier::new();
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();

        notifier
            .subscribe(move || {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            })
            .detach();

        notifier.notify_changed();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.subscriber_count(), 1);
    }

    #[test]
    fn dispose_clears_and_is_idempotent() {
        let notifier = Notifier::new();
        let sub = notifier.subscribe(|| {});

        notifier.dispose();
        assert_eq!(notifier.subscriber_count(), 0);
        assert!(!sub.is_active());

        notifier.dispose();
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[test]
    fn callbacks_may_reenter_notify() {
        let notifier = Notifier::new();
        let calls = Arc::new(AtomicI32::new(0));

        let weak = Arc::downgrade(&notifier);
        let calls_clone = calls.clone();
        let _sub = notifier.subscribe(move || {
            if calls_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                if let Some(notifier) = weak.upgrade() {
                    notifier.notify_changed();
                }
            }
        });

        notifier.notify_changed();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn token_outliving_notifier_is_harmless() {
        let notifier = Notifier::new();
        let sub = notifier.subscribe(|| {});
        drop(notifier);

        assert!(!sub.is_active());
        drop(sub);
    }
}
