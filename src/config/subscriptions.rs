//! Change-notification subscriptions with leak-free teardown
//!
//! Every UI surface that watches configuration keys or daemon events
//! registers its callbacks here under an owner identity. Owners release
//! either handle by handle or all at once before they are dropped;
//! releasing an unknown handle or disposing twice is a no-op by design,
//! since teardown order across independent surfaces cannot be guaranteed.

use std::cell::RefCell;
use std::rc::Rc;

/// Callback invoked on notification, receiving the notification payload.
pub type Callback<A> = Rc<RefCell<dyn FnMut(&A)>>;

/// Identity of a subscription owner (typically one UI surface).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(u64);

impl OwnerId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

/// Opaque handle for one registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Entry<K, A> {
    id: SubscriptionId,
    owner: OwnerId,
    key: K,
    callback: Callback<A>,
}

/// Registry of live subscriptions, generic over the topic type `K` and the
/// callback payload `A`.
///
/// Used by `ConfigStore` (topic = `ConfigKey`) and `RemoteControlBridge`
/// (single daemon topic, payload = `DaemonEvent`). Entries are kept in
/// registration order; delivery for one topic follows that order.
pub struct SubscriptionRegistry<K, A> {
    entries: Vec<Entry<K, A>>,
    next_id: u64,
}

impl<K: Copy + Eq, A> SubscriptionRegistry<K, A> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }

    /// Record `callback` against `owner` for notifications on `key`.
    pub fn subscribe(&mut self, owner: OwnerId, key: K, callback: Callback<A>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            owner,
            key,
            callback,
        });
        id
    }

    /// Detach one callback. Unknown or already-detached handles are ignored.
    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.entries.retain(|e| e.id != id);
    }

    /// Detach every callback still recorded for `owner`. Idempotent.
    pub fn dispose_all(&mut self, owner: OwnerId) {
        self.entries.retain(|e| e.owner != owner);
    }

    /// Snapshot the callbacks subscribed to `key`, in registration order.
    ///
    /// Callers invoke the clones after releasing their own borrow so that
    /// callbacks may freely re-enter the owning store.
    pub fn callbacks_for(&self, key: K) -> Vec<Callback<A>> {
        self.entries
            .iter()
            .filter(|e| e.key == key)
            .map(|e| Rc::clone(&e.callback))
            .collect()
    }

    /// Number of live subscriptions held by `owner`.
    pub fn active_count(&self, owner: OwnerId) -> usize {
        self.entries.iter().filter(|e| e.owner == owner).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Copy + Eq, A> Default for SubscriptionRegistry<K, A> {
    fn default() -> Self {
        Self::new()
    }
}
