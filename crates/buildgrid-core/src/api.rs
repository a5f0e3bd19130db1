//! Backend-neutral coordination API.
//!
//! Callers program against these traits only. The local backend in this crate
//! implements them in-process; a multi-node backend implements the same
//! contracts and is selected once at startup through [`crate::connect`].
//!
//! None of the operations are atomic with respect to each other. A caller that
//! needs a compound invariant (read-modify-write on a map entry, say) must
//! hold the entry lock from [`DistributedMap::lock`] across the calls.

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
    hash::Hash,
    sync::Arc,
};

use crate::{
    listener::{
        ChangeListener, EntryListener, ItemListener, ListenerId, MapListener, MessageListener,
    },
    lock::EntryLock,
    Result,
};

/// Key/value store with per-key mutual exclusion and change notification.
pub trait DistributedMap<K, V>: Send + Sync {
    /// Value for `key`, waiting while another thread holds the key's lock.
    fn get(&self, key: &K) -> Option<V>;

    /// Values for each present key. Each key is read separately; there is no
    /// snapshot across keys.
    fn get_all(&self, keys: &[K]) -> HashMap<K, V>;

    /// Store `value`, returning the replaced value. Listeners see `Added` or
    /// `Updated` after the key's lock is released.
    fn put(&self, key: K, value: V) -> Option<V>;

    /// Delete `key`, returning its value. Listeners see `Removed`.
    fn remove(&self, key: &K) -> Option<V>;

    fn contains_key(&self, key: &K) -> bool;

    /// Weakly consistent: may race with concurrent puts and removes.
    fn values(&self) -> Vec<V>;

    /// Weakly consistent: may race with concurrent puts and removes.
    fn key_set(&self) -> HashSet<K>;

    /// Weakly consistent: may race with concurrent puts and removes.
    fn entry_set(&self) -> Vec<(K, V)>;

    /// Defensive copy of the whole map. Weakly consistent.
    fn map_copy(&self) -> HashMap<K, V>;

    fn size(&self) -> usize;

    fn is_empty(&self) -> bool;

    /// Remove every entry while holding the locks of all keys known at the
    /// start of the call. Keys inserted concurrently may or may not survive.
    fn clear(&self);

    /// Take `key`'s lock for a critical section spanning several calls.
    ///
    /// The lock is reentrant for the owning thread, so `get`/`put`/`remove`
    /// on the same key may be called while it is held.
    fn lock(&self, key: &K) -> EntryLock<'_>;

    /// Release a lock obtained from [`DistributedMap::lock`].
    fn unlock(&self, lock: EntryLock<'_>) {
        lock.unlock();
    }

    /// Whether any thread currently holds `key`'s lock.
    fn is_locked(&self, key: &K) -> bool;

    fn add_entry_listener(&self, listener: EntryListener<K, V>) -> ListenerId;

    fn add_listener(&self, listener: MapListener) -> ListenerId;

    /// Returns `false` if the handle was already removed.
    fn remove_listener(&self, id: ListenerId) -> bool;
}

/// FIFO or priority-ordered queue with add/remove notification.
pub trait DistributedQueue<T>: Send + Sync {
    /// Insert `item`. Always succeeds for the unbounded local queue.
    fn add(&self, item: T) -> bool;

    /// Insert every item; `true` if at least one was added.
    fn add_all(&self, items: Vec<T>) -> bool;

    /// Remove and return the head. Does not notify listeners.
    fn poll(&self) -> Option<T>;

    fn peek(&self) -> Option<T>;

    /// Remove every occurrence of each given item; `true` if anything was
    /// removed. Listeners see one `Removed` per removed element.
    fn remove_all(&self, items: &[T]) -> bool;

    /// Empty the queue; listeners see one `Removed` per element.
    fn clear(&self);

    /// Snapshot of the contents in poll order.
    fn get_all(&self) -> Vec<T>;

    fn is_empty(&self) -> bool;

    fn size(&self) -> usize;

    fn add_item_listener(&self, listener: ItemListener<T>) -> ListenerId;

    fn add_listener(&self, listener: ChangeListener) -> ListenerId;

    fn remove_listener(&self, id: ListenerId) -> bool;
}

/// Deduplicated membership set with asynchronous notification.
pub trait DistributedSet<T>: Send + Sync {
    fn add(&self, element: T) -> bool;

    fn add_all(&self, elements: Vec<T>) -> bool;

    fn remove(&self, element: &T) -> bool;

    fn remove_all(&self, elements: &[T]) -> bool;

    fn contains(&self, element: &T) -> bool;

    fn contains_all(&self, elements: &[T]) -> bool;

    fn size(&self) -> usize;

    fn is_empty(&self) -> bool;

    fn clear(&self);

    fn get_set_copy(&self) -> HashSet<T>;

    fn add_item_listener(&self, listener: ItemListener<T>) -> ListenerId;

    fn add_listener(&self, listener: ChangeListener) -> ListenerId;

    fn remove_listener(&self, id: ListenerId) -> bool;
}

/// Fire-and-forget broadcast channel.
pub trait DistributedTopic<T>: Send + Sync {
    /// Deliver `message` to every current subscriber, in registration order.
    ///
    /// There is no consistency guarantee between a publish and a concurrent
    /// registration: a subscriber added mid-publish may or may not see it.
    fn publish(&self, message: T);

    fn add_message_listener(&self, listener: MessageListener<T>) -> ListenerId;

    fn remove_message_listener(&self, id: ListenerId) -> bool;
}

/// Facade handing out named coordination structures.
///
/// Every getter creates on first use and returns the same instance for the
/// same name afterwards, for the lifetime of the provider. A queue keeps the
/// ordering it was created with, whichever getter is used later.
pub trait DataProvider: Send + Sync {
    fn get_queue<T>(&self, name: &str) -> Result<Arc<dyn DistributedQueue<T>>>
    where
        T: Clone + PartialEq + Send + Sync + 'static;

    /// Queue ordered by `T`'s natural order, smallest first.
    fn get_priority_queue<T>(&self, name: &str) -> Result<Arc<dyn DistributedQueue<T>>>
    where
        T: Ord + Clone + Send + Sync + 'static;

    /// Queue ordered by `comparator`, smallest first.
    fn get_priority_queue_by<T, C>(
        &self,
        name: &str,
        comparator: C,
    ) -> Result<Arc<dyn DistributedQueue<T>>>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
        C: Fn(&T, &T) -> Ordering + Send + Sync + 'static;

    fn get_map<K, V>(&self, name: &str) -> Result<Arc<dyn DistributedMap<K, V>>>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static;

    fn get_set<T>(&self, name: &str) -> Result<Arc<dyn DistributedSet<T>>>
    where
        T: Eq + Hash + Clone + Send + Sync + 'static;

    fn get_topic<T>(&self, name: &str) -> Result<Arc<dyn DistributedTopic<T>>>
    where
        T: Send + Sync + 'static;

    /// Whether this member is connected and serving data.
    fn is_instance_running(&self) -> bool;

    fn local_member_address(&self) -> String;

    fn cluster_member_addresses(&self) -> HashSet<String>;

    /// `true` when no member of the cluster holds partitioned data.
    fn no_data_member_in_cluster_available(&self) -> bool;
}
