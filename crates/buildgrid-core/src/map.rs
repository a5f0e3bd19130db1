//! In-process keyed lock map

use std::{
    collections::{HashMap, HashSet},
    hash::Hash,
    sync::Arc,
};

use dashmap::DashMap;
use crate::{
    api::DistributedMap,
    events::{EntryEvent, EntryEventKind},
    listener::{invoke_isolated, EntryListener, ListenerId, ListenerRegistry, MapListener},
    lock::{EntryLock, KeyLocks},
};

/// Concurrent map whose reads and writes serialize per key.
///
/// `get`, `put` and `remove` take the key's lock for the duration of the
/// access; snapshot reads (`values`, `key_set`, ...) do not lock at all.
/// Listeners run synchronously on the mutating thread after the key lock has
/// been released.
pub struct LocalMap<K, V> {
    name: Arc<str>,
    store: DashMap<K, V>,
    locks: KeyLocks<K>,
    entry_listeners: ListenerRegistry<dyn Fn(&EntryEvent<K, V>) + Send + Sync>,
    listeners: ListenerRegistry<dyn Fn(EntryEventKind) + Send + Sync>,
}

impl<K, V> LocalMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            store: DashMap::new(),
            locks: KeyLocks::new(),
            entry_listeners: ListenerRegistry::new(),
            listeners: ListenerRegistry::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn notify(&self, event: &EntryEvent<K, V>) {
        let kind = event.kind();
        let event_name = kind.to_string();
        for (id, listener) in self.entry_listeners.snapshot() {
            invoke_isolated(&self.name, id, &event_name, || listener(event));
        }
        for (id, listener) in self.listeners.snapshot() {
            invoke_isolated(&self.name, id, &event_name, || listener(kind));
        }
    }
}

impl<K, V> DistributedMap<K, V> for LocalMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &K) -> Option<V> {
        let lock = self.locks.acquire(key);
        let value = self.store.get(key).map(|entry| entry.value().clone());
        lock.unlock();
        value
    }

    fn get_all(&self, keys: &[K]) -> HashMap<K, V> {
        keys.iter()
            .filter_map(|key| self.get(key).map(|value| (key.clone(), value)))
            .collect()
    }

    fn put(&self, key: K, value: V) -> Option<V> {
        let lock = self.locks.acquire(&key);
        let previous = self.store.insert(key.clone(), value.clone());
        lock.unlock();

        let event = match &previous {
            Some(old_value) => EntryEvent::Updated {
                key,
                old_value: old_value.clone(),
                value,
            },
            None => EntryEvent::Added { key, value },
        };
        self.notify(&event);
        previous
    }

    fn remove(&self, key: &K) -> Option<V> {
        let lock = self.locks.acquire(key);
        let removed = self.store.remove(key).map(|(_, value)| value);
        lock.unlock();

        if let Some(old_value) = &removed {
            self.notify(&EntryEvent::Removed {
                key: key.clone(),
                old_value: old_value.clone(),
            });
        }
        removed
    }

    fn contains_key(&self, key: &K) -> bool {
        self.store.contains_key(key)
    }

    fn values(&self) -> Vec<V> {
        self.store.iter().map(|entry| entry.value().clone()).collect()
    }

    fn key_set(&self) -> HashSet<K> {
        self.store.iter().map(|entry| entry.key().clone()).collect()
    }

    fn entry_set(&self) -> Vec<(K, V)> {
        self.store
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    fn map_copy(&self) -> HashMap<K, V> {
        self.entry_set().into_iter().collect()
    }

    fn size(&self) -> usize {
        self.store.len()
    }

    fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn clear(&self) {
        // Best effort: only keys present at the snapshot are removed, one key
        // lock at a time. A key inserted meanwhile survives.
        for key in self.key_set() {
            let lock = self.locks.acquire(&key);
            self.store.remove(&key);
            lock.unlock();
        }
    }

    fn lock(&self, key: &K) -> EntryLock<'_> {
        self.locks.acquire(key)
    }

    fn is_locked(&self, key: &K) -> bool {
        self.locks.is_locked(key)
    }

    fn add_entry_listener(&self, listener: EntryListener<K, V>) -> ListenerId {
        self.entry_listeners.register(listener)
    }

    fn add_listener(&self, listener: MapListener) -> ListenerId {
        self.listeners.register(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        // A handle belongs to exactly one of the two registries.
        self.entry_listeners.remove(id) || self.listeners.remove(id)
    }
}
