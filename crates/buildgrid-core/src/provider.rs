//! Single-node data provider
//!
//! Hands out named queues, maps, sets and topics backed by the in-process
//! implementations in this crate. Each kind has its own namespace; within a
//! namespace the first request for a name decides the concrete type, and
//! later requests with a different element type fail with
//! [`Error::TypeMismatch`] instead of silently creating a second instance.

use std::{any::Any, cmp::Ordering, collections::HashSet, hash::Hash, sync::Arc};

use dashmap::DashMap;
use tracing::{debug, info};

use crate::{
    api::{DataProvider, DistributedMap, DistributedQueue, DistributedSet, DistributedTopic},
    config::{BackendKind, GridConfig},
    error::{CollectionKind, Error, Result},
    executor::NotificationExecutor,
    map::LocalMap,
    queue::LocalQueue,
    set::LocalSet,
    topic::LocalTopic,
};

type Erased = Arc<dyn Any + Send + Sync>;

/// Name-indexed instances of one collection kind.
struct NamedRegistry {
    kind: CollectionKind,
    entries: DashMap<String, Erased>,
}

impl NamedRegistry {
    fn new(kind: CollectionKind) -> Self {
        Self {
            kind,
            entries: DashMap::new(),
        }
    }

    /// Existing instance for `name`, or the one built by `create`.
    ///
    /// Creation happens under the shard lock, so concurrent first requests
    /// for the same name agree on a single instance.
    fn get_or_create<C>(&self, name: &str, create: impl FnOnce() -> C) -> Result<Arc<C>>
    where
        C: Any + Send + Sync,
    {
        let erased = Arc::clone(
            self.entries
                .entry(name.to_string())
                .or_insert_with(|| {
                    debug!(kind = %self.kind, name, "creating collection");
                    let created: Erased = Arc::new(create());
                    created
                })
                .value(),
        );
        erased.downcast::<C>().map_err(|_| Error::TypeMismatch {
            name: name.to_string(),
            kind: self.kind,
        })
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// In-process backend: every structure lives in this process's memory.
pub struct LocalDataProvider {
    member_address: String,
    executor: Arc<NotificationExecutor>,
    queues: NamedRegistry,
    maps: NamedRegistry,
    sets: NamedRegistry,
    topics: NamedRegistry,
}

impl LocalDataProvider {
    /// Build a provider from validated settings.
    pub fn new(config: &GridConfig) -> Result<Self> {
        config.validate()?;
        let executor = NotificationExecutor::new(config.notification_workers)?;
        Ok(Self {
            member_address: config.member_address.clone(),
            executor: Arc::new(executor),
            queues: NamedRegistry::new(CollectionKind::Queue),
            maps: NamedRegistry::new(CollectionKind::Map),
            sets: NamedRegistry::new(CollectionKind::Set),
            topics: NamedRegistry::new(CollectionKind::Topic),
        })
    }

    fn queue<T>(
        &self,
        name: &str,
        create: impl FnOnce() -> LocalQueue<T>,
    ) -> Result<Arc<LocalQueue<T>>>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        self.queues.get_or_create(name, create)
    }
}

impl std::fmt::Debug for LocalDataProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalDataProvider")
            .field("member_address", &self.member_address)
            .field("queues", &self.queues.len())
            .field("maps", &self.maps.len())
            .field("sets", &self.sets.len())
            .field("topics", &self.topics.len())
            .finish_non_exhaustive()
    }
}

impl DataProvider for LocalDataProvider {
    fn get_queue<T>(&self, name: &str) -> Result<Arc<dyn DistributedQueue<T>>>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        let queue: Arc<dyn DistributedQueue<T>> = self.queue(name, || LocalQueue::fifo(name))?;
        Ok(queue)
    }

    fn get_priority_queue<T>(&self, name: &str) -> Result<Arc<dyn DistributedQueue<T>>>
    where
        T: Ord + Clone + Send + Sync + 'static,
    {
        let queue = self.queue(name, || LocalQueue::priority(name))?;
        if !queue.is_priority() {
            debug!(name, "priority queue requested for existing FIFO queue");
        }
        let queue: Arc<dyn DistributedQueue<T>> = queue;
        Ok(queue)
    }

    fn get_priority_queue_by<T, C>(
        &self,
        name: &str,
        comparator: C,
    ) -> Result<Arc<dyn DistributedQueue<T>>>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
        C: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        let queue = self.queue(name, || LocalQueue::priority_by(name, comparator))?;
        if !queue.is_priority() {
            debug!(name, "priority queue requested for existing FIFO queue");
        }
        let queue: Arc<dyn DistributedQueue<T>> = queue;
        Ok(queue)
    }

    fn get_map<K, V>(&self, name: &str) -> Result<Arc<dyn DistributedMap<K, V>>>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let map: Arc<dyn DistributedMap<K, V>> =
            self.maps.get_or_create(name, || LocalMap::<K, V>::new(name))?;
        Ok(map)
    }

    fn get_set<T>(&self, name: &str) -> Result<Arc<dyn DistributedSet<T>>>
    where
        T: Eq + Hash + Clone + Send + Sync + 'static,
    {
        let set: Arc<dyn DistributedSet<T>> = self.sets.get_or_create(name, || {
            LocalSet::<T>::new(name, Arc::clone(&self.executor))
        })?;
        Ok(set)
    }

    fn get_topic<T>(&self, name: &str) -> Result<Arc<dyn DistributedTopic<T>>>
    where
        T: Send + Sync + 'static,
    {
        let topic: Arc<dyn DistributedTopic<T>> =
            self.topics.get_or_create(name, || LocalTopic::<T>::new(name))?;
        Ok(topic)
    }

    fn is_instance_running(&self) -> bool {
        true
    }

    fn local_member_address(&self) -> String {
        self.member_address.clone()
    }

    fn cluster_member_addresses(&self) -> HashSet<String> {
        HashSet::from([self.member_address.clone()])
    }

    fn no_data_member_in_cluster_available(&self) -> bool {
        false
    }
}

/// Resolve the configured backend. Called once at process start.
///
/// # Errors
///
/// Returns error if the configuration is invalid or the notification pool
/// cannot be started.
pub fn connect(config: &GridConfig) -> Result<LocalDataProvider> {
    match config.backend {
        BackendKind::Local => {
            let provider = LocalDataProvider::new(config)?;
            info!(
                backend = %config.backend,
                member = %config.member_address,
                workers = config.notification_workers,
                "data provider ready"
            );
            Ok(provider)
        }
    }
}
