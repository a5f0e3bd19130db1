//! In-process membership set
//!
//! Reads share a read lock; writes are exclusive. Unlike queues and maps, a
//! set never runs listeners on the writer's thread: every (listener, event)
//! pair is submitted to the [`NotificationExecutor`] as its own task, so a
//! slow or panicking listener cannot delay a writer or another listener.
//! Delivery order between tasks is not guaranteed.

use std::{collections::HashSet, hash::Hash, sync::Arc};

use parking_lot::RwLock;

use crate::{
    api::DistributedSet,
    events::ItemEvent,
    executor::NotificationExecutor,
    listener::{invoke_isolated, ChangeListener, ItemListener, ListenerId, ListenerRegistry},
};

pub struct LocalSet<T> {
    name: Arc<str>,
    members: RwLock<HashSet<T>>,
    executor: Arc<NotificationExecutor>,
    item_listeners: ListenerRegistry<dyn Fn(&ItemEvent<T>) + Send + Sync>,
    listeners: ListenerRegistry<dyn Fn() + Send + Sync>,
}

impl<T> LocalSet<T>
where
    T: Eq + Hash + Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, executor: Arc<NotificationExecutor>) -> Self {
        Self {
            name: name.into(),
            members: RwLock::new(HashSet::new()),
            executor,
            item_listeners: ListenerRegistry::new(),
            listeners: ListenerRegistry::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn notify(&self, events: Vec<ItemEvent<T>>) {
        if events.is_empty() {
            return;
        }
        if !self.item_listeners.is_empty() {
            let item_listeners = self.item_listeners.snapshot();
            for event in events.into_iter().map(Arc::new) {
                for (id, listener) in &item_listeners {
                    let (id, listener) = (*id, Arc::clone(listener));
                    let name = Arc::clone(&self.name);
                    let event = Arc::clone(&event);
                    self.executor.execute(move || {
                        invoke_isolated(&name, id, event.name(), || listener(event.as_ref()));
                    });
                }
            }
        }
        for (id, listener) in self.listeners.snapshot() {
            let name = Arc::clone(&self.name);
            self.executor.execute(move || {
                invoke_isolated(&name, id, "set_changed", || listener());
            });
        }
    }
}

impl<T> DistributedSet<T> for LocalSet<T>
where
    T: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn add(&self, element: T) -> bool {
        let added = self.members.write().insert(element.clone());
        if added {
            self.notify(vec![ItemEvent::Added(element)]);
        }
        added
    }

    fn add_all(&self, elements: Vec<T>) -> bool {
        let mut members = self.members.write();
        let added: Vec<_> = elements
            .into_iter()
            .filter(|element| members.insert(element.clone()))
            .map(ItemEvent::Added)
            .collect();
        drop(members);
        let changed = !added.is_empty();
        self.notify(added);
        changed
    }

    fn remove(&self, element: &T) -> bool {
        let removed = self.members.write().remove(element);
        if removed {
            self.notify(vec![ItemEvent::Removed(element.clone())]);
        }
        removed
    }

    fn remove_all(&self, elements: &[T]) -> bool {
        let mut members = self.members.write();
        let removed: Vec<_> = elements
            .iter()
            .filter_map(|element| members.take(element))
            .map(ItemEvent::Removed)
            .collect();
        drop(members);
        let changed = !removed.is_empty();
        self.notify(removed);
        changed
    }

    fn contains(&self, element: &T) -> bool {
        self.members.read().contains(element)
    }

    fn contains_all(&self, elements: &[T]) -> bool {
        let members = self.members.read();
        elements.iter().all(|element| members.contains(element))
    }

    fn size(&self) -> usize {
        self.members.read().len()
    }

    fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }

    fn clear(&self) {
        let removed: Vec<_> = self
            .members
            .write()
            .drain()
            .map(ItemEvent::Removed)
            .collect();
        self.notify(removed);
    }

    fn get_set_copy(&self) -> HashSet<T> {
        self.members.read().clone()
    }

    fn add_item_listener(&self, listener: ItemListener<T>) -> ListenerId {
        self.item_listeners.register(listener)
    }

    fn add_listener(&self, listener: ChangeListener) -> ListenerId {
        self.listeners.register(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.item_listeners.remove(id) || self.listeners.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::mpsc::{self, Receiver},
        thread,
        time::Duration,
    };

    use proptest::prelude::*;

    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    fn online_agents() -> LocalSet<String> {
        let executor = Arc::new(NotificationExecutor::new(2).unwrap());
        LocalSet::new("online-agents", executor)
    }

    fn item_channel(set: &LocalSet<String>) -> Receiver<ItemEvent<String>> {
        let (tx, rx) = mpsc::channel();
        let tx = parking_lot::Mutex::new(tx);
        set.add_item_listener(Arc::new(move |event: &ItemEvent<String>| {
            let _ = tx.lock().send(event.clone());
        }));
        rx
    }

    fn drain(rx: &Receiver<ItemEvent<String>>, expected: usize) -> Vec<ItemEvent<String>> {
        (0..expected)
            .map(|_| rx.recv_timeout(WAIT).unwrap())
            .collect()
    }

    #[test]
    fn duplicates_collapse() {
        let set = online_agents();
        assert!(set.add_all(vec!["A".into(), "B".into(), "A".into()]));
        assert_eq!(set.size(), 2);
        assert!(set.contains(&"A".to_string()));
        assert!(set.contains(&"B".to_string()));
        assert!(set.contains_all(&["A".to_string(), "B".to_string()]));
        assert!(!set.contains_all(&["A".to_string(), "C".to_string()]));
    }

    #[test]
    fn second_add_of_same_member_reports_no_change() {
        let set = online_agents();
        assert!(set.add("A".into()));
        assert!(!set.add("A".into()));
        assert_eq!(set.size(), 1);
    }

    #[test]
    fn notifications_run_on_pool_threads() {
        let set = online_agents();
        let (tx, rx) = mpsc::channel();
        let tx = parking_lot::Mutex::new(tx);
        set.add_item_listener(Arc::new(move |_: &ItemEvent<String>| {
            let _ = tx.lock().send(thread::current().id());
        }));
        set.add("A".into());
        let listener_thread = rx.recv_timeout(WAIT).unwrap();
        assert_ne!(listener_thread, thread::current().id());
    }

    #[test]
    fn add_and_remove_deliver_item_events() {
        let set = online_agents();
        let rx = item_channel(&set);
        set.add_all(vec!["A".into(), "B".into(), "A".into()]);
        let mut added = drain(&rx, 2);
        added.sort_by(|a, b| a.item().cmp(b.item()));
        assert_eq!(
            added,
            vec![ItemEvent::Added("A".into()), ItemEvent::Added("B".into())]
        );

        assert!(set.remove(&"A".to_string()));
        assert!(!set.remove(&"A".to_string()));
        assert_eq!(drain(&rx, 1), vec![ItemEvent::Removed("A".into())]);
    }

    #[test]
    fn remove_all_and_clear_report_each_member() {
        let set = online_agents();
        set.add_all(vec!["A".into(), "B".into(), "C".into()]);
        let rx = item_channel(&set);
        assert!(set.remove_all(&["A".to_string(), "Z".to_string()]));
        assert!(!set.remove_all(&["Z".to_string()]));
        assert_eq!(drain(&rx, 1), vec![ItemEvent::Removed("A".into())]);

        set.clear();
        assert!(set.is_empty());
        let mut removed = drain(&rx, 2);
        removed.sort_by(|a, b| a.item().cmp(b.item()));
        assert_eq!(
            removed,
            vec![ItemEvent::Removed("B".into()), ItemEvent::Removed("C".into())]
        );
    }

    #[test]
    fn coarse_listener_fires_on_change_only() {
        let set = online_agents();
        let (tx, rx) = mpsc::channel();
        let tx = parking_lot::Mutex::new(tx);
        set.add_listener(Arc::new(move || {
            let _ = tx.lock().send(());
        }));
        set.add("A".into());
        rx.recv_timeout(WAIT).unwrap();
        set.add("A".into());
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn panicking_listener_does_not_prevent_delivery_to_others() {
        let set = online_agents();
        set.add_item_listener(Arc::new(|_: &ItemEvent<String>| panic!("listener failure")));
        let rx = item_channel(&set);
        set.add("A".into());
        assert_eq!(drain(&rx, 1), vec![ItemEvent::Added("A".into())]);
    }

    #[test]
    fn slow_listener_does_not_block_writer() {
        let set = online_agents();
        let (tx, rx) = mpsc::channel::<()>();
        let gate = parking_lot::Mutex::new(rx);
        set.add_item_listener(Arc::new(move |_: &ItemEvent<String>| {
            let _ = gate.lock().recv_timeout(WAIT);
        }));
        // Returns while the listener is still parked on the gate.
        assert!(set.add("A".into()));
        assert!(set.add("B".into()));
        assert_eq!(set.size(), 2);
        drop(tx);
    }

    #[test]
    fn removed_listener_stops_receiving_and_removal_is_idempotent() {
        let set = online_agents();
        let (tx, rx) = mpsc::channel();
        let tx = parking_lot::Mutex::new(tx);
        let id = set.add_item_listener(Arc::new(move |event: &ItemEvent<String>| {
            let _ = tx.lock().send(event.clone());
        }));
        assert!(set.remove_listener(id));
        assert!(!set.remove_listener(id));
        set.add("A".into());
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn set_copy_is_independent() {
        let set = online_agents();
        set.add("A".into());
        let mut copy = set.get_set_copy();
        copy.insert("B".into());
        assert_eq!(set.size(), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_add_is_idempotent(
            items in proptest::collection::vec("[a-d]{1,2}", 0..40)
        ) {
            let set = online_agents();
            for item in &items {
                set.add(item.clone());
            }
            let distinct: HashSet<_> = items.iter().cloned().collect();
            prop_assert_eq!(set.size(), distinct.len());
            for item in &distinct {
                prop_assert!(!set.add(item.clone()));
            }
            prop_assert_eq!(set.get_set_copy(), distinct);
        }
    }
}
