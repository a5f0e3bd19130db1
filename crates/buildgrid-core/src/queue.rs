//! In-process FIFO and priority queue
//!
//! One coarse mutex per queue serializes every access. The ordering discipline
//! is fixed at construction: FIFO appends at the tail, priority inserts at the
//! position given by the comparator (after any equal elements, so equal
//! priorities stay FIFO). Either way the head of the deque is the next element
//! `poll` returns, and `get_all` yields contents in poll order.

use std::{cmp::Ordering, collections::VecDeque, sync::Arc};

use parking_lot::Mutex;

use crate::{
    api::DistributedQueue,
    events::ItemEvent,
    listener::{invoke_isolated, ChangeListener, ItemListener, ListenerId, ListenerRegistry},
};

type Comparator<T> = Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

enum Discipline<T> {
    Fifo,
    Priority(Comparator<T>),
}

/// Queue with add/remove notification.
///
/// Listeners run synchronously on the calling thread, in registration order,
/// after the queue lock has been released.
pub struct LocalQueue<T> {
    name: Arc<str>,
    items: Mutex<VecDeque<T>>,
    discipline: Discipline<T>,
    item_listeners: ListenerRegistry<dyn Fn(&ItemEvent<T>) + Send + Sync>,
    listeners: ListenerRegistry<dyn Fn() + Send + Sync>,
}

impl<T> LocalQueue<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Insertion-ordered queue.
    #[must_use]
    pub fn fifo(name: impl Into<Arc<str>>) -> Self {
        Self::with_discipline(name.into(), Discipline::Fifo)
    }

    /// Queue ordered by `comparator`; `poll` returns the smallest element.
    #[must_use]
    pub fn priority_by<C>(name: impl Into<Arc<str>>, comparator: C) -> Self
    where
        C: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        Self::with_discipline(name.into(), Discipline::Priority(Box::new(comparator)))
    }

    fn with_discipline(name: Arc<str>, discipline: Discipline<T>) -> Self {
        Self {
            name,
            items: Mutex::new(VecDeque::new()),
            discipline,
            item_listeners: ListenerRegistry::new(),
            listeners: ListenerRegistry::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this queue orders by priority rather than insertion.
    #[must_use]
    pub const fn is_priority(&self) -> bool {
        matches!(self.discipline, Discipline::Priority(_))
    }

    fn insert(&self, items: &mut VecDeque<T>, item: T) {
        match &self.discipline {
            Discipline::Fifo => items.push_back(item),
            Discipline::Priority(compare) => {
                let position =
                    items.partition_point(|existing| compare(existing, &item) != Ordering::Greater);
                items.insert(position, item);
            }
        }
    }

    fn notify(&self, events: &[ItemEvent<T>]) {
        if events.is_empty() {
            return;
        }
        let item_listeners = self.item_listeners.snapshot();
        for event in events {
            for (id, listener) in &item_listeners {
                invoke_isolated(&self.name, *id, event.name(), || listener(event));
            }
        }
        for (id, listener) in self.listeners.snapshot() {
            invoke_isolated(&self.name, id, "queue_changed", || listener());
        }
    }
}

impl<T> LocalQueue<T>
where
    T: Ord + Clone + Send + Sync + 'static,
{
    /// Queue ordered by `T`'s natural order; `poll` returns the smallest element.
    #[must_use]
    pub fn priority(name: impl Into<Arc<str>>) -> Self {
        Self::priority_by(name, T::cmp)
    }
}

impl<T> DistributedQueue<T> for LocalQueue<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn add(&self, item: T) -> bool {
        let event = ItemEvent::Added(item.clone());
        let mut items = self.items.lock();
        self.insert(&mut items, item);
        drop(items);
        self.notify(&[event]);
        true
    }

    fn add_all(&self, new_items: Vec<T>) -> bool {
        let events: Vec<_> = new_items.iter().cloned().map(ItemEvent::Added).collect();
        let mut items = self.items.lock();
        for item in new_items {
            self.insert(&mut items, item);
        }
        drop(items);
        let added = !events.is_empty();
        self.notify(&events);
        added
    }

    fn poll(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    fn peek(&self) -> Option<T> {
        self.items.lock().front().cloned()
    }

    fn remove_all(&self, targets: &[T]) -> bool {
        let mut items = self.items.lock();
        let mut removed = Vec::new();
        items.retain(|item| {
            if targets.contains(item) {
                removed.push(ItemEvent::Removed(item.clone()));
                false
            } else {
                true
            }
        });
        drop(items);
        let changed = !removed.is_empty();
        self.notify(&removed);
        changed
    }

    fn clear(&self) {
        let drained: Vec<_> = self.items.lock().drain(..).map(ItemEvent::Removed).collect();
        self.notify(&drained);
    }

    fn get_all(&self) -> Vec<T> {
        self.items.lock().iter().cloned().collect()
    }

    fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    fn size(&self) -> usize {
        self.items.lock().len()
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
