//! Listener registrations and fault-isolated dispatch.
//!
//! Every collection keeps its callbacks in a [`ListenerRegistry`]: an ordered
//! list of `(ListenerId, callback)` pairs. Dispatch takes a snapshot of the
//! list, so callbacks run without any registry lock held and may register or
//! remove listeners themselves.
//!
//! A callback that panics is caught by [`invoke_isolated`], logged, and
//! skipped. The mutator that triggered the event never observes the panic.

use std::{
    any::Any,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

use parking_lot::RwLock;
use tracing::{error, trace};
use uuid::Uuid;

use crate::events::{EntryEvent, EntryEventKind, ItemEvent};

/// Detailed map listener: receives key and values of every change.
pub type EntryListener<K, V> = Arc<dyn Fn(&EntryEvent<K, V>) + Send + Sync>;

/// Coarse map listener: receives only the kind of change.
pub type MapListener = Arc<dyn Fn(EntryEventKind) + Send + Sync>;

/// Detailed queue/set listener: receives the element added or removed.
pub type ItemListener<T> = Arc<dyn Fn(&ItemEvent<T>) + Send + Sync>;

/// Coarse queue/set listener: told that something changed, nothing more.
pub type ChangeListener = Arc<dyn Fn() + Send + Sync>;

/// Topic subscriber.
pub type MessageListener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Opaque handle returned by every listener registration.
///
/// Handles are process-unique; removing a handle twice is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registration-ordered set of callbacks keyed by [`ListenerId`].
pub(crate) struct ListenerRegistry<F: ?Sized> {
    entries: RwLock<Vec<(ListenerId, Arc<F>)>>,
}

impl<F: ?Sized> ListenerRegistry<F> {
    pub(crate) const fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn register(&self, listener: Arc<F>) -> ListenerId {
        let id = ListenerId::generate();
        self.entries.write().push((id, listener));
        trace!(listener = %id, "listener registered");
        id
    }

    /// Returns `false` when the handle was not (or no longer) registered.
    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        let removed = entries.len() != before;
        drop(entries);
        trace!(listener = %id, removed, "listener removal");
        removed
    }

    pub(crate) fn snapshot(&self) -> Vec<(ListenerId, Arc<F>)> {
        self.entries.read().clone()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Run one listener callback, containing any panic it raises.
pub(crate) fn invoke_isolated(
    collection: &str,
    id: ListenerId,
    event: &str,
    callback: impl FnOnce(),
) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(callback)) {
        error!(
            collection,
            listener = %id,
            event,
            panic = panic_message(payload.as_ref()),
            "listener panicked; continuing with remaining listeners"
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
