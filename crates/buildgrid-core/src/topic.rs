//! In-process pub/sub topic

use std::sync::Arc;

use crate::{
    api::DistributedTopic,
    listener::{invoke_isolated, ListenerId, ListenerRegistry, MessageListener},
};

/// Broadcast channel delivering each message to the subscribers registered
/// at publish time. Messages are never stored or replayed.
pub struct LocalTopic<T> {
    name: Arc<str>,
    subscribers: ListenerRegistry<dyn Fn(&T) + Send + Sync>,
}

impl<T> LocalTopic<T>
where
    T: Send + Sync + 'static,
{
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            subscribers: ListenerRegistry::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> DistributedTopic<T> for LocalTopic<T>
where
    T: Send + Sync + 'static,
{
    fn publish(&self, message: T) {
        for (id, subscriber) in self.subscribers.snapshot() {
            invoke_isolated(&self.name, id, "message", || subscriber(&message));
        }
    }

    fn add_message_listener(&self, listener: MessageListener<T>) -> ListenerId {
        self.subscribers.register(listener)
    }

    fn remove_message_listener(&self, id: ListenerId) -> bool {
        self.subscribers.remove(id)
    }
}
