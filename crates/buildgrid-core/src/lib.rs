//! Buildgrid-core - Coordination primitives for distributing build jobs
//!
//! This crate provides:
//! - Keyed lock map with per-key mutual exclusion
//! - FIFO and priority queues
//! - Membership sets with asynchronous notification
//! - Fire-and-forget pub/sub topics
//! - A data provider facade that hands out named instances of all of the above
//! - Typed build-job views over the provider (`localci`)
//!
//! All structures are safe to share between threads without external
//! synchronization. Listener callbacks are isolated from each other: a
//! panicking callback is logged and never stops delivery to the others.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod listener;
pub mod localci;
pub mod lock;
pub mod map;
pub mod provider;
pub mod queue;
pub mod set;
pub mod topic;

pub use api::{
    DataProvider, DistributedMap, DistributedQueue, DistributedSet, DistributedTopic,
};
pub use config::{BackendKind, GridConfig};
pub use error::{CollectionKind, Error, Result};
pub use events::{EntryEvent, EntryEventKind, ItemEvent};
pub use executor::NotificationExecutor;
pub use listener::{
    ChangeListener, EntryListener, ItemListener, ListenerId, MapListener, MessageListener,
};
pub use lock::EntryLock;
pub use map::LocalMap;
pub use provider::{connect, LocalDataProvider};
pub use queue::LocalQueue;
pub use set::LocalSet;
pub use topic::LocalTopic;
