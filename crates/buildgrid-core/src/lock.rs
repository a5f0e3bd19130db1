//! Per-key lock management
//!
//! Each key gets its own reentrant mutex, created on first use and pruned
//! from the registry once nobody holds or waits on it. Operations on
//! different keys never contend.
//!
//! # Ownership
//!
//! Locks are only released through the [`EntryLock`] guard returned on
//! acquisition. The guard is `!Send`, so a thread can never release a lock
//! it does not own, and `unlock` consumes the guard, so a lock cannot be
//! released twice.

use std::{hash::Hash, marker::PhantomData, sync::Arc};

use dashmap::DashMap;
use parking_lot::ReentrantMutex;

/// Scoped ownership of one key's lock.
///
/// Released by [`EntryLock::unlock`] or by dropping the guard.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct EntryLock<'a> {
    release: Option<Box<dyn FnOnce() + 'a>>,
    // Keeps the guard on the owning thread even for backends whose release
    // closure happens to be Send.
    _not_send: PhantomData<*const ()>,
}

impl<'a> EntryLock<'a> {
    /// Wrap a backend-specific release action.
    pub fn new(release: impl FnOnce() + 'a) -> Self {
        Self {
            release: Some(Box::new(release)),
            _not_send: PhantomData,
        }
    }

    /// Release the lock now.
    pub fn unlock(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for EntryLock<'_> {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for EntryLock<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryLock")
            .field("held", &self.release.is_some())
            .finish()
    }
}

/// Registry of lazily created per-key locks.
pub(crate) struct KeyLocks<K> {
    locks: DashMap<K, Arc<ReentrantMutex<()>>>,
}

impl<K> KeyLocks<K>
where
    K: Eq + Hash + Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Block until the current thread owns `key`'s lock.
    ///
    /// Reentrant: a thread already holding the key may acquire it again.
    pub(crate) fn acquire(&self, key: &K) -> EntryLock<'_> {
        // The registry shard lock is released at the end of this statement,
        // before blocking on the key lock itself.
        let mutex = Arc::clone(
            self.locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(ReentrantMutex::new(())))
                .value(),
        );
        let guard = mutex.lock_arc();
        drop(mutex);
        let key = key.clone();
        EntryLock::new(move || {
            drop(guard);
            self.prune(&key);
        })
    }

    /// Whether any thread currently holds `key`'s lock.
    pub(crate) fn is_locked(&self, key: &K) -> bool {
        self.locks
            .get(key)
            .is_some_and(|mutex| mutex.is_locked())
    }

    /// Drop the lock object if the registry holds the only reference.
    ///
    /// Acquirers clone the `Arc` under the same shard lock `remove_if` takes,
    /// so a lock that is held or being waited on is never pruned.
    fn prune(&self, key: &K) {
        self.locks
            .remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            mpsc, Barrier,
        },
        thread,
        time::Duration,
    };

    use super::*;

    #[test]
    fn lock_is_pruned_after_release() {
        let locks = KeyLocks::new();
        let guard = locks.acquire(&"agent-A");
        assert!(locks.is_locked(&"agent-A"));
        assert_eq!(locks.tracked(), 1);
        guard.unlock();
        assert!(!locks.is_locked(&"agent-A"));
        assert_eq!(locks.tracked(), 0);
    }

    #[test]
    fn dropping_guard_releases_lock() {
        let locks = KeyLocks::new();
        {
            let _guard = locks.acquire(&1);
            assert!(locks.is_locked(&1));
        }
        assert!(!locks.is_locked(&1));
    }

    #[test]
    fn reentrant_for_owning_thread() {
        let locks = KeyLocks::new();
        let outer = locks.acquire(&"job");
        let inner = locks.acquire(&"job");
        inner.unlock();
        assert!(locks.is_locked(&"job"), "outer guard still held");
        outer.unlock();
        assert!(!locks.is_locked(&"job"));
        assert_eq!(locks.tracked(), 0);
    }

    #[test]
    fn blocks_other_threads_on_same_key() {
        let locks = Arc::new(KeyLocks::new());
        let guard = locks.acquire(&"agent-A");
        let acquired = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();

        let handle = {
            let locks = Arc::clone(&locks);
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                tx.send(()).unwrap();
                let guard = locks.acquire(&"agent-A");
                acquired.store(true, Ordering::SeqCst);
                guard.unlock();
            })
        };

        rx.recv().unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));
        guard.unlock();
        handle.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
        assert_eq!(locks.tracked(), 0);
    }

    #[test]
    fn different_keys_do_not_contend() {
        let locks = Arc::new(KeyLocks::new());
        let barrier = Arc::new(Barrier::new(2));
        let guard = locks.acquire(&"a");

        let handle = {
            let locks = Arc::clone(&locks);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let guard = locks.acquire(&"b");
                barrier.wait();
                guard.unlock();
            })
        };

        // Would deadlock if "b" waited on "a".
        barrier.wait();
        handle.join().unwrap();
        guard.unlock();
    }

    #[test]
    fn waiting_thread_keeps_lock_registered() {
        let locks = Arc::new(KeyLocks::new());
        let guard = locks.acquire(&"k");
        let handle = {
            let locks = Arc::clone(&locks);
            thread::spawn(move || locks.acquire(&"k").unlock())
        };
        thread::sleep(Duration::from_millis(50));
        guard.unlock();
        handle.join().unwrap();
        assert_eq!(locks.tracked(), 0);
    }
}
