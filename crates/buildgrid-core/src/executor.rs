//! Background pool for asynchronous listener notifications.
//!
//! Sets hand each notification to this pool instead of running callbacks on
//! the writer's thread. The pool is a dedicated tokio runtime whose blocking
//! thread count is capped at the configured worker count; callbacks are plain
//! synchronous closures, so they run through `spawn_blocking`.

use tokio::runtime::{Builder, Runtime};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Bounded worker pool running notification callbacks off the caller's thread.
pub struct NotificationExecutor {
    runtime: Option<Runtime>,
    workers: usize,
}

impl NotificationExecutor {
    /// Start a pool with at most `workers` concurrently running callbacks.
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(Error::InvalidConfig(
                "notification worker count must be at least 1".to_string(),
            ));
        }
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(workers)
            .thread_name("buildgrid-notify")
            .build()
            .map_err(|e| Error::Executor(format!("failed to start notification pool: {e}")))?;
        debug!(workers, "notification pool started");
        Ok(Self {
            runtime: Some(runtime),
            workers,
        })
    }

    /// Maximum number of callbacks running at once
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Schedule `task`; it runs on a pool thread at some later point.
    pub fn execute<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.runtime {
            Some(runtime) => {
                // Detached: completion is not awaited.
                drop(runtime.spawn_blocking(task));
            }
            None => warn!("notification pool is shut down; dropping notification"),
        }
    }
}

impl std::fmt::Debug for NotificationExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationExecutor")
            .field("workers", &self.workers)
            .field("running", &self.runtime.is_some())
            .finish()
    }
}

impl Drop for NotificationExecutor {
    fn drop(&mut self) {
        // shutdown_background is safe even when dropped inside another runtime.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
