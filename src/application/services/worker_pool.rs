//! Bounded pool for CPU-bound image work.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::trace;

use crate::domain::errors::LoadError;

/// Runs blocking closures on Tokio's blocking threads with bounded parallelism.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Creates a pool that runs at most `size` closures at once.
    #[must_use]
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Configured maximum parallelism.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Number of closures currently running.
    #[must_use]
    pub fn active(&self) -> usize {
        self.size - self.permits.available_permits()
    }

    /// Runs `work` off the async threads.
    ///
    /// # Errors
    /// Returns the closure's error, or a worker error if it panicked.
    pub async fn run<T, F>(&self, work: F) -> Result<T, LoadError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, LoadError> + Send + 'static,
    {
        let _permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| LoadError::Shutdown)?;
        trace!(active = self.active(), "Running blocking work");

        tokio::task::spawn_blocking(work)
            .await
            .map_err(|e| LoadError::worker(format!("Blocking task failed: {e}")))?
    }
}
