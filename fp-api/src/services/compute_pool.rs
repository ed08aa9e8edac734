//! Bounded pool for CPU-bound work
//!
//! Jobs run on tokio's blocking thread pool; a semaphore caps how many run
//! at once so a burst of predictions cannot occupy every blocking thread.

use anyhow::anyhow;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone)]
pub struct ComputePool {
    permits: Arc<Semaphore>,
    workers: usize,
}

impl ComputePool {
    /// Pool running at most `workers` jobs concurrently (minimum 1)
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Jobs that could start right now without waiting
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `job` off the async runtime and await its result
    ///
    /// A panicking job surfaces as [`ServiceError::Unexpected`].
    pub async fn run<F, T>(&self, job: F) -> ServiceResult<T>
    where
        F: FnOnce() -> ServiceResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| anyhow!("compute pool is closed: {}", e))?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| ServiceError::Unexpected(anyhow!("compute job failed: {}", e)))?
    }
}
