//! Bounded pool for blocking image work.

use std::any::Any;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::error::{BgRemovalError, Result};

/// Runs blocking closures on tokio's blocking threads with at most `size`
/// in flight at once.
///
/// Callers await admission on the semaphore from their own async task, so
/// waiting work holds neither a permit nor a blocking thread.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool with `size` workers (at least one).
    #[must_use]
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of workers currently idle.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Stop admitting work. Pending and future `execute` calls fail.
    pub fn close(&self) {
        self.permits.close();
    }

    /// Run `task` on a blocking worker once a slot is free and await its result.
    ///
    /// # Errors
    /// `BgRemovalError::Unexpected` when the pool is closed, the task panics,
    /// or the blocking task cannot be joined
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| BgRemovalError::unexpected("worker pool is closed"))?;

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            task()
        });

        match handle.await {
            Ok(value) => Ok(value),
            Err(e) if e.is_panic() => Err(BgRemovalError::unexpected(format!(
                "worker panicked: {}",
                panic_message(e.into_panic().as_ref())
            ))),
            Err(e) => Err(BgRemovalError::unexpected(format!("worker task failed: {e}"))),
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
