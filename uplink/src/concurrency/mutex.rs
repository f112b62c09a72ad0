//! Cancellable mutual exclusion for sync execution.
//!
//! Provides a lock whose acquisition is abandoned by a shutdown signal, so a worker
//! blocked behind an in-flight sync never outlives the process shutdown sequence.

use tokio::sync::{Mutex, MutexGuard};

use crate::concurrency::shutdown::ShutdownRx;

/// Mutual exclusion lock with shutdown-aware acquisition.
///
/// [`CancellableMutex`] wraps a [`Mutex`] so callers waiting for the lock are released
/// when shutdown is signaled instead of blocking indefinitely. Holding the returned
/// guard represents exclusive access, and dropping it releases the lock.
#[derive(Debug, Default)]
pub struct CancellableMutex {
    inner: Mutex<()>,
}

impl CancellableMutex {
    /// Acquires the lock unless shutdown happens first.
    ///
    /// Returns [`None`] when shutdown was already signaled or fires while waiting for
    /// the lock. The lock is held until the returned guard is dropped.
    pub async fn lock(&self, shutdown: &ShutdownRx) -> Option<MutexGuard<'_, ()>> {
        if shutdown.is_shutdown() {
            return None;
        }

        tokio::select! {
            guard = self.inner.lock() => Some(guard),
            _ = shutdown.wait_for_shutdown() => None,
        }
    }
}
