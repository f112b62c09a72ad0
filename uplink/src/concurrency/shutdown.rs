//! Graceful shutdown signaling for sync workers.
//!
//! This module abstracts tokio's watch channels into a broadcast-style shutdown channel:
//! one transmitter notifies every subscribed worker, and receivers observe the signal
//! even when they subscribe or start waiting after it fired.

use tokio::sync::watch;

/// Result of dispatching a shutdown signal.
pub type ShutdownResult = Result<(), watch::error::SendError<bool>>;

/// Transmitter side of the shutdown channel.
///
/// A single [`ShutdownTx`] coordinates the termination of all workers holding a
/// [`ShutdownRx`]. Cloning is cheap and all clones refer to the same channel.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<bool>);

impl ShutdownTx {
    /// Signals shutdown to all current and future receivers.
    ///
    /// Fails only when no receiver is alive to observe the signal.
    pub fn shutdown(&self) -> ShutdownResult {
        self.0.send(true)
    }

    /// Creates a new receiver subscribed to this transmitter.
    pub fn subscribe(&self) -> ShutdownRx {
        ShutdownRx(self.0.subscribe())
    }
}

/// Receiver side of the shutdown channel.
#[derive(Debug, Clone)]
pub struct ShutdownRx(watch::Receiver<bool>);

impl ShutdownRx {
    /// Returns whether shutdown has already been signaled.
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    /// Waits until shutdown is signaled.
    ///
    /// Completes immediately when the signal was dispatched before this call. A dropped
    /// transmitter counts as a shutdown since no signal can arrive afterwards.
    pub async fn wait_for_shutdown(&self) {
        let mut rx = self.0.clone();
        let _ = rx.wait_for(|signaled| *signaled).await;
    }
}

/// Creates a new shutdown channel pair.
///
/// The channel starts in the "running" state. Receivers obtained later via
/// [`ShutdownTx::subscribe`] still observe a signal dispatched at any earlier point.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTx(tx), ShutdownRx(rx))
}
