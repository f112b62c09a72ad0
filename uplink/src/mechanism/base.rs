//! Contract implemented by every sync mechanism.

use async_trait::async_trait;
use tokio::time::Instant;

use crate::concurrency::shutdown::ShutdownRx;
use crate::error::UplinkResult;

/// A source of sync events.
///
/// A mechanism decides when a sync should happen; performing the transfer belongs to
/// the sync executor. Implementations are driven by a dedicated worker that repeatedly
/// waits on [`Syncer::sync`] and starts a sync pass for every reported event.
#[async_trait]
pub trait Syncer: Send {
    /// Returns the name of the mechanism, used in logs and error details.
    fn name(&self) -> &'static str;

    /// Waits until the next sync event.
    ///
    /// Implementations allocate their resources lazily on the first call. Returning
    /// `Ok(())` reports one sync event. The wait also completes without an event when
    /// `shutdown` is signaled, so callers must check the shutdown state before acting
    /// on the return.
    async fn sync(&mut self, shutdown: &ShutdownRx) -> UplinkResult<()>;

    /// Releases the mechanism's resources.
    ///
    /// `deadline` bounds how long teardown may take. Closing a mechanism whose
    /// resources were never allocated is a no-op.
    async fn close(&mut self, deadline: Instant) -> UplinkResult<()>;
}
