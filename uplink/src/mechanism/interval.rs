//! Interval-based sync mechanism.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use uplink_config::shared::IntervalConfig;

use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{ErrorKind, UplinkResult};
use crate::mechanism::base::Syncer;
use crate::uplink_error;

/// Mechanism that reports a sync event at a fixed cadence.
///
/// The underlying timer starts lazily on the first [`Syncer::sync`] call, so the first
/// event fires one full period after the mechanism starts waiting. Periods missed while
/// a sync pass was still running are skipped rather than queued, so a late timer never
/// causes a burst of catch-up syncs.
pub struct IntervalSyncer {
    duration: Duration,
    timer: Option<Interval>,
}

impl IntervalSyncer {
    /// Creates an interval mechanism from its configuration.
    pub fn new(config: &IntervalConfig) -> UplinkResult<Self> {
        config.validate().map_err(|err| {
            uplink_error!(
                ErrorKind::ConfigError,
                "Invalid interval mechanism configuration",
                detail = err.to_string(),
                source: err
            )
        })?;

        Ok(Self {
            duration: Duration::from_secs(config.duration_secs),
            timer: None,
        })
    }
}

#[async_trait]
impl Syncer for IntervalSyncer {
    fn name(&self) -> &'static str {
        "interval"
    }

    async fn sync(&mut self, shutdown: &ShutdownRx) -> UplinkResult<()> {
        let duration = self.duration;
        let timer = self.timer.get_or_insert_with(|| {
            // The first tick fires one full period from now, not immediately.
            let mut timer = time::interval_at(Instant::now() + duration, duration);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            timer
        });

        tokio::select! {
            _ = timer.tick() => {}
            _ = shutdown.wait_for_shutdown() => {}
        }

        Ok(())
    }

    async fn close(&mut self, _deadline: Instant) -> UplinkResult<()> {
        self.timer = None;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::timeout;

    use super::*;
    use crate::concurrency::shutdown::create_shutdown_channel;

    fn config(duration_secs: u64) -> IntervalConfig {
        IntervalConfig { duration_secs }
    }

    #[tokio::test]
    async fn construction_rejects_durations_at_or_below_the_minimum() {
        assert_eq!(
            IntervalSyncer::new(&config(5)).err().map(|err| err.kind()),
            Some(ErrorKind::ConfigError)
        );
        assert_eq!(
            IntervalSyncer::new(&config(0)).err().map(|err| err.kind()),
            Some(ErrorKind::ConfigError)
        );
        assert!(IntervalSyncer::new(&config(6)).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn first_event_fires_after_one_full_period() {
        let (_tx, rx) = create_shutdown_channel();
        let mut syncer = IntervalSyncer::new(&config(6)).unwrap();

        // Just before the period elapses the wait must still be pending.
        let pending = timeout(Duration::from_millis(5_900), syncer.sync(&rx)).await;
        assert!(pending.is_err());

        // It completes once the full period has passed.
        timeout(Duration::from_millis(200), syncer.sync(&rx))
            .await
            .expect("the first event should fire one period after the start")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn missed_periods_are_skipped_not_queued() {
        let (_tx, rx) = create_shutdown_channel();
        let mut syncer = IntervalSyncer::new(&config(6)).unwrap();

        // Arm the timer, then stay away from it for several periods.
        let pending = timeout(Duration::from_millis(10), syncer.sync(&rx)).await;
        assert!(pending.is_err());
        time::sleep(Duration::from_secs(20)).await;

        // The backlog collapses into a single immediate event.
        timeout(Duration::from_millis(10), syncer.sync(&rx))
            .await
            .expect("an overdue timer should fire immediately")
            .unwrap();

        // The next event waits into a fresh period instead of draining a queue.
        let pending = timeout(Duration::from_secs(3), syncer.sync(&rx)).await;
        assert!(pending.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_unblocks_the_wait() {
        let (tx, rx) = create_shutdown_channel();
        let mut syncer = IntervalSyncer::new(&config(6)).unwrap();

        let signaler = tokio::spawn(async move {
            time::sleep(Duration::from_secs(1)).await;
            tx.shutdown().unwrap();
        });

        timeout(Duration::from_secs(3), syncer.sync(&rx))
            .await
            .expect("shutdown should complete the wait before the timer fires")
            .unwrap();

        signaler.await.unwrap();
    }

    #[tokio::test]
    async fn close_discards_the_armed_timer() {
        let (_tx, rx) = create_shutdown_channel();
        let mut syncer = IntervalSyncer::new(&config(6)).unwrap();

        let _ = timeout(Duration::from_millis(10), syncer.sync(&rx)).await;
        assert!(syncer.timer.is_some());

        syncer.close(Instant::now()).await.unwrap();
        assert!(syncer.timer.is_none());
    }
}
