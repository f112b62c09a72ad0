//! Orchestration of sync mechanisms.

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info};
use uplink_config::shared::MechanismConfig;

use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{ErrorKind, UplinkResult};
use crate::executor::{SyncExecutor, SyncTransport};
use crate::mechanism::base::Syncer;
use crate::mechanism::demand::OnDemandSyncer;
use crate::mechanism::interval::IntervalSyncer;
use crate::{bail, uplink_error};

/// Orchestrator for the configured sync mechanisms.
///
/// The runner builds the mechanisms enabled in its configuration, drives each one from
/// a dedicated worker, and tears all of them down at shutdown. A mechanism failure is
/// fatal only for its own worker, the others keep reporting sync events.
pub struct MechanismRunner<T> {
    config: MechanismConfig,
    executor: Arc<SyncExecutor<T>>,
    registered: Vec<Box<dyn Syncer>>,
    syncers: Vec<Box<dyn Syncer>>,
}

impl<T> MechanismRunner<T>
where
    T: SyncTransport,
{
    /// Creates a runner for the mechanisms enabled in `config`.
    pub fn new(config: MechanismConfig, executor: Arc<SyncExecutor<T>>) -> Self {
        Self {
            config,
            executor,
            registered: Vec::new(),
            syncers: Vec::new(),
        }
    }

    /// Registers an additional mechanism to run alongside the configured ones.
    pub fn register(&mut self, syncer: Box<dyn Syncer>) {
        self.registered.push(syncer);
    }

    /// Runs all mechanisms until shutdown is signaled.
    ///
    /// A construction failure of a configured mechanism aborts the start before any
    /// worker runs. Once started, every mechanism is driven by its own worker until
    /// shutdown, and the mechanisms are handed back when their workers finish so
    /// [`MechanismRunner::close`] can release their resources afterwards.
    pub async fn run_all(&mut self, shutdown: ShutdownRx) -> UplinkResult<()> {
        let mut syncers: Vec<Box<dyn Syncer>> = Vec::new();

        if let Some(interval) = &self.config.interval {
            syncers.push(Box::new(IntervalSyncer::new(interval)?));
        }
        if let Some(on_demand) = &self.config.on_demand {
            syncers.push(Box::new(OnDemandSyncer::new(on_demand)?));
        }
        syncers.extend(self.registered.drain(..));

        if syncers.is_empty() {
            bail!(
                ErrorKind::ConfigError,
                "No mechanisms are configured for syncing"
            );
        }

        let mut workers = JoinSet::new();
        for syncer in syncers {
            workers.spawn(drive_syncer(
                syncer,
                shutdown.clone(),
                self.executor.clone(),
            ));
        }

        let mut panics = Vec::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(syncer) => self.syncers.push(syncer),
                Err(err) if err.is_cancelled() => {
                    debug!("a mechanism worker was cancelled before finishing");
                }
                Err(err) => {
                    error!(error = %err, "a mechanism worker panicked");
                    panics.push(uplink_error!(
                        ErrorKind::MechanismPanic,
                        "A mechanism worker panicked",
                        detail = err.to_string(),
                        source: err
                    ));
                }
            }
        }

        if !panics.is_empty() {
            return Err(panics.into());
        }

        Ok(())
    }

    /// Closes all mechanisms that ran, aggregating their failures.
    ///
    /// Every mechanism is closed even when an earlier one fails. The aggregated error
    /// references each failed mechanism by name.
    pub async fn close(&mut self, deadline: Instant) -> UplinkResult<()> {
        let mut errors = Vec::new();

        for syncer in &mut self.syncers {
            let mechanism = syncer.name();
            if let Err(err) = syncer.close(deadline).await {
                error!(mechanism, error = %err, "failed to close the mechanism");
                errors.push(uplink_error!(
                    ErrorKind::ShutdownError,
                    "Failed to close a mechanism",
                    detail = format!("mechanism: {mechanism}"),
                    source: err
                ));
            }
        }
        self.syncers.clear();

        if !errors.is_empty() {
            return Err(errors.into());
        }

        Ok(())
    }
}

/// Drives one mechanism until shutdown, starting a sync pass for every reported event.
///
/// The mechanism is returned when the worker finishes so the runner can release its
/// resources during the close sequence.
async fn drive_syncer<T>(
    mut syncer: Box<dyn Syncer>,
    shutdown: ShutdownRx,
    executor: Arc<SyncExecutor<T>>,
) -> Box<dyn Syncer>
where
    T: SyncTransport,
{
    let mechanism = syncer.name();
    info!(mechanism, "mechanism worker started");

    while !shutdown.is_shutdown() {
        if let Err(err) = syncer.sync(&shutdown).await {
            error!(mechanism, error = %err, "the mechanism failed to report a sync event");
            break;
        }

        // A completed wait can mean shutdown rather than a sync event.
        if shutdown.is_shutdown() {
            break;
        }

        info!(mechanism, "sync event fired");

        if let Err(err) = executor.do_sync(&shutdown).await {
            error!(mechanism, error = %err, "the sync to the server failed");
        }
    }

    info!(mechanism, "mechanism worker stopped");

    syncer
}
