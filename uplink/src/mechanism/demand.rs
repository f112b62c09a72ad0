//! On-demand sync mechanism triggered over HTTP.

use std::io;
use std::net::TcpListener;

use actix_web::dev::ServerHandle;
use actix_web::{App, HttpResponse, HttpServer, web};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::warn;
use tracing_actix_web::TracingLogger;
use uplink_config::shared::OnDemandConfig;

use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{ErrorKind, UplinkError, UplinkResult};
use crate::mechanism::base::Syncer;
use crate::uplink_error;

/// Mechanism that reports a sync event when an HTTP trigger arrives.
///
/// The trigger listener starts lazily on the first [`Syncer::sync`] call and answers
/// any method on the configured endpoint with `204 No Content`. Triggers arriving while
/// an event is already pending collapse into that pending event instead of queueing.
pub struct OnDemandSyncer {
    port: u16,
    endpoint: String,
    listener: Option<TriggerListener>,
}

/// Running state of the trigger listener.
struct TriggerListener {
    handle: ServerHandle,
    serve_task: JoinHandle<io::Result<()>>,
    trigger_rx: mpsc::Receiver<()>,
}

/// How a wait on the trigger listener ended.
enum WaitOutcome {
    Triggered,
    Shutdown,
    ListenerDied(UplinkError),
}

impl OnDemandSyncer {
    /// Creates an on-demand mechanism from its configuration.
    pub fn new(config: &OnDemandConfig) -> UplinkResult<Self> {
        config.validate().map_err(|err| {
            uplink_error!(
                ErrorKind::ConfigError,
                "Invalid on-demand mechanism configuration",
                detail = err.to_string(),
                source: err
            )
        })?;

        Ok(Self {
            port: config.port,
            endpoint: config.endpoint_segment().to_string(),
            listener: None,
        })
    }

    /// Binds the trigger listener and starts serving it in a background task.
    fn start_listener(&self) -> UplinkResult<TriggerListener> {
        // Capacity 1 makes the channel the pending-event slot: a failed send means an
        // event is already pending and the trigger can be dropped.
        let (trigger_tx, trigger_rx) = mpsc::channel(1);

        let address = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&address).map_err(|err| {
            uplink_error!(
                ErrorKind::MechanismError,
                "Failed to bind the on-demand trigger listener",
                detail = format!("address: {address}"),
                source: err
            )
        })?;

        let route = format!("/{}", self.endpoint);
        let server = HttpServer::new(move || {
            App::new()
                .wrap(TracingLogger::default())
                .app_data(web::Data::new(trigger_tx.clone()))
                .route(&route, web::route().to(handle_trigger))
        })
        .disable_signals()
        .workers(1)
        .listen(listener)
        .map_err(|err| {
            uplink_error!(
                ErrorKind::MechanismError,
                "Failed to start the on-demand trigger listener",
                source: err
            )
        })?
        .run();
        let handle = server.handle();
        let serve_task = tokio::spawn(server);

        Ok(TriggerListener {
            handle,
            serve_task,
            trigger_rx,
        })
    }
}

#[async_trait]
impl Syncer for OnDemandSyncer {
    fn name(&self) -> &'static str {
        "on-demand"
    }

    async fn sync(&mut self, shutdown: &ShutdownRx) -> UplinkResult<()> {
        if self.listener.is_none() {
            self.listener = Some(self.start_listener()?);
        }

        let listener = self
            .listener
            .as_mut()
            .expect("the listener was started above");

        let outcome = tokio::select! {
            received = listener.trigger_rx.recv() => match received {
                Some(()) => WaitOutcome::Triggered,
                None => WaitOutcome::ListenerDied(uplink_error!(
                    ErrorKind::MechanismError,
                    "The on-demand trigger channel closed unexpectedly"
                )),
            },
            result = &mut listener.serve_task => {
                WaitOutcome::ListenerDied(listener_death_error(result))
            }
            _ = shutdown.wait_for_shutdown() => WaitOutcome::Shutdown,
        };

        match outcome {
            WaitOutcome::Triggered | WaitOutcome::Shutdown => Ok(()),
            WaitOutcome::ListenerDied(err) => {
                // The serving task is gone, so there is nothing left to close.
                self.listener = None;
                Err(err)
            }
        }
    }

    async fn close(&mut self, deadline: Instant) -> UplinkResult<()> {
        let Some(listener) = self.listener.take() else {
            return Ok(());
        };

        tokio::select! {
            _ = listener.handle.stop(true) => {
                let _ = listener.serve_task.await;
            }
            _ = tokio::time::sleep_until(deadline) => {
                warn!("the trigger listener did not stop before the deadline, abandoning the drain");
            }
        }

        Ok(())
    }
}

/// Builds the error reported when the trigger listener dies on its own.
fn listener_death_error(result: Result<io::Result<()>, tokio::task::JoinError>) -> UplinkError {
    match result {
        Ok(Ok(())) => uplink_error!(
            ErrorKind::MechanismError,
            "The on-demand trigger listener stopped unexpectedly"
        ),
        Ok(Err(err)) => uplink_error!(
            ErrorKind::MechanismError,
            "The on-demand trigger listener failed while serving",
            source: err
        ),
        Err(err) => uplink_error!(
            ErrorKind::MechanismError,
            "The on-demand trigger listener task panicked",
            source: err
        ),
    }
}

/// Answers a trigger request after recording the sync event.
///
/// The trigger is acknowledged with `204 No Content` regardless of whether it started a
/// new pending event or collapsed into one already pending.
async fn handle_trigger(trigger_tx: web::Data<mpsc::Sender<()>>) -> HttpResponse {
    // A full slot means an event is already pending, so this trigger folds into it.
    let _ = trigger_tx.try_send(());

    HttpResponse::NoContent().finish()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use actix_web::http::StatusCode;

    use super::*;
    use crate::concurrency::shutdown::create_shutdown_channel;

    fn config(port: u16, endpoint: &str) -> OnDemandConfig {
        OnDemandConfig {
            port,
            endpoint: endpoint.to_string(),
        }
    }

    #[tokio::test]
    async fn construction_rejects_invalid_configurations() {
        assert!(OnDemandSyncer::new(&config(9090, "sync")).is_ok());
        assert!(OnDemandSyncer::new(&config(1024, "sync")).is_ok());

        for invalid in [
            config(1023, "sync"),
            config(0, "sync"),
            config(9090, ""),
            config(9090, "/"),
            config(9090, "a/b"),
        ] {
            assert_eq!(
                OnDemandSyncer::new(&invalid).err().map(|err| err.kind()),
                Some(ErrorKind::ConfigError),
                "expected rejection for port {} endpoint {:?}",
                invalid.port,
                invalid.endpoint
            );
        }
    }

    #[tokio::test]
    async fn endpoint_separators_are_trimmed() {
        let syncer = OnDemandSyncer::new(&config(9090, "/sync/")).unwrap();

        assert_eq!(syncer.endpoint, "sync");
    }

    #[tokio::test]
    async fn pending_triggers_coalesce_into_one_event() {
        let (trigger_tx, mut trigger_rx) = mpsc::channel(1);
        let trigger_tx = web::Data::new(trigger_tx);

        // Two triggers recorded while nothing drains the slot...
        let response = handle_trigger(trigger_tx.clone()).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = handle_trigger(trigger_tx.clone()).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        // ...collapse into a single pending event.
        trigger_rx.recv().await.unwrap();
        assert!(trigger_rx.try_recv().is_err());

        // Once the slot is drained the next trigger pends a fresh event.
        handle_trigger(trigger_tx).await;
        trigger_rx.recv().await.unwrap();
    }

    #[tokio::test]
    async fn close_without_a_started_listener_is_a_no_op() {
        let mut syncer = OnDemandSyncer::new(&config(9090, "sync")).unwrap();

        syncer
            .close(Instant::now() + Duration::from_secs(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn occupied_port_surfaces_on_the_first_sync() {
        let (_tx, rx) = create_shutdown_channel();
        let holder = TcpListener::bind("0.0.0.0:0").unwrap();
        let port = holder.local_addr().unwrap().port();

        let mut syncer = OnDemandSyncer::new(&config(port, "sync")).unwrap();

        let err = syncer.sync(&rx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MechanismError);
    }
}
