//! Sync server wrapper around an HTTP listener.
//!
//! Manages the full lifecycle of the receiving side of the sync protocol: eager port
//! binding at construction, serving until shutdown, and deadline-bounded teardown.

use std::io;
use std::net::TcpListener;
use std::sync::Arc;

use actix_web::dev::{Server, ServerHandle};
use actix_web::{App, HttpResponse, HttpServer, web};
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::warn;
use tracing_actix_web::TracingLogger;

use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{ErrorKind, UplinkResult};
use crate::transport::message::{SYNC_ENDPOINT, SyncRequest, SyncResponse};
use crate::{bail, uplink_error};

/// Handler invoked for every sync batch received by a [`TransportServer`].
///
/// Implementations report per-point failures through the response rather than through
/// errors: a request is always answered, and the indices of rejected data points are
/// returned so the sender can log them.
#[async_trait]
pub trait SyncService: Send + Sync + 'static {
    /// Processes one batch of data points and reports which of them were rejected.
    async fn sync(&self, request: SyncRequest) -> SyncResponse;
}

/// Sync server wrapper.
///
/// The listener is bound eagerly when the server is built, so configuration errors like
/// an occupied port surface at construction time, but no connection is accepted until
/// [`TransportServer::listen`] runs. Teardown via [`TransportServer::close`] drains
/// in-flight requests, bounded by the drain timeout given at construction and by the
/// caller's deadline.
pub struct TransportServer {
    port: u16,
    server: Option<Server>,
    handle: ServerHandle,
    serve_task: Option<JoinHandle<io::Result<()>>>,
}

// Manual impl because `actix_web::dev::Server` does not implement `Debug`.
impl std::fmt::Debug for TransportServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportServer")
            .field("port", &self.port)
            .field("handle", &self.handle)
            .field("serve_task", &self.serve_task)
            .finish_non_exhaustive()
    }
}

impl TransportServer {
    /// Builds the sync server and binds its listener.
    ///
    /// `drain_timeout_secs` caps how long the workers keep draining in-flight requests
    /// after a stop is requested, so a slow peer cannot hold its connection open past
    /// that budget.
    pub fn new(
        host: &str,
        port: u16,
        drain_timeout_secs: u64,
        service: Arc<dyn SyncService>,
    ) -> UplinkResult<Self> {
        let address = format!("{host}:{port}");
        let listener = TcpListener::bind(&address).map_err(|err| {
            uplink_error!(
                ErrorKind::TransportError,
                "Failed to bind the sync server listener",
                detail = format!("address: {address}"),
                source: err
            )
        })?;
        let port = listener
            .local_addr()
            .map_err(|err| {
                uplink_error!(
                    ErrorKind::TransportError,
                    "Failed to read the sync server listener address",
                    source: err
                )
            })?
            .port();

        let service = web::Data::from(service);
        let server = HttpServer::new(move || {
            App::new()
                .wrap(TracingLogger::default())
                .app_data(service.clone())
                .route(SYNC_ENDPOINT, web::post().to(handle_sync))
        })
        .disable_signals()
        .shutdown_timeout(drain_timeout_secs)
        .listen(listener)
        .map_err(|err| {
            uplink_error!(
                ErrorKind::TransportError,
                "Failed to start the sync server",
                source: err
            )
        })?
        .run();
        let handle = server.handle();

        Ok(Self {
            port,
            server: Some(server),
            handle,
            serve_task: None,
        })
    }

    /// Returns the port the server is listening on.
    ///
    /// Useful when the server was configured with port 0 to bind a random free port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serves sync requests until shutdown is signaled.
    ///
    /// Returns `Ok(())` once the shutdown signal terminates the wait. The server dying
    /// on its own is reported as an error, since without a listener the process serves
    /// no purpose anymore.
    pub async fn listen(&mut self, shutdown: &ShutdownRx) -> UplinkResult<()> {
        let Some(server) = self.server.take() else {
            bail!(
                ErrorKind::TransportError,
                "The sync server is already listening"
            );
        };

        // The serving task is stored before the wait so `close` can still stop it when
        // this future is dropped mid-wait by a caller's select.
        let serve_task = self.serve_task.insert(tokio::spawn(server));

        let outcome = tokio::select! {
            _ = shutdown.wait_for_shutdown() => None,
            result = serve_task => Some(result),
        };

        match outcome {
            None => Ok(()),
            Some(result) => {
                self.serve_task = None;

                match result {
                    Ok(Ok(())) => {
                        bail!(
                            ErrorKind::TransportError,
                            "The sync server stopped unexpectedly"
                        )
                    }
                    Ok(Err(err)) => Err(uplink_error!(
                        ErrorKind::TransportError,
                        "The sync server failed while serving",
                        source: err
                    )),
                    Err(err) => Err(uplink_error!(
                        ErrorKind::TransportError,
                        "The sync server task panicked",
                        source: err
                    )),
                }
            }
        }
    }

    /// Stops the server, preferring a graceful drain within the deadline.
    ///
    /// In-flight requests are given until the drain timeout configured at construction
    /// to complete, after which the workers drop the remaining connections. Should even
    /// that overrun `deadline`, the rest of the teardown is abandoned to finish in the
    /// background so the caller gets control back on time.
    pub async fn close(&mut self, deadline: Instant) -> UplinkResult<()> {
        // When `listen` never ran, the server future holds the only listener reference,
        // so dropping it is enough to release the port.
        if self.server.take().is_some() {
            return Ok(());
        }

        let Some(serve_task) = self.serve_task.take() else {
            return Ok(());
        };

        tokio::select! {
            _ = self.handle.stop(true) => {
                let _ = serve_task.await;
            }
            _ = tokio::time::sleep_until(deadline) => {
                warn!("the sync server did not stop before the deadline, abandoning the drain");
            }
        }

        Ok(())
    }
}

/// Forwards one sync batch to the installed [`SyncService`].
async fn handle_sync(
    service: web::Data<dyn SyncService>,
    request: web::Json<SyncRequest>,
) -> HttpResponse {
    let response = service.sync(request.into_inner()).await;

    HttpResponse::Ok().json(response)
}
