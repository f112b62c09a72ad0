//! Uplink server binary.
//!
//! Serves the sync endpoint that uplink agents upload their spooled host
//! metrics to. Includes telemetry, error handling, and graceful shutdown
//! capabilities.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use tokio::signal::unix::{SignalKind, signal};
use tokio::time::{Duration, Instant, timeout_at};
use tracing::{error, info, warn};
use uplink::concurrency::shutdown::create_shutdown_channel;
use uplink::transport::server::TransportServer;
use uplink_config::load_config_with_defaults;
use uplink_config::shared::ServerConfig;
use uplink_telemetry::tracing::init_tracing;

use crate::service::LoggingSyncService;

mod service;

/// Command line arguments for the uplink server.
#[derive(Debug, Parser)]
#[command(
    name = "uplink-server",
    version,
    about = "Receives spooled host metrics from uplink agents"
)]
struct AppArgs {
    /// Location of the server configuration file.
    #[arg(long, default_value = "/etc/uplink/server.yaml")]
    config: PathBuf,
}

/// Entry point for the server.
///
/// Loads and validates configuration, initializes tracing, starts the async
/// runtime, and serves the sync endpoint until a shutdown signal or a fatal
/// server error.
fn main() -> anyhow::Result<()> {
    let args = AppArgs::parse();

    let config: ServerConfig = load_config_with_defaults(&args.config).with_context(|| {
        format!(
            "failed to load the server configuration from {}",
            args.config.display()
        )
    })?;
    config.validate().context("invalid server configuration")?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"), &config.log)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(config))?;

    Ok(())
}

async fn async_main(config: ServerConfig) -> anyhow::Result<()> {
    let mut server = TransportServer::new(
        &config.listener.host,
        config.listener.port,
        config.shutdown.deadline_secs,
        Arc::new(LoggingSyncService),
    )
    .context("failed to create the sync server")?;
    let port = server.port();

    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

    let mut server_task = tokio::spawn(async move {
        let result = server.listen(&shutdown_rx).await;
        (server, result)
    });

    info!(host = %config.listener.host, port, "server listening");

    // Listen for SIGTERM, sent by the service manager before SIGKILL during
    // unit termination.
    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to register the SIGTERM handler")?;

    let finished_early = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("sigint (ctrl+c) received, shutting down the server");
            None
        }
        _ = sigterm.recv() => {
            info!("sigterm received, shutting down the server");
            None
        }
        result = &mut server_task => Some(result),
    };

    if let Err(error) = shutdown_tx.shutdown() {
        warn!(error = ?error, "failed to send the shutdown signal");
    }

    // The deadline covers the whole shutdown sequence and is never extended.
    let deadline = Instant::now() + Duration::from_secs(config.shutdown.deadline_secs);

    let joined = match finished_early {
        Some(result) => result,
        None => match timeout_at(deadline, &mut server_task).await {
            Ok(result) => result,
            Err(_) => {
                server_task.abort();
                bail!("the sync server did not stop before the shutdown deadline");
            }
        },
    };

    let mut fatal = false;

    match joined {
        Ok((mut server, result)) => {
            match result {
                Ok(()) => info!("the sync server stopped listening"),
                Err(error) => {
                    error!(error = %error, "fatal sync server error occurred");
                    fatal = true;
                }
            }

            if let Err(error) = server.close(deadline).await {
                error!(error = %error, "error during server cleanup process");
            }
        }
        Err(error) => {
            error!(error = %error, "the sync server task failed");
            fatal = true;
        }
    }

    if fatal {
        bail!("the uplink server terminated after a fatal error");
    }

    info!("uplink server shutdown successfully");

    Ok(())
}
