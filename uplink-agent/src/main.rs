//! Uplink agent binary.
//!
//! Runs the sync mechanisms that decide when spooled host metrics are uploaded
//! to the uplink server. Includes telemetry, error handling, and graceful
//! shutdown capabilities.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use tokio::signal::unix::{SignalKind, signal};
use tokio::time::{Duration, Instant, timeout_at};
use tracing::{error, info, warn};
use uplink::concurrency::shutdown::create_shutdown_channel;
use uplink::executor::SyncExecutor;
use uplink::mechanism::runner::MechanismRunner;
use uplink::transport::client::TransportClient;
use uplink_config::load_config_from_file;
use uplink_config::shared::AgentConfig;
use uplink_telemetry::tracing::init_tracing;

/// Command line arguments for the uplink agent.
#[derive(Debug, Parser)]
#[command(
    name = "uplink-agent",
    version,
    about = "Syncs spooled host metrics to an uplink server"
)]
struct AppArgs {
    /// Location of the agent configuration file.
    #[arg(long, default_value = "/etc/uplink/config.yaml")]
    config: PathBuf,
}

/// Entry point for the agent.
///
/// Loads and validates configuration, initializes tracing, starts the async
/// runtime, and runs the sync mechanisms until a shutdown signal or a fatal
/// orchestration error.
fn main() -> anyhow::Result<()> {
    let args = AppArgs::parse();

    let config: AgentConfig = load_config_from_file(&args.config).with_context(|| {
        format!(
            "failed to load the agent configuration from {}",
            args.config.display()
        )
    })?;
    config.validate().context("invalid agent configuration")?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"), &config.log)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(config))?;

    Ok(())
}

async fn async_main(config: AgentConfig) -> anyhow::Result<()> {
    info!(
        spool_file = %config.spool_file.display(),
        server = %config.server.address,
        "starting uplink agent"
    );

    let transport = TransportClient::connect(&config.server.address);
    let executor = Arc::new(
        SyncExecutor::new(
            transport,
            config.spool_file.clone(),
            config.chunk.map(|chunk| chunk.max_points_per_sync),
        )
        .await
        .context("failed to initialize the sync executor")?,
    );

    let mut runner = MechanismRunner::new(config.mechanism.clone(), executor.clone());
    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

    let mut runner_task = tokio::spawn(async move {
        let result = runner.run_all(shutdown_rx).await;
        (runner, result)
    });

    // Listen for SIGTERM, sent by the service manager before SIGKILL during
    // unit termination.
    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to register the SIGTERM handler")?;

    let finished_early = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("sigint (ctrl+c) received, shutting down the agent");
            None
        }
        _ = sigterm.recv() => {
            info!("sigterm received, shutting down the agent");
            None
        }
        result = &mut runner_task => Some(result),
    };

    if let Err(error) = shutdown_tx.shutdown() {
        warn!(error = ?error, "failed to send the shutdown signal");
    }

    // The deadline covers the whole shutdown sequence and is never extended.
    let deadline = Instant::now() + Duration::from_secs(config.shutdown.deadline_secs);

    let joined = match finished_early {
        Some(result) => result,
        None => match timeout_at(deadline, &mut runner_task).await {
            Ok(result) => result,
            Err(_) => {
                runner_task.abort();
                executor.close().await;
                bail!("the mechanism workers did not stop before the shutdown deadline");
            }
        },
    };

    let mut fatal = false;

    match joined {
        Ok((mut runner, result)) => {
            match result {
                Ok(()) => info!("all mechanism workers stopped"),
                Err(error) => {
                    error!(error = %error, "fatal mechanism orchestration error occurred");
                    fatal = true;
                }
            }

            if let Err(error) = runner.close(deadline).await {
                error!(error = %error, "error during agent cleanup process");
            }
        }
        Err(error) => {
            error!(error = %error, "the mechanism orchestration task failed");
            fatal = true;
        }
    }

    executor.close().await;

    if fatal {
        bail!("the uplink agent terminated after a fatal error");
    }

    info!("uplink agent shutdown successfully");

    Ok(())
}
