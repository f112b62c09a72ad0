//! Tracing initialization for uplink services.
//!
//! Output routing and formatting are driven entirely by [`LogConfig`], so every
//! binary wires its logging from the same configuration it validates at
//! startup. The `RUST_LOG` environment variable still overrides the configured
//! level when set.

use std::io::{stderr, stdout};
use std::sync::Once;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    filter::{FilterExt, LevelFilter, filter_fn},
    fmt,
    fmt::writer::MakeWriter,
    layer::{Filter, SubscriberExt},
    util::{SubscriberInitExt, TryInitError},
};
use uplink_config::shared::{LogConfig, LogFormat};

/// Errors that can occur while installing the tracing stack.
#[derive(Debug, Error)]
pub enum TracingSetupError {
    /// A global subscriber is already installed.
    #[error("failed to install the tracing subscriber: {0}")]
    Install(#[from] TryInitError),
}

/// Guard that keeps the non-blocking log writers alive.
///
/// Dropping the flusher drains any buffered log lines, so binaries hold onto it
/// until the very end of `main`.
#[derive(Debug)]
pub struct LogFlusher {
    _guards: Vec<WorkerGuard>,
}

/// Initializes the global tracing subscriber for a service.
///
/// When `errors_to_stderr` is enabled, warnings and errors go to stderr while
/// lower levels go to stdout. Otherwise everything goes to stdout.
pub fn init_tracing(service: &str, config: &LogConfig) -> Result<LogFlusher, TracingSetupError> {
    let mut guards = Vec::new();
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(stdout());
    guards.push(stdout_guard);

    if config.errors_to_stderr {
        let (stderr_writer, stderr_guard) = tracing_appender::non_blocking(stderr());
        guards.push(stderr_guard);

        layers.push(output_layer(
            config,
            stdout_writer,
            env_filter(config).and(filter_fn(|metadata| *metadata.level() > LevelFilter::WARN)),
        ));
        layers.push(output_layer(
            config,
            stderr_writer,
            env_filter(config).and(filter_fn(|metadata| *metadata.level() <= LevelFilter::WARN)),
        ));
    } else {
        layers.push(output_layer(config, stdout_writer, env_filter(config)));
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    tracing::info!(service, "tracing initialized");

    Ok(LogFlusher { _guards: guards })
}

/// Initializes tracing for tests, capturing output per test.
///
/// Safe to call from every test. Only the first call in a process installs the
/// subscriber.
pub fn init_test_tracing() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        tracing_subscriber::registry()
            .with(fmt::layer().with_test_writer().with_filter(filter))
            .init();
    });
}

// EnvFilter is not Clone, so each output layer builds its own.
fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.as_str()))
}

fn output_layer<W, F>(
    config: &LogConfig,
    writer: W,
    filter: F,
) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    F: Filter<Registry> + Send + Sync + 'static,
{
    match config.format {
        LogFormat::Human => fmt::layer()
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
    }
}
