use serde::{Deserialize, Serialize};

/// Logging configuration shared by all uplink services.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LogConfig {
    /// Minimum level that is emitted.
    ///
    /// Default: info
    #[serde(default)]
    pub level: LogLevel,
    /// Output format.
    ///
    /// Default: human
    #[serde(default)]
    pub format: LogFormat,
    /// Routes warnings and errors to stderr instead of stdout.
    ///
    /// Default: true
    #[serde(default = "default_errors_to_stderr")]
    pub errors_to_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            errors_to_stderr: default_errors_to_stderr(),
        }
    }
}

fn default_errors_to_stderr() -> bool {
    true
}

/// Minimum log level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the level as a filter directive.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}
