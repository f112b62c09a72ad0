use serde::{Deserialize, Serialize};

use crate::shared::{LogConfig, ShutdownConfig, ValidationError};

/// Top-level configuration for the uplink sync server.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Listener the sync endpoint is served on.
    #[serde(default)]
    pub listener: ListenerConfig,
    /// Shutdown sequencing.
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    /// Logging.
    #[serde(default)]
    pub log: LogConfig,
}

impl ServerConfig {
    /// Validates the server configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.shutdown.validate()?;

        Ok(())
    }
}

/// Listener address configuration.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ListenerConfig {
    /// Host the sync endpoint binds on.
    ///
    /// Default: 127.0.0.1
    #[serde(default = "default_host")]
    pub host: String,
    /// Port the sync endpoint binds on.
    ///
    /// Default: 8000
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ListenerConfig {
    /// Default listener host.
    pub const DEFAULT_HOST: &'static str = "127.0.0.1";
    /// Default listener port.
    pub const DEFAULT_PORT: u16 = 8000;
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    ListenerConfig::DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    ListenerConfig::DEFAULT_PORT
}
