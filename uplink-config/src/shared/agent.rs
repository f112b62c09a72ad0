use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::shared::{LogConfig, MechanismConfig, ShutdownConfig, ValidationError};

/// Top-level configuration for the uplink agent.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AgentConfig {
    /// File the host metrics collector spools data points into.
    ///
    /// Default: /etc/uplink/metrics.out
    #[serde(default = "default_spool_file")]
    pub spool_file: PathBuf,
    /// Sync server the agent uploads to.
    #[serde(default)]
    pub server: SyncServerConfig,
    /// Upload chunking. Absent means every sync sends all points in one
    /// request.
    #[serde(default)]
    pub chunk: Option<ChunkConfig>,
    /// Mechanisms that decide when syncs happen.
    #[serde(default)]
    pub mechanism: MechanismConfig,
    /// Shutdown sequencing.
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    /// Logging.
    #[serde(default)]
    pub log: LogConfig,
}

impl AgentConfig {
    /// Default spool file path.
    pub const DEFAULT_SPOOL_FILE: &'static str = "/etc/uplink/metrics.out";

    /// Validates the agent configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(chunk) = &self.chunk {
            chunk.validate()?;
        }
        self.mechanism.validate()?;
        self.shutdown.validate()?;

        Ok(())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            spool_file: default_spool_file(),
            server: SyncServerConfig::default(),
            chunk: None,
            mechanism: MechanismConfig::default(),
            shutdown: ShutdownConfig::default(),
            log: LogConfig::default(),
        }
    }
}

fn default_spool_file() -> PathBuf {
    PathBuf::from(AgentConfig::DEFAULT_SPOOL_FILE)
}

/// Sync server endpoint configuration.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SyncServerConfig {
    /// Host and port of the sync server.
    ///
    /// Default: 127.0.0.1:8000
    #[serde(default = "default_address")]
    pub address: String,
}

impl SyncServerConfig {
    /// Default sync server address.
    pub const DEFAULT_ADDRESS: &'static str = "127.0.0.1:8000";
}

impl Default for SyncServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

fn default_address() -> String {
    SyncServerConfig::DEFAULT_ADDRESS.to_string()
}

/// Upload chunking configuration.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct ChunkConfig {
    /// Maximum number of data points sent per sync request.
    pub max_points_per_sync: usize,
}

impl ChunkConfig {
    /// Validates the chunk configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_points_per_sync == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "max_points_per_sync".to_string(),
                constraint: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
