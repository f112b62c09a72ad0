use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Sync mechanism configuration.
///
/// Each field enables one mechanism. At least one must be set for an agent to
/// have anything to do, which is enforced when the mechanisms are started
/// rather than here, so that partially assembled configurations can still be
/// validated.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct MechanismConfig {
    /// Periodic sync mechanism. Disabled when absent.
    #[serde(default)]
    pub interval: Option<IntervalConfig>,
    /// HTTP-triggered sync mechanism. Disabled when absent.
    #[serde(default)]
    pub on_demand: Option<OnDemandConfig>,
}

impl MechanismConfig {
    /// Validates every configured mechanism.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(interval) = &self.interval {
            interval.validate()?;
        }
        if let Some(on_demand) = &self.on_demand {
            on_demand.validate()?;
        }

        Ok(())
    }
}

/// Periodic sync mechanism configuration.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct IntervalConfig {
    /// Seconds between consecutive sync events.
    ///
    /// Must be greater than 5. Default: 60
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
}

impl IntervalConfig {
    /// Default sync period: 60 seconds.
    pub const DEFAULT_DURATION_SECS: u64 = 60;
    /// Periods at or below this many seconds are rejected.
    pub const MIN_DURATION_SECS: u64 = 5;

    /// Validates the interval configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.duration_secs <= Self::MIN_DURATION_SECS {
            return Err(ValidationError::InvalidFieldValue {
                field: "duration_secs".to_string(),
                constraint: "must be greater than 5 seconds".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            duration_secs: Self::DEFAULT_DURATION_SECS,
        }
    }
}

fn default_duration_secs() -> u64 {
    IntervalConfig::DEFAULT_DURATION_SECS
}

/// HTTP-triggered sync mechanism configuration.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OnDemandConfig {
    /// Port the trigger listener binds on.
    ///
    /// Must be above the well-known range (1023). Default: 8000
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path segment the trigger endpoint is served under.
    ///
    /// Leading and trailing slashes are ignored. Default: "sync"
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl OnDemandConfig {
    /// Default trigger listener port: 8000.
    pub const DEFAULT_PORT: u16 = 8000;
    /// Lowest port the trigger listener may bind on.
    pub const MIN_PORT: u16 = 1024;
    /// Default trigger endpoint segment.
    pub const DEFAULT_ENDPOINT: &'static str = "sync";

    /// Returns the endpoint with surrounding slashes stripped.
    pub fn endpoint_segment(&self) -> &str {
        let segment = self.endpoint.as_str();
        let segment = segment.strip_prefix('/').unwrap_or(segment);
        segment.strip_suffix('/').unwrap_or(segment)
    }

    /// Validates the on-demand configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port < Self::MIN_PORT {
            return Err(ValidationError::InvalidFieldValue {
                field: "port".to_string(),
                constraint: "must be above the well-known port range (1023)".to_string(),
            });
        }

        let segment = self.endpoint_segment();
        if segment.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "endpoint".to_string(),
                constraint: "cannot be empty".to_string(),
            });
        }
        if segment.contains('/') {
            return Err(ValidationError::InvalidFieldValue {
                field: "endpoint".to_string(),
                constraint: "must be a single path segment".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for OnDemandConfig {
    fn default() -> Self {
        Self {
            port: Self::DEFAULT_PORT,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
        }
    }
}

fn default_port() -> u16 {
    OnDemandConfig::DEFAULT_PORT
}

fn default_endpoint() -> String {
    OnDemandConfig::DEFAULT_ENDPOINT.to_string()
}
