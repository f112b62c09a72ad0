use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A field value violates its documented constraint.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
}

/// Shutdown sequencing configuration shared by all uplink services.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ShutdownConfig {
    /// Seconds granted to the shutdown sequence before teardown is forced.
    ///
    /// Default: 30
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

impl ShutdownConfig {
    /// Default shutdown deadline: 30 seconds.
    pub const DEFAULT_DEADLINE_SECS: u64 = 30;

    /// Validates the shutdown configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.deadline_secs == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "deadline_secs".to_string(),
                constraint: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            deadline_secs: Self::DEFAULT_DEADLINE_SECS,
        }
    }
}

fn default_deadline_secs() -> u64 {
    ShutdownConfig::DEFAULT_DEADLINE_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ShutdownConfig::default();
        assert_eq!(config.deadline_secs, 30);
    }

    #[test]
    fn test_validate_zero_deadline() {
        let config = ShutdownConfig { deadline_secs: 0 };
        assert!(config.validate().is_err());
    }
}
