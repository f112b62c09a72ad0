use std::path::{Path, PathBuf};

use config::builder::{ConfigBuilder, DefaultState};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "UPLINK";

/// Separator between the environment variable prefix and key segments.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested configuration keys in environment variables.
const ENV_SEPARATOR: &str = "__";

/// Errors that can occur while loading configuration files and overrides.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    /// The configuration file does not exist.
    #[error("configuration file `{0}` does not exist")]
    ConfigurationFileMissing(PathBuf),

    /// A configuration file existed but could not be parsed.
    #[error("failed to load configuration from `{path}`: {source}")]
    ConfigurationFileLoad {
        path: PathBuf,
        source: config::ConfigError,
    },

    /// Environment variable overrides failed to merge into the configuration.
    #[error("failed to load configuration from environment variables: {0}")]
    EnvironmentVariables(#[source] config::ConfigError),

    /// The configuration sources were read but deserialization failed.
    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] config::ConfigError),
}

/// Loads configuration from the given file with environment variable overrides.
///
/// The file must exist. Overrides come from `UPLINK_`-prefixed environment variables,
/// with double underscores separating nested keys (`UPLINK_SERVER__ADDRESS`).
pub fn load_config_from_file<T>(path: &Path) -> Result<T, LoadConfigError>
where
    T: DeserializeOwned,
{
    if !path.is_file() {
        return Err(LoadConfigError::ConfigurationFileMissing(
            path.to_path_buf(),
        ));
    }

    let builder = config::Config::builder().add_source(config::File::from(path.to_path_buf()));
    validate_file_source(&builder, path)?;

    deserialize_with_env_overrides(builder)
}

/// Loads configuration from the given file when it exists, falling back to defaults.
///
/// A missing file is not an error here: the configuration is then built from serde
/// defaults and `UPLINK_`-prefixed environment variable overrides alone.
pub fn load_config_with_defaults<T>(path: &Path) -> Result<T, LoadConfigError>
where
    T: DeserializeOwned,
{
    let mut builder = config::Config::builder();

    if path.is_file() {
        builder = builder.add_source(config::File::from(path.to_path_buf()));
        validate_file_source(&builder, path)?;
    }

    deserialize_with_env_overrides(builder)
}

/// Applies environment variable overrides and deserializes the merged configuration.
fn deserialize_with_env_overrides<T>(
    builder: ConfigBuilder<DefaultState>,
) -> Result<T, LoadConfigError>
where
    T: DeserializeOwned,
{
    let environment_source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR);

    let settings = builder
        .add_source(environment_source)
        .build()
        .map_err(LoadConfigError::EnvironmentVariables)?;

    settings
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

/// Confirms the file source parses on its own so errors are attributed to the file.
fn validate_file_source(
    builder: &ConfigBuilder<DefaultState>,
    path: &Path,
) -> Result<(), LoadConfigError> {
    builder
        .clone()
        .build()
        .map_err(|source| LoadConfigError::ConfigurationFileLoad {
            path: path.to_path_buf(),
            source,
        })
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct SampleConfig {
        name: String,
        #[serde(default = "default_retries")]
        retries: u32,
    }

    fn default_retries() -> u32 {
        3
    }

    #[derive(Debug, Default, Deserialize)]
    struct DefaultableConfig {
        #[serde(default = "default_retries")]
        retries: u32,
    }

    #[derive(Debug, Deserialize)]
    struct EnvOverrideConfig {
        name: String,
        shards: u32,
    }

    fn temp_config_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn file_values_and_field_defaults_are_merged() {
        let file = temp_config_file("name: spool-sync\n");

        let config = load_config_from_file::<SampleConfig>(file.path()).unwrap();

        assert_eq!(config.name, "spool-sync");
        assert_eq!(config.retries, 3);
    }

    #[test]
    fn missing_file_is_an_error_when_required() {
        let dir = tempfile::tempdir().unwrap();

        let result = load_config_from_file::<SampleConfig>(&dir.path().join("absent.yaml"));

        assert!(matches!(
            result,
            Err(LoadConfigError::ConfigurationFileMissing(_))
        ));
    }

    #[test]
    fn malformed_file_reports_the_offending_path() {
        let file = temp_config_file("name: [unclosed\n");

        let result = load_config_from_file::<SampleConfig>(file.path());

        assert!(matches!(
            result,
            Err(LoadConfigError::ConfigurationFileLoad { .. })
        ));
    }

    #[test]
    fn environment_variables_override_file_values() {
        let file = temp_config_file("name: spool-sync\nshards: 2\n");

        // Environment mutation is process-wide; this test owns the variable
        // name, so parallel tests cannot observe it.
        unsafe { std::env::set_var("UPLINK_SHARDS", "8") };
        let config = load_config_from_file::<EnvOverrideConfig>(file.path());
        unsafe { std::env::remove_var("UPLINK_SHARDS") };

        let config = config.unwrap();
        assert_eq!(config.name, "spool-sync");
        assert_eq!(config.shards, 8);
    }

    #[test]
    fn missing_file_falls_back_to_defaults_when_optional() {
        let dir = tempfile::tempdir().unwrap();

        let config =
            load_config_with_defaults::<DefaultableConfig>(&dir.path().join("absent.yaml"))
                .unwrap();

        assert_eq!(config.retries, 3);
    }
}
