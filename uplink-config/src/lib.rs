//! Configuration loading and shared configuration types for uplink services.

pub mod load;
pub mod shared;

pub use load::{LoadConfigError, load_config_from_file, load_config_with_defaults};
