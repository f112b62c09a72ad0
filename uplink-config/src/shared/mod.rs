//! Shared configuration types for uplink services.

mod agent;
mod base;
mod log;
mod mechanism;
mod server;

pub use agent::{AgentConfig, ChunkConfig, SyncServerConfig};
pub use base::{ShutdownConfig, ValidationError};
pub use log::{LogConfig, LogFormat, LogLevel};
pub use mechanism::{IntervalConfig, MechanismConfig, OnDemandConfig};
pub use server::{ListenerConfig, ServerConfig};
