//! Telemetry utilities for uplink services.

pub mod tracing;
