//! Concurrency utilities for coordinating sync mechanisms.
//!
//! This module provides the concurrency primitives used throughout the uplink system to
//! coordinate mechanism workers, serialize sync execution, and handle graceful shutdown.
//!
//! ## Graceful Shutdown
//!
//! The [`shutdown`] module implements a broadcast-based shutdown pattern where a single
//! signal terminates every worker simultaneously, including receivers that subscribe or
//! begin waiting after the signal fired.
//!
//! ## Sync Serialization
//!
//! The [`mutex`] module guarantees at most one sync transfer is in flight at any time.
//! Mechanisms that find the lock taken queue behind the holder, and waiters are
//! released empty-handed once shutdown is signaled.

pub mod mutex;
pub mod shutdown;
