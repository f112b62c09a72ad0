//! Core library for the uplink metrics forwarding system.
//!
//! An uplink agent watches a spool file of metrics data points and ships its contents
//! to a central sync server. The [`mechanism`] module decides when a sync happens, the
//! [`executor`] module performs the transfer, and the [`transport`] module carries the
//! batches over HTTP. The [`concurrency`] module holds the shutdown and serialization
//! primitives shared by all of them.

pub mod concurrency;
pub mod error;
pub mod executor;
pub mod mechanism;
pub mod transport;

mod macros;
