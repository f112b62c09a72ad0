//! Sync mechanisms and their orchestration.
//!
//! A mechanism decides when the agent should sync with the server. The [`base`] module
//! defines the contract, [`interval`] and [`demand`] provide the built-in
//! implementations, and [`runner`] drives every configured mechanism from a dedicated
//! worker.

pub mod base;
pub mod demand;
pub mod interval;
pub mod runner;
