//! HTTP transport for exchanging sync batches between agent and server.
//!
//! The [`server`] module hosts the receiving side and the [`client`] module the sending
//! side of the sync protocol, with the wire types shared through [`message`].

pub mod client;
pub mod message;
pub mod server;
