//! Wire types shared between the sync client and server.

use serde::{Deserialize, Serialize};

/// Path of the sync endpoint exposed by the server.
pub const SYNC_ENDPOINT: &str = "/sync";

/// One batch of data points submitted by an agent.
///
/// Each data point is an opaque line lifted from the agent's spool file. The server
/// receives them in file order within a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub data_points: Vec<String>,
}

/// Server verdict for one sync batch.
///
/// Contains the zero-based indices, relative to the request batch, of the data points
/// the server rejected. An empty list means the whole batch was accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResponse {
    pub failed: Vec<u32>,
}
