//! Sync client for submitting batches to the server.

use reqwest::Client;

use crate::error::UplinkResult;
use crate::transport::message::{SYNC_ENDPOINT, SyncRequest, SyncResponse};

/// Client side of the sync transport.
///
/// Construction only records the server address. The underlying connection pool dials
/// the server on the first request and redials transparently after connection loss, so
/// a restarting server does not require a new client. Dropping the client releases its
/// connections.
#[derive(Debug, Clone)]
pub struct TransportClient {
    client: Client,
    base_url: String,
}

impl TransportClient {
    /// Creates a client for the sync server reachable at `address`.
    ///
    /// The address is a bare `host:port` pair without a scheme.
    pub fn connect(address: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("http://{address}"),
        }
    }

    /// Submits one batch of data points and returns the indices the server rejected.
    ///
    /// The returned indices are relative to the submitted batch. Connection failures,
    /// error statuses, and undecodable responses all surface as errors.
    pub async fn send(&self, data_points: Vec<String>) -> UplinkResult<Vec<u32>> {
        let url = format!("{}{SYNC_ENDPOINT}", self.base_url);
        let request = SyncRequest { data_points };

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<SyncResponse>()
            .await?;

        Ok(response.failed)
    }
}
