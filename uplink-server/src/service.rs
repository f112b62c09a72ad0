use async_trait::async_trait;
use tracing::info;
use uplink::transport::message::{SyncRequest, SyncResponse};
use uplink::transport::server::SyncService;

/// Sync handler that accepts every incoming batch.
///
/// Ingestion is not wired to a backing store yet, so data points are counted
/// and acknowledged without being persisted.
#[derive(Debug, Default)]
pub struct LoggingSyncService;

#[async_trait]
impl SyncService for LoggingSyncService {
    async fn sync(&self, request: SyncRequest) -> SyncResponse {
        info!(
            data_points = request.data_points.len(),
            "received sync request"
        );

        SyncResponse { failed: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sync_accepts_all_points() {
        let service = LoggingSyncService;

        let response = service
            .sync(SyncRequest {
                data_points: vec!["cpu=0.5".to_string(), "mem=0.7".to_string()],
            })
            .await;

        assert!(response.failed.is_empty());
    }
}
