use std::time::Duration;

use proto::{
    DfsError,
    storage_node::{REPLICATE_TO, ReplicateTo, ReplicateToResponse},
    types::{StorageNodeId, StorageNodeView},
};
use utilities::{
    http::HttpTransport,
    logger::{instrument, tracing},
};

/// Calls the coordinator makes on storage nodes.
#[derive(Clone, Debug)]
pub struct StorageNodeService {
    transport: HttpTransport,
}

impl StorageNodeService {
    pub fn new(timeout: Duration) -> Self {
        Self {
            transport: HttpTransport::new(timeout),
        }
    }

    /// Asks `source` to push its copy of `chunk_id` to `targets`. Returns the
    /// targets that acknowledged.
    #[instrument(name = "service_storage_node_replicate_to", skip(self, source, targets), fields(source = source.id, targets = targets.len()))]
    pub async fn replicate_to(
        &self,
        source: &StorageNodeView,
        chunk_id: &str,
        targets: Vec<StorageNodeView>,
    ) -> Result<Vec<StorageNodeId>, DfsError> {
        let request = ReplicateTo {
            chunk_id: chunk_id.to_owned(),
            targets,
        };
        let response: ReplicateToResponse = self
            .transport
            .post(&source.addrs(), REPLICATE_TO, &request)
            .await?;
        Ok(response.replicated)
    }
}
