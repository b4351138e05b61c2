use std::time::Duration;

use proto::{
    DfsError,
    coordinator::{
        APPEND_CHUNK, AppendChunkRequest, HEARTBEAT, HeartbeatRequest, HeartbeatResponse, REGISTER,
        RegisterRequest, RegisterResponse, STORAGE_NODES,
    },
    types::{StorageNodeId, StorageNodeView},
};
use utilities::{
    http::HttpTransport,
    logger::{instrument, trace, tracing},
};

/// Calls a storage node makes on the coordinator.
#[derive(Clone, Debug)]
pub struct CoordinatorService {
    coordinator_addrs: String,
    transport: HttpTransport,
}

impl CoordinatorService {
    pub fn new(coordinator_addrs: &str, timeout: Duration) -> Self {
        Self {
            coordinator_addrs: coordinator_addrs.trim_end_matches('/').to_owned(),
            transport: HttpTransport::new(timeout),
        }
    }

    #[instrument(name = "service_coordinator_register", skip(self))]
    pub async fn register(
        &self,
        host: &str,
        port: u16,
        previous_id: Option<StorageNodeId>,
    ) -> Result<StorageNodeId, DfsError> {
        let request = RegisterRequest {
            host: host.to_owned(),
            port,
            previous_id,
        };
        let response: RegisterResponse = self
            .transport
            .post(&self.coordinator_addrs, REGISTER, &request)
            .await?;
        Ok(response.storage_node_id)
    }

    #[instrument(name = "service_coordinator_heartbeat", skip(self, request), fields(storage_node_id = request.storage_node_id))]
    pub async fn heartbeat(&self, request: &HeartbeatRequest) -> Result<HeartbeatResponse, DfsError> {
        trace!(held_chunks = request.held_chunks.len(), "sending heartbeat");
        self.transport
            .post(&self.coordinator_addrs, HEARTBEAT, request)
            .await
    }

    pub async fn storage_nodes(&self) -> Result<Vec<StorageNodeView>, DfsError> {
        self.transport.get(&self.coordinator_addrs, STORAGE_NODES).await
    }

    #[instrument(name = "service_coordinator_append_chunk", skip(self, request), fields(chunk_id = %request.chunk_id))]
    pub async fn append_chunk(&self, request: &AppendChunkRequest) -> Result<(), DfsError> {
        self.transport
            .post(&self.coordinator_addrs, APPEND_CHUNK, request)
            .await
    }
}
