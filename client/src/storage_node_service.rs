use std::time::Duration;

use proto::{
    DfsError,
    storage_node::{CHUNK, ChunkRequest, ChunkResponse, ReadChunk, WriteAck, WriteChunk},
    types::StorageNodeView,
};
use utilities::{
    http::HttpTransport,
    logger::{instrument, tracing},
};

/// Chunk traffic between a client and storage nodes.
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

    #[instrument(name = "service_storage_node_write_chunk", skip(self, node, request), fields(storage_node_id = node.id, chunk_id = %request.chunk_id))]
    pub async fn write_chunk(&self, node: &StorageNodeView, request: WriteChunk) -> Result<WriteAck, DfsError> {
        let response: ChunkResponse = self
            .transport
            .post(&node.addrs(), CHUNK, &ChunkRequest::Write(request))
            .await?;
        match response {
            ChunkResponse::Write(ack) => Ok(ack),
            ChunkResponse::Read(_) => Err(DfsError::protocol("write answered with chunk data")),
        }
    }

    #[instrument(name = "service_storage_node_read_chunk", skip(self, node), fields(storage_node_id = node.id))]
    pub async fn read_chunk(&self, node: &StorageNodeView, chunk_id: &str) -> Result<Vec<u8>, DfsError> {
        let request = ChunkRequest::Read(ReadChunk {
            chunk_id: chunk_id.to_owned(),
        });
        let response: ChunkResponse = self.transport.post(&node.addrs(), CHUNK, &request).await?;
        match response {
            ChunkResponse::Read(data) if data.chunk_id == chunk_id => Ok(data.bytes),
            ChunkResponse::Read(data) => Err(DfsError::protocol(format!(
                "asked for {chunk_id}, got {}",
                data.chunk_id
            ))),
            ChunkResponse::Write(_) => Err(DfsError::protocol("read answered with a write ack")),
        }
    }
}
