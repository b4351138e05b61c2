use std::time::Duration;

use proto::{
    DfsError,
    storage_node::{REPLICATE, ReplicateChunk},
    types::StorageNodeView,
};
use utilities::{
    http::HttpTransport,
    logger::{instrument, tracing},
};

/// Calls a storage node makes on its peers.
#[derive(Clone, Debug)]
pub struct PeerService {
    transport: HttpTransport,
}

impl PeerService {
    pub fn new(timeout: Duration) -> Self {
        Self {
            transport: HttpTransport::new(timeout),
        }
    }

    #[instrument(name = "service_peer_replicate", skip(self, peer, request), fields(peer = peer.id, chunk_id = %request.chunk_id))]
    pub async fn replicate(&self, peer: &StorageNodeView, request: &ReplicateChunk) -> Result<(), DfsError> {
        self.transport.post(&peer.addrs(), REPLICATE, request).await
    }
}
