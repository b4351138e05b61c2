use std::{
    sync::Arc,
    time::{Duration, UNIX_EPOCH},
};

use futures::future::join_all;
use proto::{
    DfsError,
    coordinator::{AppendChunkRequest, HeartbeatRequest},
    storage_node::{
        ChunkData, NodeStatusResponse, ReplicateChunk, ReplicateTo, ReplicateToResponse, WriteAck,
        WriteChunk, WriteState,
    },
    types::{HealthReport, NodeStatus, StorageNodeId, StorageNodeView},
};
use storage::{BlockStore, validate_chunk_id};
use tokio::sync::{Mutex, RwLock};
use utilities::logger::{debug, error, info, instrument, trace, tracing, warn};

use crate::{
    config::Config, coordinator::service::CoordinatorService, peer::service::PeerService,
};

/// How a storage node reaches the cluster and how it advertises itself.
#[derive(Clone, Debug)]
pub struct StorageNodeOptions {
    pub coordinator_addrs: String,
    pub advertise_host: String,
    pub advertise_port: u16,
    pub replication_factor: usize,
    pub request_timeout: Duration,
}

impl From<&Config> for StorageNodeOptions {
    fn from(config: &Config) -> Self {
        StorageNodeOptions {
            coordinator_addrs: config.coordinator_addrs.clone(),
            advertise_host: config.advertise_host.clone(),
            advertise_port: config.advertise_port,
            replication_factor: config.replication_factor,
            request_timeout: config.request_timeout(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Identity {
    current: Option<StorageNodeId>,
    // kept after the coordinator forgot us so the same id can be asked back
    previous: Option<StorageNodeId>,
}

/// A storage node: a block store plus the protocol around it.
pub struct StorageNode {
    store: Arc<dyn BlockStore>,
    coordinator: CoordinatorService,
    peers: PeerService,
    identity: RwLock<Identity>,
    health: Mutex<HealthReport>,
    options: StorageNodeOptions,
}

/// Peers that receive copies of a chunk written on `self_id`: the active nodes
/// in cyclic id order starting after `self_id`.
pub fn select_peers(
    self_id: StorageNodeId,
    nodes: &[StorageNodeView],
    count: usize,
) -> Vec<StorageNodeView> {
    let mut candidates: Vec<&StorageNodeView> = nodes
        .iter()
        .filter(|node| node.id != self_id && node.status == NodeStatus::Active)
        .collect();
    candidates.sort_by_key(|node| node.id);
    let start = candidates
        .iter()
        .position(|node| node.id > self_id)
        .unwrap_or(0);
    candidates.rotate_left(start);
    candidates.into_iter().take(count).cloned().collect()
}

impl StorageNode {
    pub fn new(store: Arc<dyn BlockStore>, options: StorageNodeOptions) -> Self {
        Self {
            store,
            coordinator: CoordinatorService::new(&options.coordinator_addrs, options.request_timeout),
            peers: PeerService::new(options.request_timeout),
            identity: RwLock::new(Identity::default()),
            health: Mutex::new(HealthReport::default()),
            options,
        }
    }

    pub async fn storage_node_id(&self) -> Option<StorageNodeId> {
        self.identity.read().await.current
    }

    #[instrument(name = "storage_node_register", skip(self))]
    pub async fn register(&self) -> Result<StorageNodeId, DfsError> {
        let previous = {
            let identity = self.identity.read().await;
            identity.current.or(identity.previous)
        };
        let id = self
            .coordinator
            .register(&self.options.advertise_host, self.options.advertise_port, previous)
            .await?;
        let mut identity = self.identity.write().await;
        identity.current = Some(id);
        identity.previous = Some(id);
        info!(storage_node_id = id, "Registered with the coordinator");
        Ok(id)
    }

    /// Drops the current id; the next heartbeat tick registers again.
    pub async fn forget_registration(&self) {
        self.identity.write().await.current = None;
    }

    /// Reports health and inventory, then reclaims what the coordinator no
    /// longer references. Returns how many chunk files were removed.
    #[instrument(name = "storage_node_heartbeat", skip(self))]
    pub async fn heartbeat(&self) -> Result<usize, DfsError> {
        let storage_node_id = self
            .storage_node_id()
            .await
            .ok_or(DfsError::RegistrationRequired { storage_node_id: None })?;
        let request = HeartbeatRequest {
            storage_node_id,
            health: self.health.lock().await.clone(),
            held_chunks: self.store.available_chunks().await?,
        };
        let response = match self.coordinator.heartbeat(&request).await {
            Ok(response) => response,
            Err(e @ DfsError::RegistrationRequired { .. }) => {
                warn!("Coordinator does not know this node anymore");
                self.forget_registration().await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        let mut reclaimed = 0;
        for chunk in response.reclaim {
            let cutoff = UNIX_EPOCH + Duration::from_millis(chunk.unreferenced_since_ms);
            match self.store.delete_if_older(&chunk.chunk_id, cutoff).await {
                Ok(true) => {
                    debug!(chunk_id = %chunk.chunk_id, "Reclaimed unreferenced chunk");
                    reclaimed += 1;
                }
                Ok(false) => {}
                Err(e) => error!(chunk_id = %chunk.chunk_id, error = %e, "Could not reclaim chunk"),
            }
        }
        Ok(reclaimed)
    }

    /// Persists locally, replicates to peers, then records the chunk with the
    /// coordinator. The ack carries the last state reached; nothing is rolled
    /// back once the chunk is persisted.
    #[instrument(name = "storage_node_write_chunk", skip(self, request), fields(path = %request.path, chunk_id = %request.chunk_id, sequence_index = request.sequence_index))]
    pub async fn write_chunk(&self, request: WriteChunk) -> Result<WriteAck, DfsError> {
        let mut state = WriteState::Received;
        let storage_node_id = self
            .storage_node_id()
            .await
            .ok_or(DfsError::RegistrationRequired { storage_node_id: None })?;
        validate_chunk_id(&request.chunk_id)?;
        if let Some(chunk_count) = request.chunk_count {
            if request.sequence_index >= chunk_count {
                return Err(DfsError::protocol(format!(
                    "sequence index {} is outside a file of {chunk_count} chunks",
                    request.sequence_index
                )));
            }
        }
        trace!(?state, len = request.bytes.len(), "chunk received");

        self.store.write(&request.chunk_id, &request.bytes).await?;
        state = WriteState::LocallyPersisted;
        trace!(?state, "chunk persisted");

        state = WriteState::Replicating;
        trace!(?state, "replicating chunk");
        let replicas = self
            .replicate_to_peers(storage_node_id, &request.chunk_id, request.bytes)
            .await;

        let append = AppendChunkRequest {
            path: request.path,
            chunk_id: request.chunk_id.clone(),
            storage_node_id,
            sequence_index: request.sequence_index,
            chunk_count: request.chunk_count,
            replicas: replicas.clone(),
        };
        match self.coordinator.append_chunk(&append).await {
            Ok(()) => {
                state = WriteState::MetadataAcknowledged;
                if replicas.len() + 1 >= self.options.replication_factor {
                    self.health.lock().await.mark_healthy();
                }
            }
            Err(e) => {
                error!(error = %e, "Coordinator did not acknowledge the chunk");
                self.health.lock().await.record_metadata_failure(e.to_string());
                if matches!(e, DfsError::RegistrationRequired { .. }) {
                    self.forget_registration().await;
                }
            }
        }
        info!(?state, ?replicas, "chunk write finished");
        Ok(WriteAck {
            chunk_id: request.chunk_id,
            sequence_index: request.sequence_index,
            state,
            storage_node_id,
            replicas,
        })
    }

    /// Copies the chunk to `replication_factor - 1` peers concurrently and
    /// returns the ids that acknowledged.
    async fn replicate_to_peers(
        &self,
        storage_node_id: StorageNodeId,
        chunk_id: &str,
        bytes: Vec<u8>,
    ) -> Vec<StorageNodeId> {
        let wanted = self.options.replication_factor.saturating_sub(1);
        if wanted == 0 {
            return vec![];
        }
        let nodes = match self.coordinator.storage_nodes().await {
            Ok(nodes) => nodes,
            Err(e) => {
                error!(error = %e, "Could not fetch the storage node list, chunk stays unreplicated");
                self.record_shortfall(chunk_id, 0, wanted).await;
                return vec![];
            }
        };
        let peers = select_peers(storage_node_id, &nodes, wanted);
        let request = ReplicateChunk {
            chunk_id: chunk_id.to_owned(),
            bytes,
        };
        let results = join_all(peers.iter().map(|peer| self.peers.replicate(peer, &request))).await;
        let mut replicas = vec![];
        for (peer, result) in peers.iter().zip(results) {
            match result {
                Ok(()) => replicas.push(peer.id),
                Err(e) => warn!(peer = peer.id, error = %e, "Peer did not take a copy"),
            }
        }
        if replicas.len() < wanted {
            self.record_shortfall(chunk_id, replicas.len(), wanted).await;
        }
        replicas
    }

    async fn record_shortfall(&self, chunk_id: &str, replicated: usize, wanted: usize) {
        let shortfall = DfsError::ReplicationShortfall {
            chunk_id: chunk_id.to_owned(),
            live: replicated + 1,
            target: wanted + 1,
        };
        warn!(%shortfall, "Chunk under-replicated");
        self.health
            .lock()
            .await
            .record_replication_shortfall(shortfall.to_string());
    }

    #[instrument(name = "storage_node_read_chunk", skip(self))]
    pub async fn read_chunk(&self, chunk_id: &str) -> Result<ChunkData, DfsError> {
        let bytes = self.store.read(chunk_id).await?;
        Ok(ChunkData {
            chunk_id: chunk_id.to_owned(),
            bytes,
        })
    }

    /// Peer write. Writing the same id and bytes twice leaves one identical file.
    #[instrument(name = "storage_node_replicate_chunk", skip(self, request), fields(chunk_id = %request.chunk_id))]
    pub async fn replicate_chunk(&self, request: ReplicateChunk) -> Result<(), DfsError> {
        self.store.write(&request.chunk_id, &request.bytes).await?;
        debug!("replica stored");
        Ok(())
    }

    /// Pushes the local copy of a chunk to each target on behalf of the
    /// coordinator.
    #[instrument(name = "storage_node_replicate_to", skip(self, request), fields(chunk_id = %request.chunk_id, targets = request.targets.len()))]
    pub async fn replicate_to(&self, request: ReplicateTo) -> Result<ReplicateToResponse, DfsError> {
        let bytes = self.store.read(&request.chunk_id).await?;
        let copy = ReplicateChunk {
            chunk_id: request.chunk_id,
            bytes,
        };
        let results = join_all(
            request
                .targets
                .iter()
                .map(|target| self.peers.replicate(target, &copy)),
        )
        .await;
        let mut replicated = vec![];
        for (target, result) in request.targets.iter().zip(results) {
            match result {
                Ok(()) => replicated.push(target.id),
                Err(e) => warn!(target = target.id, error = %e, "Target did not take a copy"),
            }
        }
        Ok(ReplicateToResponse { replicated })
    }

    pub async fn status(&self) -> Result<NodeStatusResponse, DfsError> {
        Ok(NodeStatusResponse {
            storage_node_id: self.storage_node_id().await,
            health: self.health.lock().await.clone(),
            chunk_count: self.store.available_chunks().await?.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proto::types::HealthStatus;
    use storage::FileStorage;

    fn view(id: StorageNodeId, status: NodeStatus) -> StorageNodeView {
        StorageNodeView {
            id,
            host: "127.0.0.1".into(),
            port: 1,
            status,
            health: HealthReport::default(),
        }
    }

    async fn offline_node(dir: &std::path::Path) -> StorageNode {
        let store = FileStorage::open(dir).await.unwrap();
        StorageNode::new(
            Arc::new(store),
            StorageNodeOptions {
                // nothing listens here
                coordinator_addrs: "http://127.0.0.1:9".into(),
                advertise_host: "127.0.0.1".into(),
                advertise_port: 6000,
                replication_factor: 3,
                request_timeout: Duration::from_millis(300),
            },
        )
    }

    #[test]
    fn peers_follow_self_in_cyclic_order() {
        let nodes: Vec<_> = [1, 2, 3, 4, 5].into_iter().map(|id| view(id, NodeStatus::Active)).collect();
        let ids = |peers: Vec<StorageNodeView>| peers.iter().map(|p| p.id).collect::<Vec<_>>();
        assert_eq!(ids(select_peers(4, &nodes, 2)), vec![5, 1]);
        assert_eq!(ids(select_peers(5, &nodes, 2)), vec![1, 2]);
        assert_eq!(ids(select_peers(1, &nodes, 10)), vec![2, 3, 4, 5]);
    }

    #[test]
    fn suspected_nodes_are_skipped() {
        let nodes = vec![
            view(3, NodeStatus::Active),
            view(1, NodeStatus::Active),
            view(2, NodeStatus::Suspected),
        ];
        let peers = select_peers(1, &nodes, 2);
        assert_eq!(peers.iter().map(|p| p.id).collect::<Vec<_>>(), vec![3]);
    }

    #[tokio::test]
    async fn unregistered_nodes_reject_writes() {
        let dir = tempfile::tempdir().unwrap();
        let node = offline_node(dir.path()).await;
        let result = node
            .write_chunk(WriteChunk {
                path: "/a.txt".into(),
                chunk_id: "a.txt_chunk_1".into(),
                sequence_index: 0,
                chunk_count: Some(1),
                bytes: b"l1\n".to_vec(),
            })
            .await;
        assert_eq!(result, Err(DfsError::RegistrationRequired { storage_node_id: None }));
        assert!(matches!(
            node.read_chunk("a.txt_chunk_1").await,
            Err(DfsError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn replicas_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let node = offline_node(dir.path()).await;
        let copy = ReplicateChunk {
            chunk_id: "a.txt_chunk_2".into(),
            bytes: b"l11\nl12\n".to_vec(),
        };
        node.replicate_chunk(copy.clone()).await.unwrap();
        node.replicate_chunk(copy).await.unwrap();

        let data = node.read_chunk("a.txt_chunk_2").await.unwrap();
        assert_eq!(data.bytes, b"l11\nl12\n");
        let status = node.status().await.unwrap();
        assert_eq!(status.chunk_count, 1);
        assert_eq!(status.storage_node_id, None);
        assert_eq!(status.health.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn unreachable_targets_are_left_out() {
        let dir = tempfile::tempdir().unwrap();
        let node = offline_node(dir.path()).await;
        node.replicate_chunk(ReplicateChunk {
            chunk_id: "a.txt_chunk_1".into(),
            bytes: b"l1\n".to_vec(),
        })
        .await
        .unwrap();
        let response = node
            .replicate_to(ReplicateTo {
                chunk_id: "a.txt_chunk_1".into(),
                targets: vec![view(7, NodeStatus::Active)],
            })
            .await
            .unwrap();
        assert!(response.replicated.is_empty());

        let missing = node
            .replicate_to(ReplicateTo {
                chunk_id: "missing_chunk_1".into(),
                targets: vec![],
            })
            .await;
        assert!(matches!(missing, Err(DfsError::NotFound { .. })));
    }

    #[tokio::test]
    async fn heartbeat_needs_registration() {
        let dir = tempfile::tempdir().unwrap();
        let node = offline_node(dir.path()).await;
        assert_eq!(
            node.heartbeat().await,
            Err(DfsError::RegistrationRequired { storage_node_id: None })
        );
        assert!(matches!(node.register().await, Err(DfsError::NodeUnreachable { .. })));
    }
}
