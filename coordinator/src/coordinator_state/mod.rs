pub mod client_sessions;
pub mod reclaim_queue;
pub mod registry;
pub mod replica_index;
pub mod storage_node_details;

use std::{
    iter::once,
    sync::Arc,
    time::{Instant, SystemTime},
};

use proto::{
    DfsError,
    coordinator::{
        AppendChunkRequest, CatalogResponse, ClientsResponse, CreateFileResponse, FileMetadata, HeartbeatRequest,
        HeartbeatResponse, ListDirectoryResponse, ListFilesResponse, RegisterRequest,
        RegisterResponse,
    },
    types::{ChunkRecord, StorageNodeView},
};
use tokio::sync::Mutex;
use utilities::logger::{debug, info, instrument, tracing};

use crate::{
    catalog::MetadataCatalog,
    config::Config,
    coordinator_state::{
        client_sessions::ClientSessions, reclaim_queue::ReclaimQueue, registry::StorageNodeRegistry,
        replica_index::ReplicaIndex, storage_node_details::StorageNodeDetail,
    },
    storage_node::service::StorageNodeService,
};

/// Everything the coordinator owns. Shared with the axum handlers and the
/// background sweeps through an `Arc`.
///
/// Each part has its own lock and no lock is held across a network call. Two
/// paths nest: registry then catalog during registration, and reclaim then
/// catalog during deletion.
pub struct CoordinatorState {
    pub config: Config,
    pub catalog: MetadataCatalog,
    pub registry: Mutex<StorageNodeRegistry>,
    pub replicas: Mutex<ReplicaIndex>,
    pub reclaim: Mutex<ReclaimQueue>,
    pub sessions: Mutex<ClientSessions>,
    pub storage_node_service: StorageNodeService,
    pub started_at: Instant,
}

impl CoordinatorState {
    pub async fn open(config: Config) -> Result<Arc<Self>, DfsError> {
        let catalog = MetadataCatalog::open(&config.catalog_file).await?;
        Ok(Arc::new(CoordinatorState {
            storage_node_service: StorageNodeService::new(config.request_timeout()),
            config,
            catalog,
            registry: Mutex::new(StorageNodeRegistry::default()),
            replicas: Mutex::new(ReplicaIndex::default()),
            reclaim: Mutex::new(ReclaimQueue::default()),
            sessions: Mutex::new(ClientSessions::default()),
            started_at: Instant::now(),
        }))
    }

    #[instrument(name = "coordinator_register", skip(self, request), fields(host = %request.host, port = request.port, previous_id = ?request.previous_id))]
    pub async fn register(&self, request: RegisterRequest) -> Result<RegisterResponse, DfsError> {
        let mut registry = self.registry.lock().await;
        // an id still held by a live registration is never handed out twice
        let previous = request.previous_id.filter(|id| !registry.contains(*id));
        let id = self.catalog.reserve_storage_node_id(previous).await?;
        registry.insert(StorageNodeDetail::new(
            id,
            request.host,
            request.port,
            Instant::now(),
        ));
        info!(storage_node_id = id, "Storage node registered");
        Ok(RegisterResponse { storage_node_id: id })
    }

    pub async fn heartbeat(&self, request: HeartbeatRequest) -> Result<HeartbeatResponse, DfsError> {
        self.heartbeat_at(request, Instant::now()).await
    }

    #[instrument(name = "coordinator_heartbeat", skip(self, request, now), fields(storage_node_id = request.storage_node_id, held_chunks = request.held_chunks.len()))]
    pub async fn heartbeat_at(
        &self,
        request: HeartbeatRequest,
        now: Instant,
    ) -> Result<HeartbeatResponse, DfsError> {
        self.registry
            .lock()
            .await
            .heartbeat(request.storage_node_id, now, request.health)?;
        self.replicas
            .lock()
            .await
            .replace_inventory(request.storage_node_id, &request.held_chunks);
        let reclaim = self
            .reclaim
            .lock()
            .await
            .pending(SystemTime::now(), self.config.reclaim_retention());
        debug!(reclaim = reclaim.len(), "Heartbeat accepted");
        Ok(HeartbeatResponse { reclaim })
    }

    pub async fn storage_nodes(&self) -> Vec<StorageNodeView> {
        self.registry.lock().await.views()
    }

    #[instrument(name = "coordinator_append_chunk", skip(self, request), fields(path = %request.path, chunk_id = %request.chunk_id, storage_node_id = request.storage_node_id))]
    pub async fn append_chunk(&self, request: AppendChunkRequest) -> Result<(), DfsError> {
        if !self.registry.lock().await.contains(request.storage_node_id) {
            return Err(DfsError::RegistrationRequired {
                storage_node_id: Some(request.storage_node_id),
            });
        }
        let record = ChunkRecord {
            chunk_id: request.chunk_id.clone(),
            storage_node_id: request.storage_node_id,
            sequence_index: request.sequence_index,
            degraded: false,
        };
        self.catalog
            .append_chunk(&request.path, record, request.chunk_count)
            .await?;
        self.reclaim.lock().await.cancel(&request.chunk_id);
        self.replicas.lock().await.record(
            &request.chunk_id,
            once(request.storage_node_id).chain(request.replicas),
        );
        Ok(())
    }

    pub async fn file_metadata(&self, path: &str) -> Result<FileMetadata, DfsError> {
        let file = self.catalog.get_file(path).await?;
        let live = self.registry.lock().await.live_views();
        let index = self.replicas.lock().await;
        let replicas = file
            .chunks
            .iter()
            .map(|record| (record.chunk_id.clone(), index.live_holders(&record.chunk_id, &live)))
            .collect();
        Ok(FileMetadata {
            path: path.to_owned(),
            file_id: file.file_id,
            chunk_count: file.chunk_count,
            chunks: file.chunks,
            replicas,
        })
    }

    /// Every file in the catalog with its records and live replica holders.
    pub async fn catalog(&self) -> CatalogResponse {
        let files = self.catalog.files().await;
        let live = self.registry.lock().await.live_views();
        let index = self.replicas.lock().await;
        let files = files
            .into_iter()
            .map(|(path, file)| {
                let replicas = file
                    .chunks
                    .iter()
                    .map(|record| (record.chunk_id.clone(), index.live_holders(&record.chunk_id, &live)))
                    .collect();
                FileMetadata {
                    path,
                    file_id: file.file_id,
                    chunk_count: file.chunk_count,
                    chunks: file.chunks,
                    replicas,
                }
            })
            .collect();
        CatalogResponse { files }
    }

    pub async fn create_file(
        &self,
        path: &str,
        chunk_count: Option<u64>,
    ) -> Result<CreateFileResponse, DfsError> {
        let file_id = self.catalog.create_file(path, chunk_count).await?;
        Ok(CreateFileResponse { file_id })
    }

    /// Chunks left without any reference are queued for lazy reclaim. The
    /// reclaim queue stays locked from the catalog change to the scheduling,
    /// so an append reusing a chunk id cancels after the schedule.
    pub async fn delete_file(&self, path: &str) -> Result<(), DfsError> {
        let mut reclaim = self.reclaim.lock().await;
        let unreferenced = self.catalog.delete_file(path).await?;
        reclaim.schedule(unreferenced, SystemTime::now());
        Ok(())
    }

    pub async fn move_file(&self, src_path: &str, dst_path: &str) -> Result<(), DfsError> {
        self.catalog.move_file(src_path, dst_path).await
    }

    pub async fn copy_file(&self, src_path: &str, dst_path: &str) -> Result<CreateFileResponse, DfsError> {
        let file_id = self.catalog.copy_file(src_path, dst_path).await?;
        Ok(CreateFileResponse { file_id })
    }

    pub async fn list_files(&self) -> ListFilesResponse {
        ListFilesResponse {
            files: self.catalog.list_all().await,
        }
    }

    pub async fn list_directory(&self, path: &str) -> Result<ListDirectoryResponse, DfsError> {
        let entries = self.catalog.list_directory(path).await?;
        Ok(ListDirectoryResponse { entries })
    }

    pub async fn ping_client(&self, client_id: &str) {
        self.sessions.lock().await.ping(client_id, Instant::now());
    }

    pub async fn clients(&self) -> ClientsResponse {
        ClientsResponse {
            clients: self.sessions.lock().await.clients(),
        }
    }
}
