use std::{
    collections::BTreeMap, num::NonZeroUsize, path::Path, sync::Arc, time::Duration,
};

use proto::{
    DfsError,
    coordinator::FileMetadata,
    storage_node::{WriteAck, WriteChunk, WriteState},
    types::{ChunkRecord, DirEntry, NodeStatus, StorageNodeId, StorageNodeView},
};
use tokio::{
    fs::OpenOptions,
    io::AsyncWriteExt,
    sync::Mutex,
    task::JoinHandle,
    time::interval,
};
use utilities::logger::{debug, error, info, instrument, trace, tracing, warn};

use crate::{
    chunk_joiner::ChunkJoiner,
    config::Config,
    coordinator_service::CoordinatorService,
    file_chunker::{FileChunk, into_chunks, line_groups},
    placement::{RoundRobinPlacement, rotation},
    storage_node_service::StorageNodeService,
};

#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub client_id: String,
    pub coordinator_addrs: String,
    pub chunk_size_lines: NonZeroUsize,
    pub write_attempts: u8,
    pub request_timeout: Duration,
}

impl From<&Config> for ClientOptions {
    fn from(config: &Config) -> Self {
        ClientOptions {
            client_id: config.client_id.clone(),
            coordinator_addrs: config.coordinator_addrs.clone(),
            chunk_size_lines: config.chunk_size_lines,
            write_attempts: config.write_attempts,
            request_timeout: config.request_timeout(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadReport {
    pub file_id: String,
    pub acks: Vec<WriteAck>,
}

/// A client session: the coordinator and storage node transports plus the
/// placement cursor shared by every upload made through it.
pub struct DfsClient {
    options: ClientOptions,
    coordinator: CoordinatorService,
    storage_nodes: StorageNodeService,
    placement: Mutex<RoundRobinPlacement>,
}

/// Chunk ids are `{name}.{file id prefix}_chunk_{n}`. The prefix keeps a new
/// upload from overwriting bytes an older copy of the same name still shares.
fn chunk_base_name(path: &str, file_id: &str) -> String {
    let name = path.rsplit('/').find(|part| !part.is_empty()).unwrap_or("file");
    let prefix: String = file_id.chars().filter(char::is_ascii_hexdigit).take(8).collect();
    format!("{name}.{prefix}")
}

fn active_nodes(mut nodes: Vec<StorageNodeView>) -> Vec<StorageNodeView> {
    nodes.retain(|node| node.status == NodeStatus::Active);
    nodes.sort_by_key(|node| node.id);
    nodes
}

impl DfsClient {
    pub fn new(options: ClientOptions) -> Self {
        Self {
            coordinator: CoordinatorService::new(&options.coordinator_addrs, options.request_timeout),
            storage_nodes: StorageNodeService::new(options.request_timeout),
            placement: Mutex::new(RoundRobinPlacement::default()),
            options,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.options.client_id
    }

    /// Stores `content` at `path`. The target must be absent or an empty file.
    /// Chunks go out one after another; a chunk that no node accepted within
    /// the attempt budget fails the upload and earlier chunks stay written.
    /// The target is created with its chunk count, so a partial upload reads
    /// back as incomplete rather than short.
    #[instrument(name = "client_upload", skip(self, content), fields(len = content.len()))]
    pub async fn upload(&self, path: &str, content: &[u8]) -> Result<UploadReport, DfsError> {
        let groups = line_groups(content, self.options.chunk_size_lines);
        let chunk_count = groups.len() as u64;
        let file_id = self.claim_target(path, chunk_count).await?;
        let chunks = into_chunks(&chunk_base_name(path, &file_id), groups);
        if chunks.is_empty() {
            info!("Nothing to upload, file left empty");
            return Ok(UploadReport { file_id, acks: vec![] });
        }
        let nodes = active_nodes(self.coordinator.storage_nodes().await?);
        let placed = self.placement.lock().await.place_chunks(chunks.len(), &nodes)?;

        let mut acks = Vec::with_capacity(chunks.len());
        for (chunk, start) in chunks.into_iter().zip(placed) {
            let ack = self.write_chunk(path, chunk, chunk_count, &nodes, start).await?;
            acks.push(ack);
        }
        info!(%file_id, chunks = acks.len(), "Upload finished");
        Ok(UploadReport { file_id, acks })
    }

    async fn claim_target(&self, path: &str, chunk_count: u64) -> Result<String, DfsError> {
        match self.coordinator.create_file(path, Some(chunk_count)).await {
            Ok(file_id) => Ok(file_id),
            Err(DfsError::AlreadyExists { path: existing }) => {
                let metadata = match self.coordinator.file_metadata(path).await {
                    Ok(metadata) => metadata,
                    // a directory sits at the target
                    Err(DfsError::NotFound { .. }) => return Err(DfsError::already_exists(existing)),
                    Err(e) => return Err(e),
                };
                if !metadata.chunks.is_empty() {
                    return Err(DfsError::already_exists(existing));
                }
                debug!("Uploading into an existing empty file");
                Ok(metadata.file_id)
            }
            Err(e) => Err(e),
        }
    }

    async fn write_chunk(
        &self,
        path: &str,
        chunk: FileChunk,
        chunk_count: u64,
        nodes: &[StorageNodeView],
        start: usize,
    ) -> Result<WriteAck, DfsError> {
        let attempts = usize::from(self.options.write_attempts.max(1));
        let mut last_error = None;
        for index in rotation(start, nodes.len(), attempts) {
            let node = &nodes[index];
            let request = WriteChunk {
                path: path.to_owned(),
                chunk_id: chunk.chunk_id.clone(),
                sequence_index: chunk.sequence_index,
                chunk_count: Some(chunk_count),
                bytes: chunk.bytes.clone(),
            };
            match self.storage_nodes.write_chunk(node, request).await {
                Ok(ack) if ack.state == WriteState::MetadataAcknowledged => {
                    trace!(chunk_id = %ack.chunk_id, storage_node_id = node.id, "chunk written");
                    return Ok(ack);
                }
                Ok(ack) => {
                    warn!(chunk_id = %ack.chunk_id, storage_node_id = node.id, state = ?ack.state, "Write stopped short, rotating");
                    last_error = Some(DfsError::storage(format!(
                        "storage node {} stopped at {:?} for {}",
                        node.id, ack.state, ack.chunk_id
                    )));
                }
                Err(e) if e.is_terminal() => return Err(e),
                Err(e) => {
                    warn!(chunk_id = %chunk.chunk_id, storage_node_id = node.id, error = %e, "Write failed, rotating");
                    last_error = Some(e);
                }
            }
        }
        error!(chunk_id = %chunk.chunk_id, "No storage node accepted the chunk");
        Err(last_error.unwrap_or_else(|| DfsError::unreachable("no storage node to write to")))
    }

    /// Fetches every chunk in sequence order and returns the file only if the
    /// retrieved set is complete.
    #[instrument(name = "client_download", skip(self))]
    pub async fn download(&self, path: &str) -> Result<Vec<u8>, DfsError> {
        let metadata = self.coordinator.file_metadata(path).await?;
        let nodes: BTreeMap<StorageNodeId, StorageNodeView> = self
            .coordinator
            .storage_nodes()
            .await?
            .into_iter()
            .filter(|node| node.status.is_live())
            .map(|node| (node.id, node))
            .collect();
        let expected = metadata.chunk_count.unwrap_or(metadata.chunks.len() as u64);
        let mut joiner = ChunkJoiner::new(path, expected);

        let mut records = metadata.chunks.clone();
        records.sort_by_key(|record| record.sequence_index);
        for record in &records {
            if record.degraded {
                return Err(DfsError::degraded(format!("{path} ({})", record.chunk_id)));
            }
            match self.fetch_chunk(record, &metadata, &nodes).await {
                Some(bytes) => joiner.accept(record.sequence_index, bytes),
                None => error!(chunk_id = %record.chunk_id, "No holder served the chunk"),
            }
        }
        joiner.join()
    }

    /// Recorded owner first, then known replica holders, then any other live
    /// node by id.
    async fn fetch_chunk(
        &self,
        record: &ChunkRecord,
        metadata: &FileMetadata,
        nodes: &BTreeMap<StorageNodeId, StorageNodeView>,
    ) -> Option<Vec<u8>> {
        let mut candidates = vec![record.storage_node_id];
        if let Some(holders) = metadata.replicas.get(&record.chunk_id) {
            candidates.extend(holders);
        }
        candidates.extend(nodes.keys());
        let mut tried = Vec::with_capacity(candidates.len());
        for id in candidates {
            if tried.contains(&id) {
                continue;
            }
            tried.push(id);
            let Some(node) = nodes.get(&id) else {
                continue;
            };
            match self.storage_nodes.read_chunk(node, &record.chunk_id).await {
                Ok(bytes) => return Some(bytes),
                Err(e) => debug!(chunk_id = %record.chunk_id, storage_node_id = id, error = %e, "read failed, trying next holder"),
            }
        }
        None
    }

    /// Downloads `path` into a new local file; an existing local file is left
    /// untouched.
    pub async fn download_to(&self, path: &str, local_path: &Path) -> Result<usize, DfsError> {
        let bytes = self.download(path).await?;
        let io_error = |e: std::io::Error| DfsError::storage(format!("{}: {e}", local_path.display()));
        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(local_path)
            .await
            .map_err(io_error)?;
        file.write_all(&bytes).await.map_err(io_error)?;
        file.sync_all().await.map_err(io_error)?;
        Ok(bytes.len())
    }

    pub async fn file_metadata(&self, path: &str) -> Result<FileMetadata, DfsError> {
        self.coordinator.file_metadata(path).await
    }

    /// Creates an empty file.
    pub async fn create_file(&self, path: &str) -> Result<String, DfsError> {
        self.coordinator.create_file(path, None).await
    }

    pub async fn delete_file(&self, path: &str) -> Result<(), DfsError> {
        self.coordinator.delete_file(path).await
    }

    pub async fn move_file(&self, src_path: &str, dst_path: &str) -> Result<(), DfsError> {
        self.coordinator.move_file(src_path, dst_path).await
    }

    pub async fn copy_file(&self, src_path: &str, dst_path: &str) -> Result<String, DfsError> {
        self.coordinator.copy_file(src_path, dst_path).await
    }

    pub async fn list_files(&self) -> Result<Vec<String>, DfsError> {
        self.coordinator.list_files().await
    }

    pub async fn catalog(&self) -> Result<Vec<FileMetadata>, DfsError> {
        self.coordinator.catalog().await
    }

    pub async fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>, DfsError> {
        self.coordinator.list_directory(path).await
    }

    pub async fn storage_nodes(&self) -> Result<Vec<StorageNodeView>, DfsError> {
        self.coordinator.storage_nodes().await
    }

    /// Keeps the client session open on the coordinator.
    pub fn spawn_session_ping(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(every);
            loop {
                ticker.tick().await;
                if let Err(e) = client.coordinator.ping(client.client_id()).await {
                    error!(error = %e, "Session ping failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proto::types::HealthReport;

    #[test]
    fn base_name_carries_a_file_id_prefix() {
        let file_id = "3f2a9c1e-0b7d-4d8a-9a51-7c0e2f64b2aa";
        assert_eq!(chunk_base_name("/b/a.txt", file_id), "a.txt.3f2a9c1e");
        assert_eq!(chunk_base_name("notes/", file_id), "notes.3f2a9c1e");
    }

    #[test]
    fn only_active_nodes_take_chunks() {
        let view = |id, status| StorageNodeView {
            id,
            host: "127.0.0.1".into(),
            port: 1,
            status,
            health: HealthReport::default(),
        };
        let nodes = active_nodes(vec![
            view(3, NodeStatus::Active),
            view(2, NodeStatus::Suspected),
            view(1, NodeStatus::Active),
        ]);
        assert_eq!(nodes.iter().map(|n| n.id).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[tokio::test]
    async fn unreachable_coordinator_surfaces() {
        let client = DfsClient::new(ClientOptions {
            client_id: "client-test".into(),
            coordinator_addrs: "http://127.0.0.1:9".into(),
            chunk_size_lines: NonZeroUsize::new(10).unwrap(),
            write_attempts: 3,
            request_timeout: Duration::from_millis(300),
        });
        assert!(matches!(
            client.upload("/a.txt", b"x\n").await,
            Err(DfsError::NodeUnreachable { .. })
        ));
        assert!(matches!(client.download("/a.txt").await, Err(DfsError::NodeUnreachable { .. })));
    }
}
