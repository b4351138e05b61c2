//! Requests and replies served by the coordinator.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{ChunkRecord, DirEntry, HealthReport, StorageNodeId};

pub const REGISTER: &str = "/storage_nodes/register";
pub const HEARTBEAT: &str = "/storage_nodes/heartbeat";
/// GET
pub const STORAGE_NODES: &str = "/storage_nodes";
pub const APPEND_CHUNK: &str = "/chunks/append";
pub const FILE_METADATA: &str = "/files/metadata";
pub const CREATE_FILE: &str = "/files/create";
pub const DELETE_FILE: &str = "/files/delete";
pub const MOVE_FILE: &str = "/files/move";
pub const COPY_FILE: &str = "/files/copy";
/// GET
pub const LIST_FILES: &str = "/files";
pub const LIST_DIRECTORY: &str = "/directories/list";
pub const CLIENT_PING: &str = "/clients/ping";
/// GET
pub const CLIENTS: &str = "/clients";
/// GET, the whole catalog
pub const CATALOG: &str = "/metadata";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub host: String,
    pub port: u16,
    /// Id held before a restart or before the coordinator forgot the node.
    #[serde(default)]
    pub previous_id: Option<StorageNodeId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub storage_node_id: StorageNodeId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub storage_node_id: StorageNodeId,
    pub health: HealthReport,
    /// Every chunk id currently committed on the node.
    pub held_chunks: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReclaimChunk {
    pub chunk_id: String,
    /// Copies written after this instant are newer than the deletion and must be kept.
    pub unreferenced_since_ms: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub reclaim: Vec<ReclaimChunk>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendChunkRequest {
    pub path: String,
    pub chunk_id: String,
    pub storage_node_id: StorageNodeId,
    pub sequence_index: u64,
    #[serde(default)]
    pub chunk_count: Option<u64>,
    /// Peers that acknowledged a copy.
    #[serde(default)]
    pub replicas: Vec<StorageNodeId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRequest {
    pub path: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub src_path: String,
    pub dst_path: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFileRequest {
    pub path: String,
    /// Chunks the creator is about to write, checked against on download.
    #[serde(default)]
    pub chunk_count: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFileResponse {
    pub file_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub path: String,
    pub file_id: String,
    pub chunk_count: Option<u64>,
    /// Ordered by sequence index.
    pub chunks: Vec<ChunkRecord>,
    /// chunk id -> live storage nodes believed to hold it
    #[serde(default)]
    pub replicas: BTreeMap<String, Vec<StorageNodeId>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogResponse {
    pub files: Vec<FileMetadata>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFilesResponse {
    pub files: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListDirectoryResponse {
    pub entries: Vec<DirEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientPingRequest {
    pub client_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientsResponse {
    pub clients: Vec<String>,
}
