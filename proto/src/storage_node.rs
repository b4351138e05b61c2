//! Requests and replies served by a storage node.
use serde::{Deserialize, Serialize};

use crate::types::{HealthReport, StorageNodeId, StorageNodeView};

pub const CHUNK: &str = "/chunk";
pub const REPLICATE: &str = "/chunk/replicate";
pub const REPLICATE_TO: &str = "/chunk/replicate_to";
/// GET
pub const STATUS: &str = "/status";

/// Body of `/chunk`, dispatched on its `operation` field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum ChunkRequest {
    Write(WriteChunk),
    Read(ReadChunk),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum ChunkResponse {
    Write(WriteAck),
    Read(ChunkData),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteChunk {
    /// Destination file in the namespace.
    pub path: String,
    pub chunk_id: String,
    pub sequence_index: u64,
    #[serde(default)]
    pub chunk_count: Option<u64>,
    #[serde(with = "crate::codec::base64_bytes")]
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadChunk {
    pub chunk_id: String,
}

/// Progress of a chunk write, in the order the states are reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteState {
    Received,
    LocallyPersisted,
    Replicating,
    MetadataAcknowledged,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteAck {
    pub chunk_id: String,
    pub sequence_index: u64,
    /// Last state the write reached on the node.
    pub state: WriteState,
    pub storage_node_id: StorageNodeId,
    pub replicas: Vec<StorageNodeId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkData {
    pub chunk_id: String,
    #[serde(with = "crate::codec::base64_bytes")]
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicateChunk {
    pub chunk_id: String,
    #[serde(with = "crate::codec::base64_bytes")]
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicateTo {
    pub chunk_id: String,
    pub targets: Vec<StorageNodeView>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicateToResponse {
    /// Targets that acknowledged the copy.
    pub replicated: Vec<StorageNodeId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatusResponse {
    pub storage_node_id: Option<StorageNodeId>,
    pub health: HealthReport,
    pub chunk_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_requests_are_tagged_by_operation() {
        let json = r#"{"operation":"read","chunk_id":"a.txt_chunk_1"}"#;
        let request: ChunkRequest = serde_json::from_str(json).unwrap();
        assert_eq!(
            request,
            ChunkRequest::Read(ReadChunk {
                chunk_id: "a.txt_chunk_1".to_owned()
            })
        );

        let write = ChunkRequest::Write(WriteChunk {
            path: "/a.txt".to_owned(),
            chunk_id: "a.txt_chunk_1".to_owned(),
            sequence_index: 0,
            chunk_count: Some(3),
            bytes: b"l1\n".to_vec(),
        });
        let value = serde_json::to_value(&write).unwrap();
        assert_eq!(value["operation"], "write");
        assert_eq!(value["bytes"], "bDEK");
    }

    #[test]
    fn write_states_are_ordered() {
        assert!(WriteState::Received < WriteState::LocallyPersisted);
        assert!(WriteState::Replicating < WriteState::MetadataAcknowledged);
    }
}
