use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use proto::{
    Reply,
    storage_node::{ReplicateChunk, ReplicateTo, ReplicateToResponse},
};
use utilities::http::reply;

use crate::node_state::StorageNode;

/// Copy pushed by a peer after it persisted the chunk itself.
pub async fn replicate(
    State(node): State<Arc<StorageNode>>,
    Json(request): Json<ReplicateChunk>,
) -> (StatusCode, Json<Reply<()>>) {
    reply(node.replicate_chunk(request).await)
}

/// Re-replication asked for by the coordinator's sweep.
pub async fn replicate_to(
    State(node): State<Arc<StorageNode>>,
    Json(request): Json<ReplicateTo>,
) -> (StatusCode, Json<Reply<ReplicateToResponse>>) {
    reply(node.replicate_to(request).await)
}
