use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use proto::{
    Reply,
    storage_node::{ChunkRequest, ChunkResponse, NodeStatusResponse},
};
use utilities::{
    http::reply,
    logger::{instrument, trace, tracing},
};

use crate::node_state::StorageNode;

/// Single entry point for chunk traffic from clients, dispatched on the
/// request's `operation`.
#[instrument(name = "handler_chunk", skip(node, request))]
pub async fn chunk(
    State(node): State<Arc<StorageNode>>,
    Json(request): Json<ChunkRequest>,
) -> (StatusCode, Json<Reply<ChunkResponse>>) {
    let result = match request {
        ChunkRequest::Write(write) => {
            trace!(chunk_id = %write.chunk_id, "write request");
            node.write_chunk(write).await.map(ChunkResponse::Write)
        }
        ChunkRequest::Read(read) => {
            trace!(chunk_id = %read.chunk_id, "read request");
            node.read_chunk(&read.chunk_id).await.map(ChunkResponse::Read)
        }
    };
    reply(result)
}

pub async fn status(State(node): State<Arc<StorageNode>>) -> (StatusCode, Json<Reply<NodeStatusResponse>>) {
    reply(node.status().await)
}
