use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use proto::storage_node::{CHUNK, REPLICATE, REPLICATE_TO, STATUS};
use tokio::net::TcpListener;

use crate::{client, node_state::StorageNode, peer};

/// Base64 inflates chunk bodies by a third; leave room for large chunks.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

pub fn router(node: Arc<StorageNode>) -> Router {
    Router::new()
        .route(CHUNK, post(client::handler::chunk))
        .route(STATUS, get(client::handler::status))
        .route(REPLICATE, post(peer::handler::replicate))
        .route(REPLICATE_TO, post(peer::handler::replicate_to))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(node)
}

pub async fn serve(listener: TcpListener, node: Arc<StorageNode>) -> std::io::Result<()> {
    axum::serve(listener, router(node)).await
}
