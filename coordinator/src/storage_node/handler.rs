use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use proto::{
    Reply,
    coordinator::{
        AppendChunkRequest, HeartbeatRequest, HeartbeatResponse, RegisterRequest,
        RegisterResponse,
    },
};
use utilities::http::reply;

use crate::coordinator_state::CoordinatorState;

pub async fn register(
    State(state): State<Arc<CoordinatorState>>,
    Json(request): Json<RegisterRequest>,
) -> (StatusCode, Json<Reply<RegisterResponse>>) {
    reply(state.register(request).await)
}

pub async fn heartbeat(
    State(state): State<Arc<CoordinatorState>>,
    Json(request): Json<HeartbeatRequest>,
) -> (StatusCode, Json<Reply<HeartbeatResponse>>) {
    reply(state.heartbeat(request).await)
}

pub async fn append_chunk(
    State(state): State<Arc<CoordinatorState>>,
    Json(request): Json<AppendChunkRequest>,
) -> (StatusCode, Json<Reply<()>>) {
    reply(state.append_chunk(request).await)
}
