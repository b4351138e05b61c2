use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use proto::{
    Reply,
    coordinator::{
        CatalogResponse, ClientPingRequest, ClientsResponse, CreateFileRequest, CreateFileResponse,
        FileMetadata, ListDirectoryResponse, ListFilesResponse, PathRequest, TransferRequest,
    },
    types::StorageNodeView,
};
use utilities::http::reply;

use crate::coordinator_state::CoordinatorState;

type HttpReply<T> = (StatusCode, Json<Reply<T>>);

pub async fn storage_nodes(State(state): State<Arc<CoordinatorState>>) -> HttpReply<Vec<StorageNodeView>> {
    reply(Ok(state.storage_nodes().await))
}

pub async fn file_metadata(
    State(state): State<Arc<CoordinatorState>>,
    Json(request): Json<PathRequest>,
) -> HttpReply<FileMetadata> {
    reply(state.file_metadata(&request.path).await)
}

pub async fn create_file(
    State(state): State<Arc<CoordinatorState>>,
    Json(request): Json<CreateFileRequest>,
) -> HttpReply<CreateFileResponse> {
    reply(state.create_file(&request.path, request.chunk_count).await)
}

pub async fn delete_file(
    State(state): State<Arc<CoordinatorState>>,
    Json(request): Json<PathRequest>,
) -> HttpReply<()> {
    reply(state.delete_file(&request.path).await)
}

pub async fn move_file(
    State(state): State<Arc<CoordinatorState>>,
    Json(request): Json<TransferRequest>,
) -> HttpReply<()> {
    reply(state.move_file(&request.src_path, &request.dst_path).await)
}

pub async fn copy_file(
    State(state): State<Arc<CoordinatorState>>,
    Json(request): Json<TransferRequest>,
) -> HttpReply<CreateFileResponse> {
    reply(state.copy_file(&request.src_path, &request.dst_path).await)
}

pub async fn list_files(State(state): State<Arc<CoordinatorState>>) -> HttpReply<ListFilesResponse> {
    reply(Ok(state.list_files().await))
}

pub async fn catalog(State(state): State<Arc<CoordinatorState>>) -> HttpReply<CatalogResponse> {
    reply(Ok(state.catalog().await))
}

pub async fn list_directory(
    State(state): State<Arc<CoordinatorState>>,
    Json(request): Json<PathRequest>,
) -> HttpReply<ListDirectoryResponse> {
    reply(state.list_directory(&request.path).await)
}

pub async fn ping(
    State(state): State<Arc<CoordinatorState>>,
    Json(request): Json<ClientPingRequest>,
) -> HttpReply<()> {
    state.ping_client(&request.client_id).await;
    reply(Ok(()))
}

pub async fn clients(State(state): State<Arc<CoordinatorState>>) -> HttpReply<ClientsResponse> {
    reply(Ok(state.clients().await))
}
