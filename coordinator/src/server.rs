use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use proto::coordinator::{
    APPEND_CHUNK, CATALOG, CLIENT_PING, CLIENTS, COPY_FILE, CREATE_FILE, DELETE_FILE, FILE_METADATA,
    HEARTBEAT, LIST_DIRECTORY, LIST_FILES, MOVE_FILE, REGISTER, STORAGE_NODES,
};
use tokio::net::TcpListener;

use crate::{client_handler, coordinator_state::CoordinatorState, storage_node::handler};

pub fn router(state: Arc<CoordinatorState>) -> Router {
    Router::new()
        .route(REGISTER, post(handler::register))
        .route(HEARTBEAT, post(handler::heartbeat))
        .route(APPEND_CHUNK, post(handler::append_chunk))
        .route(STORAGE_NODES, get(client_handler::storage_nodes))
        .route(FILE_METADATA, post(client_handler::file_metadata))
        .route(CREATE_FILE, post(client_handler::create_file))
        .route(DELETE_FILE, post(client_handler::delete_file))
        .route(MOVE_FILE, post(client_handler::move_file))
        .route(COPY_FILE, post(client_handler::copy_file))
        .route(LIST_FILES, get(client_handler::list_files))
        .route(CATALOG, get(client_handler::catalog))
        .route(LIST_DIRECTORY, post(client_handler::list_directory))
        .route(CLIENT_PING, post(client_handler::ping))
        .route(CLIENTS, get(client_handler::clients))
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: Arc<CoordinatorState>) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator_state::tests::test_config;
    use proto::{
        DfsError,
        coordinator::{
            CatalogResponse, CreateFileRequest, CreateFileResponse, ListFilesResponse, PathRequest,
        },
    };
    use std::time::Duration;
    use utilities::http::HttpTransport;

    #[tokio::test]
    async fn errors_cross_http_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let state = CoordinatorState::open(test_config(dir.path())).await.unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addrs = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(serve(listener, state));

        let transport = HttpTransport::new(Duration::from_secs(2));
        // a bare path is a create without a declared chunk count
        let request = PathRequest { path: "/b/a.txt".into() };
        let created: CreateFileResponse = transport.post(&addrs, CREATE_FILE, &request).await.unwrap();
        assert!(!created.file_id.is_empty());
        let again: Result<CreateFileResponse, DfsError> = transport.post(&addrs, CREATE_FILE, &request).await;
        assert_eq!(again, Err(DfsError::already_exists("/b/a.txt")));

        let listed: ListFilesResponse = transport.get(&addrs, LIST_FILES).await.unwrap();
        assert_eq!(listed.files, vec!["/b/a.txt"]);
    }

    #[tokio::test]
    async fn metadata_route_dumps_the_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let state = CoordinatorState::open(test_config(dir.path())).await.unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addrs = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(serve(listener, state));

        let transport = HttpTransport::new(Duration::from_secs(2));
        let request = CreateFileRequest {
            path: "/b/a.txt".into(),
            chunk_count: Some(3),
        };
        let created: CreateFileResponse = transport.post(&addrs, CREATE_FILE, &request).await.unwrap();

        let catalog: CatalogResponse = transport.get(&addrs, CATALOG).await.unwrap();
        assert_eq!(catalog.files.len(), 1);
        assert_eq!(catalog.files[0].path, "/b/a.txt");
        assert_eq!(catalog.files[0].file_id, created.file_id);
        assert_eq!(catalog.files[0].chunk_count, Some(3));
    }
}
