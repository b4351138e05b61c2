use std::time::Duration;

use proto::{
    DfsError,
    coordinator::{
        CATALOG, CLIENT_PING, COPY_FILE, CREATE_FILE, CatalogResponse, ClientPingRequest,
        CreateFileRequest, CreateFileResponse, DELETE_FILE, FILE_METADATA, FileMetadata,
        LIST_DIRECTORY, LIST_FILES, ListDirectoryResponse, ListFilesResponse, MOVE_FILE,
        PathRequest, STORAGE_NODES, TransferRequest,
    },
    types::{DirEntry, StorageNodeView},
};
use utilities::{
    http::HttpTransport,
    logger::{instrument, tracing},
};

/// Calls a client makes on the coordinator.
#[derive(Clone, Debug)]
pub struct CoordinatorService {
    coordinator_addrs: String,
    transport: HttpTransport,
}

impl CoordinatorService {
    pub fn new(coordinator_addrs: &str, timeout: Duration) -> Self {
        Self {
            coordinator_addrs: coordinator_addrs.trim_end_matches('/').to_owned(),
            transport: HttpTransport::new(timeout),
        }
    }

    pub async fn storage_nodes(&self) -> Result<Vec<StorageNodeView>, DfsError> {
        self.transport.get(&self.coordinator_addrs, STORAGE_NODES).await
    }

    #[instrument(name = "service_coordinator_file_metadata", skip(self))]
    pub async fn file_metadata(&self, path: &str) -> Result<FileMetadata, DfsError> {
        self.transport
            .post(&self.coordinator_addrs, FILE_METADATA, &path_request(path))
            .await
    }

    #[instrument(name = "service_coordinator_create_file", skip(self))]
    pub async fn create_file(&self, path: &str, chunk_count: Option<u64>) -> Result<String, DfsError> {
        let request = CreateFileRequest {
            path: path.to_owned(),
            chunk_count,
        };
        let response: CreateFileResponse = self
            .transport
            .post(&self.coordinator_addrs, CREATE_FILE, &request)
            .await?;
        Ok(response.file_id)
    }

    #[instrument(name = "service_coordinator_delete_file", skip(self))]
    pub async fn delete_file(&self, path: &str) -> Result<(), DfsError> {
        self.transport
            .post(&self.coordinator_addrs, DELETE_FILE, &path_request(path))
            .await
    }

    #[instrument(name = "service_coordinator_move_file", skip(self))]
    pub async fn move_file(&self, src_path: &str, dst_path: &str) -> Result<(), DfsError> {
        self.transport
            .post(&self.coordinator_addrs, MOVE_FILE, &transfer_request(src_path, dst_path))
            .await
    }

    #[instrument(name = "service_coordinator_copy_file", skip(self))]
    pub async fn copy_file(&self, src_path: &str, dst_path: &str) -> Result<String, DfsError> {
        let response: CreateFileResponse = self
            .transport
            .post(&self.coordinator_addrs, COPY_FILE, &transfer_request(src_path, dst_path))
            .await?;
        Ok(response.file_id)
    }

    pub async fn catalog(&self) -> Result<Vec<FileMetadata>, DfsError> {
        let response: CatalogResponse = self.transport.get(&self.coordinator_addrs, CATALOG).await?;
        Ok(response.files)
    }

    pub async fn list_files(&self) -> Result<Vec<String>, DfsError> {
        let response: ListFilesResponse = self.transport.get(&self.coordinator_addrs, LIST_FILES).await?;
        Ok(response.files)
    }

    pub async fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>, DfsError> {
        let response: ListDirectoryResponse = self
            .transport
            .post(&self.coordinator_addrs, LIST_DIRECTORY, &path_request(path))
            .await?;
        Ok(response.entries)
    }

    pub async fn ping(&self, client_id: &str) -> Result<(), DfsError> {
        let request = ClientPingRequest {
            client_id: client_id.to_owned(),
        };
        self.transport.post(&self.coordinator_addrs, CLIENT_PING, &request).await
    }
}

fn path_request(path: &str) -> PathRequest {
    PathRequest { path: path.to_owned() }
}

fn transfer_request(src_path: &str, dst_path: &str) -> TransferRequest {
    TransferRequest {
        src_path: src_path.to_owned(),
        dst_path: dst_path.to_owned(),
    }
}
