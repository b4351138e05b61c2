use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    time::SystemTime,
};

use async_trait::async_trait;
use proto::DfsError;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info, instrument};

use crate::storage::{BlockStore, Result, validate_chunk_id};

const STAGED_DIR: &str = "staged";

/// Chunks as plain files under `root`. A write lands in `root/staged` first,
/// is fsynced, then renamed over the committed file.
#[derive(Clone, Debug)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let staged = root.join(STAGED_DIR);
        fs::create_dir_all(&staged)
            .await
            .map_err(|e| io_error(&staged, e))?;
        info!(root = %root.display(), "Created staging dir for storage");
        Ok(FileStorage { root })
    }
    pub fn root(&self) -> &Path {
        &self.root
    }
    fn get_committed_path(&self, chunk_id: &str) -> PathBuf {
        self.root.join(chunk_id)
    }
    // unique per write so concurrent writers of one chunk never share a staged file
    fn get_staged_path(&self, chunk_id: &str) -> PathBuf {
        self.root
            .join(STAGED_DIR)
            .join(format!("{chunk_id}.{}", uuid::Uuid::new_v4()))
    }
}

#[async_trait]
impl BlockStore for FileStorage {
    #[instrument(name = "file_storage_write", skip(self, bytes), fields(len = bytes.len()))]
    async fn write(&self, chunk_id: &str, bytes: &[u8]) -> Result<u64> {
        validate_chunk_id(chunk_id)?;
        let staged_path = self.get_staged_path(chunk_id);
        let mut chunk_file = File::create_new(&staged_path)
            .await
            .map_err(|e| io_error(&staged_path, e))?;
        chunk_file
            .write_all(bytes)
            .await
            .map_err(|e| io_error(&staged_path, e))?;
        chunk_file
            .sync_all()
            .await
            .map_err(|e| io_error(&staged_path, e))?;
        drop(chunk_file);
        let committed_path = self.get_committed_path(chunk_id);
        if let Err(e) = fs::rename(&staged_path, &committed_path).await {
            let _ = fs::remove_file(&staged_path).await;
            return Err(io_error(&committed_path, e));
        }
        debug!(%chunk_id, "chunk committed");
        Ok(bytes.len() as u64)
    }

    #[instrument(name = "file_storage_read", skip(self))]
    async fn read(&self, chunk_id: &str) -> Result<Vec<u8>> {
        validate_chunk_id(chunk_id)?;
        let chunk_path = self.get_committed_path(chunk_id);
        match fs::read(&chunk_path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(DfsError::not_found(format!("chunk {chunk_id}")))
            }
            Err(e) => Err(io_error(&chunk_path, e)),
        }
    }

    #[instrument(name = "file_storage_delete", skip(self))]
    async fn delete_if_older(&self, chunk_id: &str, cutoff: SystemTime) -> Result<bool> {
        validate_chunk_id(chunk_id)?;
        let chunk_path = self.get_committed_path(chunk_id);
        let modified = match fs::metadata(&chunk_path).await {
            Ok(metadata) => metadata.modified().map_err(|e| io_error(&chunk_path, e))?,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(io_error(&chunk_path, e)),
        };
        if modified >= cutoff {
            debug!(%chunk_id, "chunk rewritten after cutoff, keeping it");
            return Ok(false);
        }
        match fs::remove_file(&chunk_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&chunk_path, e)),
        }
    }

    #[instrument(name = "file_storage_available_chunk", skip(self))]
    async fn available_chunks(&self) -> Result<Vec<String>> {
        let mut dir_enteries = fs::read_dir(&self.root)
            .await
            .map_err(|e| io_error(&self.root, e))?;
        let mut chunk_ids = vec![];
        while let Some(chunk) = dir_enteries
            .next_entry()
            .await
            .map_err(|e| io_error(&self.root, e))?
        {
            let file_type = chunk.file_type().await.map_err(|e| io_error(&chunk.path(), e))?;
            if file_type.is_dir() {
                continue;
            }
            if let Ok(name) = chunk.file_name().into_string() {
                chunk_ids.push(name);
            }
        }
        chunk_ids.sort();
        Ok(chunk_ids)
    }
}

fn io_error(path: &Path, e: std::io::Error) -> DfsError {
    DfsError::storage(format!("{}: {e}", path.display()))
}
