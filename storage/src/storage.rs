use std::time::SystemTime;

use async_trait::async_trait;
use proto::DfsError;

pub type Result<T> = std::result::Result<T, DfsError>;

/// Chunk bytes addressed by chunk id.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Stores `bytes` under `chunk_id`, replacing an earlier copy atomically.
    async fn write(&self, chunk_id: &str, bytes: &[u8]) -> Result<u64>;
    /// `NotFound` when the chunk was never committed here.
    async fn read(&self, chunk_id: &str) -> Result<Vec<u8>>;
    /// Removes the chunk only if its copy was written before `cutoff`.
    /// Returns whether a file was removed.
    async fn delete_if_older(&self, chunk_id: &str, cutoff: SystemTime) -> Result<bool>;
    async fn available_chunks(&self) -> Result<Vec<String>>;
}

/// A chunk id names a file directly under the storage root.
pub fn validate_chunk_id(chunk_id: &str) -> Result<()> {
    let reason = if chunk_id.is_empty() {
        Some("chunk id is empty")
    } else if chunk_id == "." || chunk_id == ".." {
        Some("chunk id is a dot component")
    } else if chunk_id.contains(['/', '\\', '\0']) {
        Some("chunk id contains a path separator")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(DfsError::invalid_path(chunk_id, reason)),
        None => Ok(()),
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    pub async fn storage_test(storage: impl BlockStore) -> Result<()> {
        let chunk_id = "test.txt_chunk_1";
        let original_data = b"hello world\n";

        let written = storage.write(chunk_id, original_data).await?;
        assert_eq!(written as usize, original_data.len());
        // testing availbale chunks
        let available_chunks = storage.available_chunks().await?;
        assert_eq!(available_chunks, vec![chunk_id.to_string()]);

        let read_buf = storage.read(chunk_id).await?;
        assert_eq!(read_buf, original_data);

        // a copy written after the cutoff is kept
        let before_write = SystemTime::UNIX_EPOCH;
        assert!(!storage.delete_if_older(chunk_id, before_write).await?);
        assert_eq!(storage.available_chunks().await?.len(), 1);

        let far_future = SystemTime::now() + std::time::Duration::from_secs(3600);
        assert!(storage.delete_if_older(chunk_id, far_future).await?);
        let available_chunks = storage.available_chunks().await?;
        assert_eq!(available_chunks.len(), 0);
        assert!(matches!(
            storage.read(chunk_id).await,
            Err(DfsError::NotFound { .. })
        ));
        Ok(())
    }

    #[test]
    fn chunk_ids_are_single_components() {
        assert!(validate_chunk_id("a.txt_chunk_1").is_ok());
        assert!(validate_chunk_id("").is_err());
        assert!(validate_chunk_id("..").is_err());
        assert!(validate_chunk_id("../etc_chunk_1").is_err());
        assert!(validate_chunk_id("dir\\a_chunk_1").is_err());
    }
}
