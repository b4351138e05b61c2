use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use proto::{DfsError, types::StorageNodeId};
use serde::{Deserialize, Serialize};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};

use crate::catalog::namespace::Namespace;

const SNAPSHOT_VERSION: u32 = 1;

pub const FIRST_STORAGE_NODE_ID: StorageNodeId = 1;

fn first_storage_node_id() -> StorageNodeId {
    FIRST_STORAGE_NODE_ID
}

/// Everything the coordinator keeps across restarts.
#[derive(Debug, Deserialize)]
pub struct CatalogSnapshot {
    pub version: u32,
    #[serde(default = "first_storage_node_id")]
    pub next_storage_node_id: StorageNodeId,
    #[serde(default)]
    pub root: Namespace,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    next_storage_node_id: StorageNodeId,
    root: &'a Namespace,
}

impl CatalogSnapshot {
    /// `None` when no snapshot was ever written.
    pub async fn load(path: &Path) -> Result<Option<Self>, DfsError> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DfsError::storage(format!("{}: {e}", path.display()))),
        };
        let snapshot: CatalogSnapshot = serde_json::from_slice(&bytes)
            .map_err(|e| DfsError::storage(format!("{} is not a catalog snapshot: {e}", path.display())))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(DfsError::storage(format!(
                "{} has snapshot version {}, expected {SNAPSHOT_VERSION}",
                path.display(),
                snapshot.version
            )));
        }
        Ok(Some(snapshot))
    }

    /// Writes a temporary file next to `path`, fsyncs it and renames it over
    /// `path`. Readers see either the old or the new snapshot.
    pub async fn persist(
        path: &Path,
        root: &Namespace,
        next_storage_node_id: StorageNodeId,
    ) -> Result<(), DfsError> {
        let bytes = serde_json::to_vec_pretty(&SnapshotRef {
            version: SNAPSHOT_VERSION,
            next_storage_node_id,
            root,
        })
        .map_err(|e| DfsError::storage(format!("could not serialize the catalog: {e}")))?;

        let io_error = |target: &Path, e: std::io::Error| {
            DfsError::storage(format!("{}: {e}", target.display()))
        };
        let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(parent) = parent {
            fs::create_dir_all(parent).await.map_err(|e| io_error(parent, e))?;
        }
        let tmp_path = temporary_path(path);
        let mut tmp_file = File::create(&tmp_path).await.map_err(|e| io_error(&tmp_path, e))?;
        tmp_file.write_all(&bytes).await.map_err(|e| io_error(&tmp_path, e))?;
        tmp_file.sync_all().await.map_err(|e| io_error(&tmp_path, e))?;
        drop(tmp_file);
        if let Err(e) = fs::rename(&tmp_path, path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(io_error(path, e));
        }
        // make the rename itself durable
        if let Some(parent) = parent {
            if let Ok(dir) = File::open(parent).await {
                let _ = dir.sync_all().await;
            }
        }
        Ok(())
    }
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut file_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    file_name.push(".tmp");
    path.with_file_name(file_name)
}
