pub mod namespace;
pub mod snapshot;

use std::{collections::HashSet, path::PathBuf};

use proto::{
    DfsError,
    types::{ChunkRecord, DirEntry, StorageNodeId},
};
use tokio::sync::Mutex;
use utilities::logger::{debug, error, info, instrument, tracing};

use crate::catalog::{
    namespace::{FileEntry, Namespace, NamespacePath},
    snapshot::{CatalogSnapshot, FIRST_STORAGE_NODE_ID},
};

#[derive(Clone, Debug)]
struct CatalogState {
    namespace: Namespace,
    next_storage_node_id: StorageNodeId,
}

/// A chunk record whose owner is gone or which is marked degraded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrphanedRecord {
    pub path: String,
    pub record: ChunkRecord,
}

/// A record rewrite computed outside the catalog lock. It only applies if the
/// record still equals `expected`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordRepair {
    Reassign {
        path: String,
        expected: ChunkRecord,
        new_owner: StorageNodeId,
    },
    MarkDegraded {
        path: String,
        expected: ChunkRecord,
    },
}

/// Namespace tree plus the storage node id counter, persisted as one snapshot.
///
/// Every mutation runs against a copy under the lock; the copy is persisted
/// and only then swapped in, so a failed write changes nothing.
pub struct MetadataCatalog {
    catalog_file: PathBuf,
    state: Mutex<CatalogState>,
}

fn new_file_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl MetadataCatalog {
    #[instrument(name = "catalog_open", skip(catalog_file), fields(catalog_file = %catalog_file.as_ref().display()))]
    pub async fn open(catalog_file: impl AsRef<std::path::Path>) -> Result<Self, DfsError> {
        let catalog_file = catalog_file.as_ref().to_path_buf();
        let state = match CatalogSnapshot::load(&catalog_file).await? {
            Some(snapshot) => {
                info!(next_storage_node_id = snapshot.next_storage_node_id, "Loaded catalog snapshot");
                CatalogState {
                    namespace: snapshot.root,
                    next_storage_node_id: snapshot.next_storage_node_id,
                }
            }
            None => {
                info!("No catalog snapshot, starting with an empty namespace");
                CatalogState {
                    namespace: Namespace::default(),
                    next_storage_node_id: FIRST_STORAGE_NODE_ID,
                }
            }
        };
        Ok(MetadataCatalog {
            catalog_file,
            state: Mutex::new(state),
        })
    }

    async fn mutate<R>(
        &self,
        op: impl FnOnce(&mut CatalogState) -> Result<R, DfsError>,
    ) -> Result<R, DfsError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let result = op(&mut next)?;
        if let Err(e) =
            CatalogSnapshot::persist(&self.catalog_file, &next.namespace, next.next_storage_node_id).await
        {
            error!(error = %e, "Could not persist the catalog, mutation dropped");
            return Err(e);
        }
        *state = next;
        Ok(result)
    }

    #[instrument(name = "catalog_create_file", skip(self))]
    pub async fn create_file(&self, path: &str, chunk_count: Option<u64>) -> Result<String, DfsError> {
        let path = NamespacePath::parse(path)?;
        let file_id = new_file_id();
        let created = file_id.clone();
        self.mutate(|state| state.namespace.create_file(&path, created, chunk_count))
            .await?;
        info!(%file_id, "File created");
        Ok(file_id)
    }

    #[instrument(name = "catalog_append_chunk", skip(self, record), fields(chunk_id = %record.chunk_id, sequence_index = record.sequence_index))]
    pub async fn append_chunk(
        &self,
        path: &str,
        record: ChunkRecord,
        chunk_count: Option<u64>,
    ) -> Result<(), DfsError> {
        let path = NamespacePath::parse(path)?;
        self.mutate(|state| state.namespace.append_chunk(&path, record, chunk_count, new_file_id))
            .await?;
        debug!("Chunk appended");
        Ok(())
    }

    pub async fn get_file(&self, path: &str) -> Result<FileEntry, DfsError> {
        let path = NamespacePath::parse(path)?;
        let state = self.state.lock().await;
        state.namespace.file(&path).cloned()
    }

    /// Returns the chunk ids no file references anymore.
    #[instrument(name = "catalog_delete_file", skip(self))]
    pub async fn delete_file(&self, path: &str) -> Result<Vec<String>, DfsError> {
        let path = NamespacePath::parse(path)?;
        let unreferenced = self
            .mutate(|state| {
                let removed = state.namespace.remove_file(&path)?;
                let still_referenced = state.namespace.referenced_chunks();
                let mut unreferenced: Vec<String> = removed
                    .chunks
                    .into_iter()
                    .map(|record| record.chunk_id)
                    .filter(|chunk_id| !still_referenced.contains(chunk_id))
                    .collect();
                unreferenced.sort();
                unreferenced.dedup();
                Ok(unreferenced)
            })
            .await?;
        info!(unreferenced = unreferenced.len(), "File deleted");
        Ok(unreferenced)
    }

    #[instrument(name = "catalog_move_file", skip(self))]
    pub async fn move_file(&self, src_path: &str, dst_path: &str) -> Result<(), DfsError> {
        let src = NamespacePath::parse(src_path)?;
        let dst = NamespacePath::parse(dst_path)?;
        self.mutate(|state| state.namespace.move_file(&src, &dst)).await
    }

    #[instrument(name = "catalog_copy_file", skip(self))]
    pub async fn copy_file(&self, src_path: &str, dst_path: &str) -> Result<String, DfsError> {
        let src = NamespacePath::parse(src_path)?;
        let dst = NamespacePath::parse(dst_path)?;
        let file_id = new_file_id();
        let copied = file_id.clone();
        self.mutate(|state| state.namespace.copy_file(&src, &dst, copied)).await?;
        Ok(file_id)
    }

    /// Every file with its entry, taken under one lock.
    pub async fn files(&self) -> Vec<(String, FileEntry)> {
        let state = self.state.lock().await;
        let mut files = vec![];
        state
            .namespace
            .visit_files(|path, file| files.push((path.to_owned(), file.clone())));
        files
    }

    pub async fn list_all(&self) -> Vec<String> {
        self.state.lock().await.namespace.list_all()
    }

    pub async fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>, DfsError> {
        let path = NamespacePath::parse(path)?;
        self.state.lock().await.namespace.list_directory(&path)
    }

    pub async fn referenced_chunks(&self) -> HashSet<String> {
        self.state.lock().await.namespace.referenced_chunks()
    }

    /// Hands out a storage node id. A `previous` id that was issued before is
    /// given back; anything else draws from the persisted counter.
    #[instrument(name = "catalog_reserve_storage_node_id", skip(self))]
    pub async fn reserve_storage_node_id(
        &self,
        previous: Option<StorageNodeId>,
    ) -> Result<StorageNodeId, DfsError> {
        if let Some(previous) = previous {
            let state = self.state.lock().await;
            if (FIRST_STORAGE_NODE_ID..state.next_storage_node_id).contains(&previous) {
                return Ok(previous);
            }
        }
        self.mutate(|state| {
            let id = state.next_storage_node_id;
            state.next_storage_node_id += 1;
            Ok(id)
        })
        .await
    }

    /// Records whose owner fails `is_live`, plus every degraded record.
    pub async fn orphaned_records(&self, is_live: impl Fn(StorageNodeId) -> bool) -> Vec<OrphanedRecord> {
        let state = self.state.lock().await;
        let mut orphaned = vec![];
        state.namespace.visit_files(|path, file| {
            for record in &file.chunks {
                if record.degraded || !is_live(record.storage_node_id) {
                    orphaned.push(OrphanedRecord {
                        path: path.to_owned(),
                        record: record.clone(),
                    });
                }
            }
        });
        orphaned
    }

    /// Applies the repairs whose record is unchanged since planning, in one
    /// persisted mutation. Returns the ones that applied.
    #[instrument(name = "catalog_apply_repairs", skip(self, repairs), fields(planned = repairs.len()))]
    pub async fn apply_repairs(
        &self,
        repairs: Vec<RecordRepair>,
    ) -> Result<Vec<RecordRepair>, DfsError> {
        if repairs.is_empty() {
            return Ok(vec![]);
        }
        self.mutate(|state| {
            let mut applied = vec![];
            for repair in repairs {
                let (path, expected) = match &repair {
                    RecordRepair::Reassign { path, expected, .. } => (path, expected),
                    RecordRepair::MarkDegraded { path, expected } => (path, expected),
                };
                let Ok(path) = NamespacePath::parse(path) else {
                    continue;
                };
                let Ok(file) = state.namespace.file_mut(&path) else {
                    debug!(%path, "File vanished since planning");
                    continue;
                };
                let Some(record) = file.chunks.iter_mut().find(|record| *record == expected) else {
                    debug!(%path, chunk_id = %expected.chunk_id, "Record changed since planning");
                    continue;
                };
                match &repair {
                    RecordRepair::Reassign { new_owner, .. } => {
                        record.storage_node_id = *new_owner;
                        record.degraded = false;
                    }
                    RecordRepair::MarkDegraded { .. } => record.degraded = true,
                }
                applied.push(repair);
            }
            Ok(applied)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record(chunk_id: &str, storage_node_id: u64, sequence_index: u64) -> ChunkRecord {
        ChunkRecord {
            chunk_id: chunk_id.to_owned(),
            storage_node_id,
            sequence_index,
            degraded: false,
        }
    }

    #[tokio::test]
    async fn survives_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let catalog_file = dir.path().join("catalog").join("metadata.json");
        {
            let catalog = MetadataCatalog::open(&catalog_file).await.unwrap();
            catalog.create_file("/b/a.txt", Some(2)).await.unwrap();
            catalog
                .append_chunk("/b/a.txt", record("a.txt_chunk_1", 1, 0), None)
                .await
                .unwrap();
            assert_eq!(catalog.reserve_storage_node_id(None).await.unwrap(), 1);
            assert_eq!(catalog.reserve_storage_node_id(None).await.unwrap(), 2);
        }
        let catalog = MetadataCatalog::open(&catalog_file).await.unwrap();
        assert_eq!(catalog.list_all().await, vec!["/b/a.txt"]);
        let file = catalog.get_file("/b/a.txt").await.unwrap();
        assert_eq!(file.chunks, vec![record("a.txt_chunk_1", 1, 0)]);
        // the count declared at creation outlives the restart
        assert_eq!(file.chunk_count, Some(2));
        // ids are never reused, but a known id can be reclaimed
        assert_eq!(catalog.reserve_storage_node_id(None).await.unwrap(), 3);
        assert_eq!(catalog.reserve_storage_node_id(Some(2)).await.unwrap(), 2);
        assert_eq!(catalog.reserve_storage_node_id(Some(40)).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn failed_persistence_leaves_the_catalog_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let catalog_file = dir.path().join("metadata.json");
        let catalog = MetadataCatalog::open(&catalog_file).await.unwrap();
        catalog.create_file("/kept.txt", None).await.unwrap();

        // a directory in place of the snapshot makes the rename fail
        std::fs::remove_file(&catalog_file).unwrap();
        std::fs::create_dir(&catalog_file).unwrap();
        let result = catalog.create_file("/lost.txt", None).await;
        assert!(matches!(result, Err(DfsError::Storage { .. })));
        assert_eq!(catalog.list_all().await, vec!["/kept.txt"]);
    }

    #[tokio::test]
    async fn concurrent_appends_are_all_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Arc::new(MetadataCatalog::open(dir.path().join("metadata.json")).await.unwrap());
        let appends = (0..32u64).map(|index| {
            let catalog = catalog.clone();
            tokio::spawn(async move {
                catalog
                    .append_chunk(
                        "/big.txt",
                        record(&format!("big.txt_chunk_{}", index + 1), index % 3 + 1, index),
                        Some(32),
                    )
                    .await
            })
        });
        for append in futures::future::join_all(appends).await {
            append.unwrap().unwrap();
        }
        let file = catalog.get_file("/big.txt").await.unwrap();
        let indexes: Vec<u64> = file.chunks.iter().map(|r| r.sequence_index).collect();
        assert_eq!(indexes, (0..32).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn delete_reports_only_unreferenced_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = MetadataCatalog::open(dir.path().join("metadata.json")).await.unwrap();
        catalog
            .append_chunk("/a.txt", record("a.txt_chunk_1", 1, 0), Some(1))
            .await
            .unwrap();
        catalog.copy_file("/a.txt", "/c.txt").await.unwrap();
        catalog
            .append_chunk("/c.txt", record("c.txt_chunk_2", 1, 1), Some(2))
            .await
            .unwrap();

        assert!(catalog.delete_file("/a.txt").await.unwrap().is_empty());
        assert_eq!(
            catalog.delete_file("/c.txt").await.unwrap(),
            vec!["a.txt_chunk_1", "c.txt_chunk_2"]
        );
        assert_eq!(
            catalog.delete_file("/c.txt").await,
            Err(DfsError::not_found("/c.txt"))
        );
    }

    #[tokio::test]
    async fn repairs_skip_records_changed_since_planning() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = MetadataCatalog::open(dir.path().join("metadata.json")).await.unwrap();
        catalog
            .append_chunk("/a.txt", record("a.txt_chunk_1", 1, 0), Some(2))
            .await
            .unwrap();
        catalog
            .append_chunk("/a.txt", record("a.txt_chunk_2", 1, 1), Some(2))
            .await
            .unwrap();

        let orphaned = catalog.orphaned_records(|id| id != 1).await;
        assert_eq!(orphaned.len(), 2);

        // chunk 2 is rewritten by a fresh append before the repair lands
        catalog
            .append_chunk("/a.txt", record("a.txt_chunk_2", 3, 1), Some(2))
            .await
            .unwrap();
        let repairs = vec![
            RecordRepair::Reassign {
                path: "/a.txt".into(),
                expected: orphaned[0].record.clone(),
                new_owner: 2,
            },
            RecordRepair::MarkDegraded {
                path: "/a.txt".into(),
                expected: orphaned[1].record.clone(),
            },
        ];
        assert_eq!(catalog.apply_repairs(repairs.clone()).await.unwrap(), repairs[..1]);

        let file = catalog.get_file("/a.txt").await.unwrap();
        assert_eq!(file.chunks[0], record("a.txt_chunk_1", 2, 0));
        assert_eq!(file.chunks[1], record("a.txt_chunk_2", 3, 1));
    }
}
