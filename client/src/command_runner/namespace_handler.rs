use std::sync::Arc;

use proto::types::EntryKind;
use utilities::result::Result;

use crate::dfs_client::DfsClient;

pub struct NamespaceHandler {
    client: Arc<DfsClient>,
}

impl NamespaceHandler {
    pub fn new(client: Arc<DfsClient>) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<String> {
        let files = self.client.list_files().await?;
        if files.is_empty() {
            return Ok("No files stored".to_owned());
        }
        Ok(format!("\n{}", files.join("\n")))
    }

    pub async fn ls(&self, dir: &str) -> Result<String> {
        let entries = self.client.list_directory(dir).await?;
        let lines: Vec<String> = entries
            .iter()
            .map(|entry| match entry.kind {
                EntryKind::Directory => format!("{}/", entry.name),
                EntryKind::File => entry.name.clone(),
            })
            .collect();
        Ok(format!("\n{}", lines.join("\n")))
    }

    pub async fn create(&self, path: &str) -> Result<String> {
        let file_id = self.client.create_file(path).await?;
        Ok(format!("Created {path} (file id {file_id})"))
    }

    pub async fn delete(&self, path: &str) -> Result<String> {
        self.client.delete_file(path).await?;
        Ok(format!("Deleted {path}"))
    }

    pub async fn move_file(&self, src: &str, dst: &str) -> Result<String> {
        self.client.move_file(src, dst).await?;
        Ok(format!("Moved {src} to {dst}"))
    }

    pub async fn copy(&self, src: &str, dst: &str) -> Result<String> {
        let file_id = self.client.copy_file(src, dst).await?;
        Ok(format!("Copied {src} to {dst} (file id {file_id})"))
    }

    pub async fn nodes(&self) -> Result<String> {
        let nodes = self.client.storage_nodes().await?;
        let lines: Vec<String> = nodes
            .iter()
            .map(|node| {
                format!(
                    "{} {} {:?} {:?}",
                    node.id,
                    node.addrs(),
                    node.status,
                    node.health.status
                )
            })
            .collect();
        Ok(format!("\n{}", lines.join("\n")))
    }

    /// One line per chunk record: path, sequence index, chunk id, owner, live holders.
    pub async fn metadata(&self) -> Result<String> {
        let files = self.client.catalog().await?;
        if files.is_empty() {
            return Ok("No files stored".to_owned());
        }
        let mut lines = vec![];
        for file in &files {
            let declared = file
                .chunk_count
                .map_or_else(|| "?".to_owned(), |count| count.to_string());
            lines.push(format!("{} ({} of {declared} chunks)", file.path, file.chunks.len()));
            for record in &file.chunks {
                let holders = file.replicas.get(&record.chunk_id).cloned().unwrap_or_default();
                lines.push(format!(
                    "  {} {} owner {} holders {holders:?}{}",
                    record.sequence_index,
                    record.chunk_id,
                    record.storage_node_id,
                    if record.degraded { " degraded" } else { "" }
                ));
            }
        }
        Ok(format!("\n{}", lines.join("\n")))
    }
}
