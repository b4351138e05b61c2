use std::{path::Path, sync::Arc};

use utilities::{
    logger::{instrument, trace, tracing},
    result::Result,
};

use crate::dfs_client::DfsClient;

pub struct TransferHandler {
    client: Arc<DfsClient>,
}

impl TransferHandler {
    pub fn new(client: Arc<DfsClient>) -> Self {
        Self { client }
    }

    #[instrument(name = "command_upload", skip(self))]
    pub async fn upload(&self, local_file_path: &str, remote_file_path: &str) -> Result<String> {
        let metadata = tokio::fs::metadata(local_file_path)
            .await
            .map_err(|e| format!("Errror while reading file metadata : {e}"))?;
        if metadata.is_dir() {
            return Err(format!("Provided file path ({local_file_path}) is dir").into());
        }
        let content = tokio::fs::read(local_file_path)
            .await
            .map_err(|e| format!("Error while reading {local_file_path} : {e}"))?;
        trace!(len = content.len(), "read local file");
        let report = self.client.upload(remote_file_path, &content).await?;
        Ok(format!(
            "Stored {remote_file_path} in {} chunks (file id {})",
            report.acks.len(),
            report.file_id
        ))
    }

    #[instrument(name = "command_download", skip(self))]
    pub async fn download(&self, remote_file_path: &str, local_file_path: &str) -> Result<String> {
        let written = self
            .client
            .download_to(remote_file_path, Path::new(local_file_path))
            .await?;
        Ok(format!("Fetched {remote_file_path} into {local_file_path} ({written} bytes)"))
    }
}
