use serde::{Deserialize, Serialize};

pub type StorageNodeId = u64;

/// One chunk of a file as the catalog records it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub storage_node_id: StorageNodeId,
    pub sequence_index: u64,
    /// No live node is known to hold this chunk.
    #[serde(default)]
    pub degraded: bool,
}

/// Liveness as decided by the coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Active,
    Suspected,
    Dead,
}

impl NodeStatus {
    pub fn is_live(self) -> bool {
        !matches!(self, NodeStatus::Dead)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    #[default]
    Healthy,
    Impaired,
}

/// Health signal a storage node reports about itself.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub replication_shortfalls: u64,
    pub metadata_failures: u64,
    pub last_error: Option<String>,
}

impl HealthReport {
    pub fn record_replication_shortfall(&mut self, message: impl Into<String>) {
        self.status = HealthStatus::Impaired;
        self.replication_shortfalls += 1;
        self.last_error = Some(message.into());
    }
    pub fn record_metadata_failure(&mut self, message: impl Into<String>) {
        self.status = HealthStatus::Impaired;
        self.metadata_failures += 1;
        self.last_error = Some(message.into());
    }
    /// A fully replicated and acknowledged write clears the impairment; the
    /// counters keep their history.
    pub fn mark_healthy(&mut self) {
        self.status = HealthStatus::Healthy;
        self.last_error = None;
    }
}

/// A storage node as the coordinator hands it out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageNodeView {
    pub id: StorageNodeId,
    pub host: String,
    pub port: u16,
    pub status: NodeStatus,
    #[serde(default)]
    pub health: HealthReport,
}

impl StorageNodeView {
    pub fn addrs(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_counters_survive_recovery() {
        let mut health = HealthReport::default();
        health.record_replication_shortfall("chunk a_chunk_1 has 1 of 3 wanted copies");
        health.record_metadata_failure("coordinator timed out");
        assert_eq!(health.status, HealthStatus::Impaired);
        health.mark_healthy();
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.replication_shortfalls, 1);
        assert_eq!(health.metadata_failures, 1);
        assert!(health.last_error.is_none());
    }

    #[test]
    fn only_dead_nodes_are_not_live() {
        assert!(NodeStatus::Active.is_live());
        assert!(NodeStatus::Suspected.is_live());
        assert!(!NodeStatus::Dead.is_live());
    }
}
