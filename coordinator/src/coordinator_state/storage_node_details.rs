use std::time::{Duration, Instant};

use proto::types::{HealthReport, NodeStatus, StorageNodeId, StorageNodeView};

#[derive(Debug, Clone)]
pub struct StorageNodeDetail {
    pub id: StorageNodeId,
    pub host: String,
    pub port: u16,
    pub heartbeat_instant: Instant,
    pub status: NodeStatus,
    pub health: HealthReport,
}

impl StorageNodeDetail {
    pub fn new(id: StorageNodeId, host: String, port: u16, now: Instant) -> Self {
        Self {
            id,
            host,
            port,
            heartbeat_instant: now,
            status: NodeStatus::Active,
            health: HealthReport::default(),
        }
    }
    pub fn mark_heartbeat(&mut self, now: Instant, health: HealthReport) {
        self.heartbeat_instant = now;
        self.status = NodeStatus::Active;
        self.health = health;
    }
    /// Re-derives the status from the silence since the last heartbeat.
    pub fn evaluate(&mut self, now: Instant, suspect_after: Duration, dead_after: Duration) -> NodeStatus {
        let silence = now.saturating_duration_since(self.heartbeat_instant);
        self.status = if silence > dead_after {
            NodeStatus::Dead
        } else if silence > suspect_after {
            NodeStatus::Suspected
        } else {
            NodeStatus::Active
        };
        self.status
    }
    pub fn addrs(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl From<&StorageNodeDetail> for StorageNodeView {
    fn from(detail: &StorageNodeDetail) -> Self {
        StorageNodeView {
            id: detail.id,
            host: detail.host.clone(),
            port: detail.port,
            status: detail.status,
            health: detail.health.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_moves_a_node_towards_dead() {
        let start = Instant::now();
        let mut detail = StorageNodeDetail::new(1, "127.0.0.1".into(), 6000, start);
        let suspect = Duration::from_secs(30);
        let dead = Duration::from_secs(60);
        assert_eq!(detail.evaluate(start + Duration::from_secs(10), suspect, dead), NodeStatus::Active);
        assert_eq!(detail.evaluate(start + Duration::from_secs(31), suspect, dead), NodeStatus::Suspected);
        detail.mark_heartbeat(start + Duration::from_secs(40), HealthReport::default());
        assert_eq!(detail.heartbeat_instant, start + Duration::from_secs(40));
        assert_eq!(detail.status, NodeStatus::Active);
        assert_eq!(detail.evaluate(start + Duration::from_secs(101), suspect, dead), NodeStatus::Dead);
        assert_eq!(detail.addrs(), "http://127.0.0.1:6000");
    }
}
