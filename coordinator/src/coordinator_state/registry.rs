use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use proto::{
    DfsError,
    types::{HealthReport, NodeStatus, StorageNodeId, StorageNodeView},
};

use crate::coordinator_state::storage_node_details::StorageNodeDetail;

/// Storage nodes the coordinator currently knows, keyed by id.
#[derive(Debug, Default)]
pub struct StorageNodeRegistry {
    nodes: BTreeMap<StorageNodeId, StorageNodeDetail>,
}

impl StorageNodeRegistry {
    pub fn contains(&self, id: StorageNodeId) -> bool {
        self.nodes.contains_key(&id)
    }
    pub fn insert(&mut self, detail: StorageNodeDetail) {
        self.nodes.insert(detail.id, detail);
    }
    pub fn heartbeat(
        &mut self,
        id: StorageNodeId,
        now: Instant,
        health: HealthReport,
    ) -> Result<(), DfsError> {
        let detail = self.nodes.get_mut(&id).ok_or(DfsError::RegistrationRequired {
            storage_node_id: Some(id),
        })?;
        detail.mark_heartbeat(now, health);
        Ok(())
    }
    /// Updates every status and removes the nodes that turned dead.
    pub fn sweep(&mut self, now: Instant, suspect_after: Duration, dead_after: Duration) -> Vec<StorageNodeDetail> {
        let mut dead = vec![];
        self.nodes.retain(|_, detail| {
            if detail.evaluate(now, suspect_after, dead_after) == NodeStatus::Dead {
                dead.push(detail.clone());
                return false;
            }
            true
        });
        dead
    }
    /// Sorted by id.
    pub fn views(&self) -> Vec<StorageNodeView> {
        self.nodes.values().map(StorageNodeView::from).collect()
    }
    pub fn live_views(&self) -> BTreeMap<StorageNodeId, StorageNodeView> {
        self.nodes
            .values()
            .filter(|detail| detail.status.is_live())
            .map(|detail| (detail.id, StorageNodeView::from(detail)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_nodes_leave_the_registry() {
        let start = Instant::now();
        let mut registry = StorageNodeRegistry::default();
        registry.insert(StorageNodeDetail::new(2, "b".into(), 2, start));
        registry.insert(StorageNodeDetail::new(1, "a".into(), 1, start));
        registry
            .heartbeat(2, start + Duration::from_secs(50), HealthReport::default())
            .unwrap();

        let dead = registry.sweep(
            start + Duration::from_secs(61),
            Duration::from_secs(30),
            Duration::from_secs(60),
        );
        assert_eq!(dead.iter().map(|d| d.id).collect::<Vec<_>>(), vec![1]);
        assert!(!registry.contains(1));
        assert_eq!(registry.views().len(), 1);
        assert_eq!(
            registry.heartbeat(1, start, HealthReport::default()),
            Err(DfsError::RegistrationRequired { storage_node_id: Some(1) })
        );
    }

    #[test]
    fn views_are_sorted_by_id() {
        let now = Instant::now();
        let mut registry = StorageNodeRegistry::default();
        for id in [3, 1, 2] {
            registry.insert(StorageNodeDetail::new(id, "h".into(), 7000 + id as u16, now));
        }
        let ids: Vec<_> = registry.views().iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
