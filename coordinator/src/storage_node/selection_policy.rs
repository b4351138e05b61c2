use std::collections::BTreeMap;

use proto::types::{NodeStatus, StorageNodeId, StorageNodeView};

/// Decides who takes over or re-copies a chunk when holders go missing.
pub trait RepairSelectionPolicy {
    /// New owner for a record whose owner is gone. `live_holders` is sorted.
    fn new_owner(&self, live_holders: &[StorageNodeId]) -> Option<StorageNodeId>;
    /// Source holder plus up to `missing` live nodes lacking the chunk.
    fn repair_pair(
        &self,
        live_holders: &[StorageNodeId],
        live: &BTreeMap<StorageNodeId, StorageNodeView>,
        missing: usize,
    ) -> Option<(StorageNodeId, Vec<StorageNodeId>)>;
}

/// Always prefers the lowest ids, so repeated sweeps pick the same nodes.
#[derive(Debug, Default, Clone, Copy)]
pub struct LowestIdSelectionPolicy;

impl RepairSelectionPolicy for LowestIdSelectionPolicy {
    fn new_owner(&self, live_holders: &[StorageNodeId]) -> Option<StorageNodeId> {
        live_holders.iter().min().copied()
    }

    fn repair_pair(
        &self,
        live_holders: &[StorageNodeId],
        live: &BTreeMap<StorageNodeId, StorageNodeView>,
        missing: usize,
    ) -> Option<(StorageNodeId, Vec<StorageNodeId>)> {
        let source = self.new_owner(live_holders)?;
        let targets: Vec<StorageNodeId> = live
            .values()
            .filter(|node| node.status == NodeStatus::Active && !live_holders.contains(&node.id))
            .map(|node| node.id)
            .take(missing)
            .collect();
        if targets.is_empty() {
            return None;
        }
        Some((source, targets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proto::types::HealthReport;

    fn node(id: StorageNodeId, status: NodeStatus) -> (StorageNodeId, StorageNodeView) {
        (
            id,
            StorageNodeView {
                id,
                host: "127.0.0.1".into(),
                port: 7000 + id as u16,
                status,
                health: HealthReport::default(),
            },
        )
    }

    #[test]
    fn picks_lowest_holder_and_lowest_active_targets() {
        let live: BTreeMap<_, _> = [
            node(1, NodeStatus::Active),
            node(2, NodeStatus::Suspected),
            node(3, NodeStatus::Active),
            node(4, NodeStatus::Active),
            node(5, NodeStatus::Active),
        ]
        .into_iter()
        .collect();
        let policy = LowestIdSelectionPolicy;
        assert_eq!(policy.new_owner(&[4, 3]), Some(3));
        assert_eq!(policy.new_owner(&[]), None);
        assert_eq!(policy.repair_pair(&[3, 5], &live, 2), Some((3, vec![1, 4])));
        assert_eq!(policy.repair_pair(&[1, 3, 4, 5], &live, 1), None);
    }
}
