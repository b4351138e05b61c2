use std::collections::{BTreeMap, BTreeSet, HashMap};

use proto::types::StorageNodeId;

/// chunk id -> storage nodes believed to hold a copy. Rebuilt from heartbeats,
/// never persisted.
#[derive(Debug, Default)]
pub struct ReplicaIndex {
    holders: HashMap<String, BTreeSet<StorageNodeId>>,
}

impl ReplicaIndex {
    pub fn record(&mut self, chunk_id: &str, nodes: impl IntoIterator<Item = StorageNodeId>) {
        self.holders.entry(chunk_id.to_owned()).or_default().extend(nodes);
    }
    /// The node's inventory replaces whatever the index believed about it.
    pub fn replace_inventory(&mut self, node: StorageNodeId, held_chunks: &[String]) {
        self.forget_node(node);
        for chunk_id in held_chunks {
            self.record(chunk_id, [node]);
        }
    }
    pub fn forget_node(&mut self, node: StorageNodeId) {
        self.holders.retain(|_, holders| {
            holders.remove(&node);
            !holders.is_empty()
        });
    }
    /// Holders that are in `live`, lowest id first.
    pub fn live_holders<V>(&self, chunk_id: &str, live: &BTreeMap<StorageNodeId, V>) -> Vec<StorageNodeId> {
        self.holders
            .get(chunk_id)
            .map(|holders| holders.iter().copied().filter(|id| live.contains_key(id)).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inventories_replace_earlier_beliefs() {
        let mut index = ReplicaIndex::default();
        index.record("a_chunk_1", [3, 1]);
        index.record("a_chunk_2", [1]);
        index.replace_inventory(1, &["a_chunk_2".to_owned(), "b_chunk_1".to_owned()]);

        let live: BTreeMap<StorageNodeId, ()> = [(1, ()), (3, ())].into_iter().collect();
        assert_eq!(index.live_holders("a_chunk_1", &live), vec![3]);
        assert_eq!(index.live_holders("a_chunk_2", &live), vec![1]);
        assert_eq!(index.live_holders("b_chunk_1", &live), vec![1]);

        index.forget_node(3);
        assert!(index.live_holders("a_chunk_1", &live).is_empty());
    }

    #[test]
    fn only_live_holders_are_returned_lowest_first() {
        let mut index = ReplicaIndex::default();
        index.record("a_chunk_1", [5, 2, 4]);
        let live: BTreeMap<StorageNodeId, ()> = [(4, ()), (5, ())].into_iter().collect();
        assert_eq!(index.live_holders("a_chunk_1", &live), vec![4, 5]);
    }
}
