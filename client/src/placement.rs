use proto::{DfsError, types::StorageNodeView};

/// Round-robin assignment of chunks to storage nodes. The cursor lives as long
/// as the client session, so successive uploads continue the rotation.
#[derive(Debug, Default)]
pub struct RoundRobinPlacement {
    cursor: usize,
}

impl RoundRobinPlacement {
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Chunk `i` goes to `nodes[(cursor + i) % nodes.len()]`; the cursor then
    /// moves forward by `chunk_count`. Returns the starting offset of each
    /// chunk so a failed write can rotate on from it.
    pub fn place_chunks(&mut self, chunk_count: usize, nodes: &[StorageNodeView]) -> Result<Vec<usize>, DfsError> {
        if nodes.is_empty() {
            return Err(DfsError::unreachable("no live storage node to place chunks on"));
        }
        let placed = (0..chunk_count)
            .map(|i| (self.cursor + i) % nodes.len())
            .collect();
        self.cursor = (self.cursor + chunk_count) % nodes.len();
        Ok(placed)
    }
}

/// Nodes tried for a chunk placed at `start`: the placed node first, then the
/// following ones in rotation, at most `attempts` of them.
pub fn rotation(start: usize, node_count: usize, attempts: usize) -> impl Iterator<Item = usize> {
    (0..attempts.min(node_count)).map(move |step| (start + step) % node_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proto::types::{HealthReport, NodeStatus};

    fn nodes(count: u64) -> Vec<StorageNodeView> {
        (1..=count)
            .map(|id| StorageNodeView {
                id,
                host: "127.0.0.1".into(),
                port: 6000 + id as u16,
                status: NodeStatus::Active,
                health: HealthReport::default(),
            })
            .collect()
    }

    #[test]
    fn cursor_carries_over_between_uploads() {
        let nodes = nodes(3);
        let mut placement = RoundRobinPlacement::default();
        assert_eq!(placement.place_chunks(2, &nodes).unwrap(), vec![0, 1]);
        assert_eq!(placement.cursor(), 2);
        assert_eq!(placement.place_chunks(4, &nodes).unwrap(), vec![2, 0, 1, 2]);
        assert_eq!(placement.cursor(), 0);
    }

    #[test]
    fn no_nodes_is_unreachable() {
        let mut placement = RoundRobinPlacement::default();
        assert!(matches!(
            placement.place_chunks(1, &[]),
            Err(DfsError::NodeUnreachable { .. })
        ));
        assert_eq!(placement.place_chunks(0, &nodes(2)).unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn rotation_wraps_and_is_bounded() {
        assert_eq!(rotation(2, 3, 3).collect::<Vec<_>>(), vec![2, 0, 1]);
        assert_eq!(rotation(1, 2, 5).collect::<Vec<_>>(), vec![1, 0]);
        assert_eq!(rotation(0, 4, 1).collect::<Vec<_>>(), vec![0]);
    }
}
