use std::{
    collections::HashMap,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use proto::coordinator::ReclaimChunk;

/// Chunk ids no file references anymore, handed to every heartbeating node
/// until the retention window passes.
#[derive(Debug, Default)]
pub struct ReclaimQueue {
    pending: HashMap<String, SystemTime>,
}

impl ReclaimQueue {
    pub fn schedule(&mut self, chunk_ids: impl IntoIterator<Item = String>, now: SystemTime) {
        for chunk_id in chunk_ids {
            self.pending.insert(chunk_id, now);
        }
    }
    /// A chunk id referenced again must not be reclaimed.
    pub fn cancel(&mut self, chunk_id: &str) {
        self.pending.remove(chunk_id);
    }
    pub fn pending(&mut self, now: SystemTime, retention: Duration) -> Vec<ReclaimChunk> {
        self.pending.retain(|_, since| {
            now.duration_since(*since).map(|age| age <= retention).unwrap_or(true)
        });
        let mut reclaim: Vec<ReclaimChunk> = self
            .pending
            .iter()
            .map(|(chunk_id, since)| ReclaimChunk {
                chunk_id: chunk_id.clone(),
                unreferenced_since_ms: since
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_millis() as u64)
                    .unwrap_or_default(),
            })
            .collect();
        reclaim.sort_by(|a, b| a.chunk_id.cmp(&b.chunk_id));
        reclaim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_expire_and_can_be_cancelled() {
        let deleted_at = UNIX_EPOCH + Duration::from_secs(1_000);
        let mut queue = ReclaimQueue::default();
        queue.schedule(["a_chunk_1".to_owned(), "a_chunk_2".to_owned()], deleted_at);
        queue.cancel("a_chunk_2");

        let retention = Duration::from_secs(120);
        let reclaim = queue.pending(deleted_at + Duration::from_secs(5), retention);
        assert_eq!(
            reclaim,
            vec![ReclaimChunk {
                chunk_id: "a_chunk_1".into(),
                unreferenced_since_ms: 1_000_000,
            }]
        );
        assert!(queue.pending(deleted_at + Duration::from_secs(121), retention).is_empty());
    }
}
