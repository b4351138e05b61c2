use std::collections::BTreeMap;

use proto::DfsError;
use utilities::logger::{instrument, trace, tracing, warn};

/// Collects downloaded chunks and only hands back the file once every
/// sequence index from `0` to `expected - 1` arrived exactly once.
#[derive(Debug)]
pub struct ChunkJoiner {
    path: String,
    expected: u64,
    chunks: BTreeMap<u64, Vec<u8>>,
    duplicates: Vec<u64>,
    unexpected: Vec<u64>,
}

impl ChunkJoiner {
    pub fn new(path: &str, expected: u64) -> Self {
        Self {
            path: path.to_owned(),
            expected,
            chunks: BTreeMap::new(),
            duplicates: vec![],
            unexpected: vec![],
        }
    }

    pub fn accept(&mut self, sequence_index: u64, bytes: Vec<u8>) {
        if sequence_index >= self.expected {
            warn!(sequence_index, expected = self.expected, "chunk outside the file");
            self.unexpected.push(sequence_index);
            return;
        }
        if self.chunks.insert(sequence_index, bytes).is_some() {
            warn!(sequence_index, "chunk received twice");
            self.duplicates.push(sequence_index);
        }
    }

    pub fn verify(&self) -> Result<(), DfsError> {
        let missing: Vec<u64> = (0..self.expected)
            .filter(|index| !self.chunks.contains_key(index))
            .collect();
        if missing.is_empty() && self.duplicates.is_empty() && self.unexpected.is_empty() {
            return Ok(());
        }
        Err(DfsError::IncompleteDownload {
            path: self.path.clone(),
            expected: self.expected,
            missing,
            duplicates: self.duplicates.clone(),
            unexpected: self.unexpected.clone(),
        })
    }

    /// Concatenates the chunks in sequence order after verifying them.
    #[instrument(name = "chunk_joiner_join", skip(self), fields(path = %self.path))]
    pub fn join(self) -> Result<Vec<u8>, DfsError> {
        self.verify()?;
        trace!(chunks = self.chunks.len(), "joining chunks");
        Ok(self.chunks.into_values().flatten().collect())
    }
}
