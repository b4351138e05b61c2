use std::num::NonZeroUsize;

use utilities::logger::{instrument, trace, tracing};

/// One ordered slice of a file, ready to be written to a storage node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileChunk {
    pub chunk_id: String,
    pub sequence_index: u64,
    pub bytes: Vec<u8>,
}

pub fn chunk_id(base_name: &str, sequence_index: u64) -> String {
    format!("{base_name}_chunk_{}", sequence_index + 1)
}

/// Splits `content` into groups of `chunk_size_lines` lines. Line terminators
/// stay with their line; a trailing line without one still counts. The last
/// group may hold fewer lines and an empty file has no groups.
pub fn line_groups(content: &[u8], chunk_size_lines: NonZeroUsize) -> Vec<&[u8]> {
    let mut groups = vec![];
    let mut start = 0;
    let mut lines = 0;
    for (offset, byte) in content.iter().enumerate() {
        if *byte != b'\n' {
            continue;
        }
        lines += 1;
        if lines == chunk_size_lines.get() {
            groups.push(&content[start..=offset]);
            start = offset + 1;
            lines = 0;
        }
    }
    if start < content.len() {
        groups.push(&content[start..]);
    }
    groups
}

/// Names the groups `{base_name}_chunk_{n}` in order.
#[instrument(name = "file_chunker_into_chunks", skip(groups), fields(groups = groups.len()))]
pub fn into_chunks(base_name: &str, groups: Vec<&[u8]>) -> Vec<FileChunk> {
    let chunks: Vec<FileChunk> = groups
        .into_iter()
        .zip(0u64..)
        .map(|(bytes, sequence_index)| FileChunk {
            chunk_id: chunk_id(base_name, sequence_index),
            sequence_index,
            bytes: bytes.to_vec(),
        })
        .collect();
    trace!(chunks = chunks.len(), "file split");
    chunks
}
