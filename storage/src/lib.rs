pub mod file_storage;
pub mod storage;

pub use file_storage::FileStorage;
pub use storage::{BlockStore, validate_chunk_id};
