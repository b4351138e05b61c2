pub mod chunk_joiner;
pub mod command_runner;
pub mod config;
pub mod coordinator_service;
pub mod dfs_client;
pub mod file_chunker;
pub mod placement;
pub mod storage_node_service;
