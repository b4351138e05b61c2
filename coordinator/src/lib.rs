pub mod catalog;
pub mod client_handler;
pub mod config;
pub mod coordinator_state;
pub mod server;
pub mod state_maintainer;
pub mod storage_node;
