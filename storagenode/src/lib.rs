pub mod client;
pub mod config;
pub mod coordinator;
pub mod node_state;
pub mod peer;
pub mod server;
pub mod state_maintainer;
