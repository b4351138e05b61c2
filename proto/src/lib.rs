//! Wire protocol shared by the coordinator, the storage nodes and the client.
//!
//! Everything here crosses the network as JSON. Replies are wrapped in
//! [`Reply`] so that a [`DfsError`] raised on one side comes out unchanged on
//! the other.
pub mod codec;
pub mod coordinator;
pub mod error;
pub mod reply;
pub mod storage_node;
pub mod types;

pub use error::DfsError;
pub use reply::Reply;
