use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::interval};
use utilities::logger::{debug, error, info, instrument, tracing};

use crate::node_state::StorageNode;

/// Drives the node's side of the membership protocol: registers while the
/// node has no id, heartbeats once it has one.
pub struct StateMaintainer {
    node: Arc<StorageNode>,
}

impl StateMaintainer {
    pub fn new(node: Arc<StorageNode>) -> Self {
        Self { node }
    }

    #[instrument(name = "storage_node_state_maintainer", skip(self))]
    pub fn start(self, heartbeat_interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(heartbeat_interval);
            loop {
                ticker.tick().await;
                self.tick().await;
            }
        })
    }

    pub async fn tick(&self) {
        if self.node.storage_node_id().await.is_none() {
            match self.node.register().await {
                Ok(id) => info!(storage_node_id = id, "Re-registered with the coordinator"),
                Err(e) => error!(error = %e, "Registration failed, retrying on next tick"),
            }
            return;
        }
        match self.node.heartbeat().await {
            Ok(reclaimed) => debug!(reclaimed, "Heartbeat sent"),
            Err(e) => error!(error = %e, "Heartbeat failed"),
        }
    }
}
