use std::{sync::Arc, time::Duration};

use storage::FileStorage;
use storagenode::{
    config::CONFIG,
    node_state::{StorageNode, StorageNodeOptions},
    server,
    state_maintainer::StateMaintainer,
};
use tokio::net::TcpListener;
use utilities::{
    logger::{error, info, init_logger},
    result::Result,
    retry_policy::retry_with_backoff,
};

#[tokio::main]
async fn main() -> Result<()> {
    let _gaurd = init_logger("StorageNode", &CONFIG.node_name, &CONFIG.log_level, &CONFIG.log_base);
    let store = match FileStorage::open(&CONFIG.storage_config.storage_path).await {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "Error while opening the block store Hence shuting down");
            return Err(e.into());
        }
    };
    let node = Arc::new(StorageNode::new(Arc::new(store), StorageNodeOptions::from(&*CONFIG)));

    // serve before registering so peers can reach us as soon as we are listed
    let listener = TcpListener::bind(&CONFIG.listen_addrs).await?;
    info!(addrs = %CONFIG.listen_addrs, "Storage node http server starting");
    let server = tokio::spawn(server::serve(listener, node.clone()));

    let id = retry_with_backoff(
        || node.register(),
        CONFIG.register_retries,
        Duration::from_millis(500),
    )
    .await?;
    info!(storage_node_id = id, "Storage node ready");
    let _maintainer = StateMaintainer::new(node).start(CONFIG.heartbeat_interval());

    server.await??;
    Ok(())
}
