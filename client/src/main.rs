use std::sync::Arc;

use client::{
    command_runner::CommandRunner,
    config::CONFIG,
    dfs_client::{ClientOptions, DfsClient},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use utilities::{
    logger::{info, init_logger},
    result::Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    let _gaurd = init_logger("Client", &CONFIG.client_id, &CONFIG.log_level, &CONFIG.log_base);
    let client = Arc::new(DfsClient::new(ClientOptions::from(&*CONFIG)));
    let _ping = client.spawn_session_ping(CONFIG.ping_interval());
    let command_executer = CommandRunner::new(client);
    info!(coordinator = %CONFIG.coordinator_addrs, "starting the Client");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(input) = lines.next_line().await? {
        if input.trim() == "exit" {
            break;
        }
        if input.trim().is_empty() {
            continue;
        }
        match command_executer.handle_input(&input).await {
            Ok(message) => println!("Success : {}", message),
            Err(message) => println!("Error : {}", message),
        }
    }
    Ok(())
}
