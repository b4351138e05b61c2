mod namespace_handler;
mod transfer_handler;

use std::sync::Arc;

use namespace_handler::NamespaceHandler;
use transfer_handler::TransferHandler;
use utilities::result::Result;

use crate::dfs_client::DfsClient;

const HELP: &str = "
upload   : upload local_file_path remote_file_path
download : download remote_file_path local_file_path
list     : list
ls       : ls [remote_dir]
create   : create remote_file_path
delete   : delete remote_file_path
move     : move remote_src remote_dst
copy     : copy remote_src remote_dst
nodes    : nodes
metadata : metadata
exit     : exit
";

/// Parses one menu line and runs it against the client session.
pub struct CommandRunner {
    transfer_handler: TransferHandler,
    namespace_handler: NamespaceHandler,
}

impl CommandRunner {
    pub fn new(client: Arc<DfsClient>) -> Self {
        CommandRunner {
            transfer_handler: TransferHandler::new(client.clone()),
            namespace_handler: NamespaceHandler::new(client),
        }
    }

    pub async fn handle_input(&self, command: &str) -> Result<String> {
        let inputs: Vec<&str> = command.split_whitespace().collect();
        match inputs.as_slice() {
            ["upload", local, remote] => self.transfer_handler.upload(local, remote).await,
            ["download", remote, local] => self.transfer_handler.download(remote, local).await,
            ["list"] => self.namespace_handler.list().await,
            ["ls"] => self.namespace_handler.ls("/").await,
            ["ls", dir] => self.namespace_handler.ls(dir).await,
            ["create", path] => self.namespace_handler.create(path).await,
            ["delete", path] => self.namespace_handler.delete(path).await,
            ["move", src, dst] => self.namespace_handler.move_file(src, dst).await,
            ["copy", src, dst] => self.namespace_handler.copy(src, dst).await,
            ["nodes"] => self.namespace_handler.nodes().await,
            ["metadata"] => self.namespace_handler.metadata().await,
            ["help"] => Ok(HELP.to_owned()),
            [name, ..] if is_command(name) => {
                Err(format!("Invalid {name} command usage please use <help> to get help").into())
            }
            _ => Err("Invalid Command Please use valid command use help to list available commands".into()),
        }
    }
}

fn is_command(name: &str) -> bool {
    matches!(
        name,
        "upload" | "download" | "list" | "ls" | "create" | "delete" | "move" | "copy" | "nodes" | "metadata"
            | "help"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dfs_client::ClientOptions;
    use std::{num::NonZeroUsize, time::Duration};

    fn runner() -> CommandRunner {
        CommandRunner::new(Arc::new(DfsClient::new(ClientOptions {
            client_id: "client-test".into(),
            coordinator_addrs: "http://127.0.0.1:9".into(),
            chunk_size_lines: NonZeroUsize::new(10).unwrap(),
            write_attempts: 1,
            request_timeout: Duration::from_millis(300),
        })))
    }

    #[tokio::test]
    async fn help_lists_every_command() {
        let help = runner().handle_input("help\n").await.unwrap();
        for command in ["upload", "download", "list", "ls", "create", "delete", "move", "copy", "nodes", "metadata"] {
            assert!(help.contains(command), "{command} missing from help");
        }
    }

    #[tokio::test]
    async fn malformed_commands_are_rejected() {
        let runner = runner();
        let usage = runner.handle_input("move /a.txt").await.unwrap_err();
        assert!(usage.to_string().contains("Invalid move command usage"));
        assert!(runner.handle_input("format c:").await.is_err());
        let missing = runner.handle_input("upload /no/such/local/file /a.txt").await.unwrap_err();
        assert!(missing.to_string().contains("metadata"));
    }
}
