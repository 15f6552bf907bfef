use crate::remote::batch::run_batch;
use crate::remote::executor::download_destination;
use crate::remote::{RemoteError, RemoteExecutor, Result};
use crate::types::{HostCommands, HostOutputs, HostPaths};
use async_trait::async_trait;
use futures::future::try_join_all;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, instrument};

/// Runs every "host" on the local machine through `sh`.
///
/// Host names are only used for grouping and error reporting, which makes
/// this executor useful for single-machine clusters and for tests.
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    shell: PathBuf,
}

impl LocalExecutor {
    pub fn new() -> Self {
        Self {
            shell: PathBuf::from("sh"),
        }
    }

    pub fn with_shell(shell: impl Into<PathBuf>) -> Self {
        Self { shell: shell.into() }
    }

    fn shell_command(&self) -> Command {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-s");
        cmd
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteExecutor for LocalExecutor {
    #[instrument(skip(self, commands), fields(hosts = commands.len()))]
    async fn exec(&self, commands: &HostCommands) -> Result<HostOutputs> {
        let batches = commands.iter().map(|(host, host_commands)| async move {
            let outputs = run_batch(host, self.shell_command(), host_commands).await?;
            Ok::<_, RemoteError>((host.clone(), outputs))
        });

        let results = try_join_all(batches).await?;
        Ok(results.into_iter().collect())
    }

    async fn download(&self, remote_paths: &HostPaths, local_path: &Path, prepend_host: bool) -> Result<()> {
        for (host, paths) in remote_paths {
            let destination = download_destination(local_path, host, prepend_host);
            tokio::fs::create_dir_all(&destination).await?;

            for path in paths {
                let source = Path::new(path);
                let file_name = source.file_name().ok_or_else(|| RemoteError::TransferFailed {
                    host: host.clone(),
                    reason: format!("{path} has no file name"),
                })?;
                let target = destination.join(file_name);

                debug!(host = %host, source = %path, target = %target.display(), "Copying file");
                tokio::fs::copy(source, &target)
                    .await
                    .map_err(|e| RemoteError::TransferFailed {
                        host: host.clone(),
                        reason: format!("{path}: {e}"),
                    })?;
            }
        }

        Ok(())
    }
}
