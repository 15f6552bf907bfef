use crate::remote::batch::run_batch;
use crate::remote::executor::download_destination;
use crate::remote::{RemoteError, RemoteExecutor, Result};
use crate::types::{HostCommands, HostOutputs, HostPaths};
use async_trait::async_trait;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Connection settings handed to the system `ssh` and `scp` clients.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SshOptions {
    pub user: Option<String>,
    pub port: Option<u16>,
    pub private_key: Option<PathBuf>,
    #[serde(default, with = "serde_duration_opt")]
    pub connect_timeout: Option<Duration>,
    #[serde(default)]
    pub strict_host_key_checking: bool,
}

/// Runs command batches through the system OpenSSH client.
///
/// Each host gets exactly one `ssh` process per batch; hosts are driven
/// concurrently and the call returns once every host has finished.
pub struct SshExecutor {
    options: SshOptions,
    ssh_program: PathBuf,
    scp_program: PathBuf,
}

impl SshExecutor {
    pub fn new(options: SshOptions) -> Result<Self> {
        let ssh_program = which::which("ssh").map_err(|_| RemoteError::ClientNotFound {
            program: "ssh".to_string(),
        })?;
        let scp_program = which::which("scp").map_err(|_| RemoteError::ClientNotFound {
            program: "scp".to_string(),
        })?;

        Ok(Self {
            options,
            ssh_program,
            scp_program,
        })
    }

    pub fn options(&self) -> &SshOptions {
        &self.options
    }

    fn destination(&self, host: &str) -> String {
        match &self.options.user {
            Some(user) => format!("{user}@{host}"),
            None => host.to_string(),
        }
    }

    /// Options shared by `ssh` and `scp`. The port flag differs between the two.
    fn common_args(&self, port_flag: &str) -> Vec<String> {
        let mut args = vec!["-o".to_string(), "BatchMode=yes".to_string()];

        let policy = if self.options.strict_host_key_checking {
            "StrictHostKeyChecking=yes"
        } else {
            "StrictHostKeyChecking=no"
        };
        args.push("-o".to_string());
        args.push(policy.to_string());

        if let Some(timeout) = self.options.connect_timeout {
            args.push("-o".to_string());
            args.push(format!("ConnectTimeout={}", timeout.as_secs().max(1)));
        }
        if let Some(port) = self.options.port {
            args.push(port_flag.to_string());
            args.push(port.to_string());
        }
        if let Some(key) = &self.options.private_key {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }

        args
    }

    fn ssh_command(&self, host: &str) -> Command {
        let mut cmd = Command::new(&self.ssh_program);
        cmd.args(self.common_args("-p"))
            .arg(self.destination(host))
            .arg("sh")
            .arg("-s");
        cmd
    }

    async fn download_from_host(&self, host: &str, paths: &[String], destination: &Path) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }

        tokio::fs::create_dir_all(destination).await?;

        let mut cmd = Command::new(&self.scp_program);
        cmd.args(self.common_args("-P"));
        for path in paths {
            cmd.arg(format!("{}:{}", self.destination(host), path));
        }
        cmd.arg(destination);

        debug!(host = %host, files = paths.len(), destination = %destination.display(), "Downloading files");

        let output = cmd.output().await.map_err(|e| RemoteError::Spawn {
            host: host.to_string(),
            program: "scp".to_string(),
            source: e,
        })?;

        if !output.status.success() {
            return Err(RemoteError::TransferFailed {
                host: host.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    #[instrument(skip(self, commands), fields(hosts = commands.len()))]
    async fn exec(&self, commands: &HostCommands) -> Result<HostOutputs> {
        let batches = commands.iter().map(|(host, host_commands)| async move {
            let outputs = run_batch(host, self.ssh_command(host), host_commands).await?;
            Ok::<_, RemoteError>((host.clone(), outputs))
        });

        let results = try_join_all(batches).await?;
        Ok(results.into_iter().collect())
    }

    #[instrument(skip(self, remote_paths), fields(hosts = remote_paths.len()))]
    async fn download(&self, remote_paths: &HostPaths, local_path: &Path, prepend_host: bool) -> Result<()> {
        let transfers = remote_paths.iter().map(|(host, paths)| {
            let destination = download_destination(local_path, host, prepend_host);
            async move { self.download_from_host(host, paths, &destination).await }
        });

        try_join_all(transfers).await?;
        info!(hosts = remote_paths.len(), "Download complete");
        Ok(())
    }
}

mod serde_duration_opt {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.map(|d| d.as_secs()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs_opt = Option::<u64>::deserialize(deserializer)?;
        Ok(secs_opt.map(Duration::from_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor(options: SshOptions) -> SshExecutor {
        SshExecutor {
            options,
            ssh_program: PathBuf::from("ssh"),
            scp_program: PathBuf::from("scp"),
        }
    }

    #[test]
    fn test_destination_with_user() {
        let exec = executor(SshOptions {
            user: Some("tester".to_string()),
            ..Default::default()
        });
        assert_eq!(exec.destination("10.0.0.5"), "tester@10.0.0.5");
    }

    #[test]
    fn test_common_args_use_client_specific_port_flag() {
        let exec = executor(SshOptions {
            port: Some(2222),
            private_key: Some(PathBuf::from("/keys/id_ed25519")),
            connect_timeout: Some(Duration::from_secs(7)),
            ..Default::default()
        });

        let ssh_args = exec.common_args("-p");
        let scp_args = exec.common_args("-P");

        assert!(ssh_args.windows(2).any(|w| w == ["-p", "2222"]));
        assert!(scp_args.windows(2).any(|w| w == ["-P", "2222"]));
        assert!(ssh_args.windows(2).any(|w| w == ["-i", "/keys/id_ed25519"]));
        assert!(ssh_args.contains(&"ConnectTimeout=7".to_string()));
        assert!(ssh_args.contains(&"StrictHostKeyChecking=no".to_string()));
    }

    #[test]
    fn test_options_from_yaml() {
        let options: SshOptions = serde_yaml::from_str(
            "user: ignite\nport: 22\nprivate_key: /home/ignite/.ssh/id_rsa\nconnect_timeout: 10\n",
        )
        .unwrap();

        assert_eq!(options.user.as_deref(), Some("ignite"));
        assert_eq!(options.connect_timeout, Some(Duration::from_secs(10)));
        assert!(!options.strict_host_key_checking);
    }
}
