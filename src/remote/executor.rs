use crate::remote::{RemoteError, Result};
use crate::types::{HostCommands, HostOutputs, HostPaths, KillSignal};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

const JPS_COMMAND: &str = "jps -l";

/// A JVM listed by `jps -l`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaProcess {
    pub pid: u32,
    /// Main class or jar path, empty when the JVM did not report one.
    pub name: String,
}

/// Executes ordered command batches on remote hosts.
///
/// Implementations must return exactly one output per submitted command, in
/// submission order, for every host in the request. A host that cannot
/// produce all of its outputs is an error, never a shorter list.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run each host's command list as one batch and collect the outputs.
    async fn exec(&self, commands: &HostCommands) -> Result<HostOutputs>;

    /// Single host variant of [`RemoteExecutor::exec`].
    async fn exec_on_host(&self, host: &str, commands: &[String]) -> Result<Vec<String>> {
        let mut batch = HostCommands::new();
        batch.insert(host.to_string(), commands.to_vec());

        let mut outputs = self.exec(&batch).await?;
        outputs
            .remove(host)
            .ok_or_else(|| RemoteError::IncompleteOutput {
                host: host.to_string(),
                expected: commands.len(),
                received: 0,
            })
    }

    /// JVMs running on each of `hosts`, the `jps` tool itself left out.
    async fn jps(&self, hosts: &[String]) -> Result<BTreeMap<String, Vec<JavaProcess>>> {
        let commands: HostCommands = hosts
            .iter()
            .map(|host| (host.clone(), vec![JPS_COMMAND.to_string()]))
            .collect();

        let outputs = self.exec(&commands).await?;
        Ok(outputs
            .into_iter()
            .map(|(host, output)| {
                let processes = output.first().map(|o| parse_jps(o)).unwrap_or_default();
                (host, processes)
            })
            .collect())
    }

    /// Signal every JVM on `hosts` whose name contains `name`.
    ///
    /// Returns the signalled pids per host; hosts with no match are absent.
    async fn killall(&self, name: &str, signal: KillSignal, hosts: &[String]) -> Result<BTreeMap<String, Vec<u32>>> {
        let running = self.jps(hosts).await?;

        let mut commands = HostCommands::new();
        let mut killed = BTreeMap::new();
        for (host, processes) in running {
            let pids: Vec<u32> = processes
                .iter()
                .filter(|p| p.name.contains(name))
                .map(|p| p.pid)
                .collect();
            if pids.is_empty() {
                continue;
            }

            let list: Vec<String> = pids.iter().map(u32::to_string).collect();
            commands.insert(host.clone(), vec![format!("kill -{} {}", signal.number(), list.join(" "))]);
            killed.insert(host, pids);
        }

        if !commands.is_empty() {
            debug!(name = %name, hosts = commands.len(), signal = signal.number(), "Killing java processes");
            self.exec(&commands).await?;
        }
        Ok(killed)
    }

    /// Fetch remote files into `local_path`, one transfer per host.
    ///
    /// With `prepend_host` the files of host `h` land in `local_path/h/`.
    async fn download(
        &self,
        remote_paths: &HostPaths,
        local_path: &Path,
        prepend_host: bool,
    ) -> Result<()>;
}

/// Directory that receives the files downloaded from `host`.
pub fn download_destination(local_path: &Path, host: &str, prepend_host: bool) -> std::path::PathBuf {
    if prepend_host {
        local_path.join(host)
    } else {
        local_path.to_path_buf()
    }
}

/// Parse `jps -l` output into processes, skipping the `jps` tool itself.
pub fn parse_jps(output: &str) -> Vec<JavaProcess> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (pid, name) = line.split_once(' ').unwrap_or((line, ""));
            let pid = pid.parse().ok()?;
            Some(JavaProcess {
                pid,
                name: name.trim().to_string(),
            })
        })
        .filter(|p| !p.name.ends_with("sun.tools.jps.Jps"))
        .collect()
}
