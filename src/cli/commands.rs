use crate::app::App;
use crate::cli::options::{default_state_path, Commands};
use crate::cli::output::{print_attributes, print_host_outputs, print_java_processes, print_nodes};
use crate::cli::{CliError, Result};
use crate::config::HarnessConfig;
use crate::extract::{masks, AttributeSpec, AttributeType};
use crate::remote::{LocalExecutor, RemoteExecutor, SshExecutor};
use crate::types::{HostCommands, KillSignal, NodeIdx, NodeRecord};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Executes parsed CLI commands against one executor.
pub struct HarnessRunner {
    config: HarnessConfig,
    executor: Arc<dyn RemoteExecutor>,
}

impl HarnessRunner {
    pub fn new(config: HarnessConfig, executor: Arc<dyn RemoteExecutor>) -> Self {
        Self { config, executor }
    }

    /// SSH executor from the configuration, or the local one with `local`.
    pub fn executor_for(config: &HarnessConfig, local: bool) -> Result<Arc<dyn RemoteExecutor>> {
        if local {
            info!("Running host commands locally");
            return Ok(Arc::new(LocalExecutor::new()));
        }
        Ok(Arc::new(SshExecutor::new(config.ssh.options.clone())?))
    }

    pub async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Exec { hosts, command } => self.exec(hosts, command).await,
            Commands::Start { app, state } => self.start(&app, state).await,
            Commands::Grep {
                app,
                attribute,
                regex,
                local_regex,
                int,
                jmx,
                nodes,
                state,
            } => {
                let spec = if jmx {
                    masks::jmx_port()
                } else {
                    let remote = regex.unwrap_or_default();
                    let local = local_regex.unwrap_or_else(|| remote.clone());
                    let spec = AttributeSpec::new(remote, local);
                    if int {
                        spec.with_type(AttributeType::Int)
                    } else {
                        spec
                    }
                };
                let name = if jmx { "jmx_port".to_string() } else { attribute };
                self.grep(&app, name, spec, nodes, state).await
            }
            Commands::WaitMessage {
                app,
                message,
                nodes,
                timeout,
                interval,
                state,
            } => {
                self.wait_message(
                    &app,
                    &message,
                    nodes,
                    Duration::from_secs(timeout),
                    Duration::from_secs(interval),
                    state,
                )
                .await
            }
            Commands::Jps { hosts } => {
                let running = self.executor.jps(&self.target_hosts(hosts)?).await?;
                print_java_processes(&running);
                Ok(())
            }
            Commands::Killall { name, hosts, signal } => {
                let killed = self
                    .executor
                    .killall(&name, signal.into(), &self.target_hosts(hosts)?)
                    .await?;
                if killed.is_empty() {
                    info!(name = %name, "No matching java processes");
                }
                for (host, pids) in &killed {
                    println!("{host}: killed {pids:?}");
                }
                Ok(())
            }
            Commands::Kill {
                app,
                nodes,
                signal,
                state,
            } => self.kill(&app, nodes, signal.into(), state).await,
        }
    }

    /// Hosts named on the command line, or every configured SSH host.
    fn target_hosts(&self, hosts: Vec<String>) -> Result<Vec<String>> {
        let hosts = if hosts.is_empty() {
            self.config.ssh.hosts.clone()
        } else {
            hosts
        };
        if hosts.is_empty() {
            return Err(CliError::NoHosts);
        }
        Ok(hosts)
    }

    async fn exec(&self, hosts: Vec<String>, command: String) -> Result<()> {
        let commands: HostCommands = self
            .target_hosts(hosts)?
            .into_iter()
            .map(|host| (host, vec![command.clone()]))
            .collect();
        let outputs = self.executor.exec(&commands).await?;
        print_host_outputs(&outputs);
        Ok(())
    }

    async fn start(&self, name: &str, state: Option<PathBuf>) -> Result<()> {
        let mut app = App::from_config(name, &self.config, Arc::clone(&self.executor))?;
        let started = app.start_nodes().await;

        // nodes launched before a failure keep their pids for a later kill
        let path = state.unwrap_or_else(|| default_state_path(name));
        save_state(&path, app.nodes())?;
        started?;
        print_nodes(name, app.nodes());
        Ok(())
    }

    async fn grep(
        &self,
        name: &str,
        attribute: String,
        spec: AttributeSpec,
        nodes: Vec<NodeIdx>,
        state: Option<PathBuf>,
    ) -> Result<()> {
        let (app, _) = self.restore(name, state)?;
        let ids = select_ids(&app, nodes);

        let mut specs = BTreeMap::new();
        specs.insert(attribute, spec);
        let attributes = app.grep_log(&ids, &specs).await?;
        print_attributes(&attributes);
        Ok(())
    }

    async fn wait_message(
        &self,
        name: &str,
        message: &str,
        nodes: Vec<NodeIdx>,
        timeout: Duration,
        interval: Duration,
        state: Option<PathBuf>,
    ) -> Result<()> {
        let (app, _) = self.restore(name, state)?;
        let ids = select_ids(&app, nodes);

        if app.wait_message(message, Some(ids.as_slice()), timeout, interval).await? {
            println!("Found '{message}' on nodes {ids:?}");
        } else {
            warn!(app = %name, message = %message, "Message not found before timeout");
            println!("Timed out waiting for '{message}' on nodes {ids:?}");
        }
        Ok(())
    }

    async fn kill(&self, name: &str, nodes: Vec<NodeIdx>, signal: KillSignal, state: Option<PathBuf>) -> Result<()> {
        let (mut app, path) = self.restore(name, state)?;
        let killed = app.kill_nodes(&nodes, signal).await;
        save_state(&path, app.nodes())?;
        killed?;
        print_nodes(name, app.nodes());
        Ok(())
    }

    /// Rebuild an application with the node table saved by `start`.
    fn restore(&self, name: &str, state: Option<PathBuf>) -> Result<(App, PathBuf)> {
        let path = state.unwrap_or_else(|| default_state_path(name));
        let nodes = load_state(&path)?;
        let mut app = App::from_config(name, &self.config, Arc::clone(&self.executor))?;
        app.restore_nodes(nodes);
        Ok((app, path))
    }
}

fn select_ids(app: &App, nodes: Vec<NodeIdx>) -> Vec<NodeIdx> {
    if nodes.is_empty() {
        app.nodes().keys().copied().collect()
    } else {
        nodes
    }
}

pub fn save_state(path: &Path, nodes: &BTreeMap<NodeIdx, NodeRecord>) -> Result<()> {
    let state_error = |reason: String| CliError::State {
        path: path.to_path_buf(),
        reason,
    };
    let content = serde_json::to_string_pretty(nodes).map_err(|e| state_error(e.to_string()))?;
    std::fs::write(path, content).map_err(|e| state_error(e.to_string()))?;
    Ok(())
}

pub fn load_state(path: &Path) -> Result<BTreeMap<NodeIdx, NodeRecord>> {
    let state_error = |reason: String| CliError::State {
        path: path.to_path_buf(),
        reason,
    };
    let content = std::fs::read_to_string(path).map_err(|e| state_error(e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| state_error(e.to_string()))
}
