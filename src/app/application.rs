use crate::app::launcher::{launcher_for, NodeLauncher};
use crate::app::{AppError, Result};
use crate::config::HarnessConfig;
use crate::extract::{masks, AttributeSpec, AttributeValue, LogAttributeExtractor, NodeAttributes};
use crate::remote::RemoteExecutor;
use crate::routing::HostCommandRouter;
use crate::types::{HostPaths, KillSignal, NodeIdx, NodeRecord, NodeStatus};
use crate::wait::WaitCondition;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Nodes targeted by [`App::set_node_option`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeFilter {
    All,
    Ids(Vec<NodeIdx>),
}

impl NodeFilter {
    fn matches(&self, id: NodeIdx) -> bool {
        match self {
            NodeFilter::All => true,
            NodeFilter::Ids(ids) => ids.contains(&id),
        }
    }
}

/// A multi-node application running on cluster hosts.
///
/// The app owns its node records. Routing and extraction only ever see
/// borrowed snapshots, and every state change is applied here from the
/// outputs they return.
pub struct App {
    name: String,
    launcher: Box<dyn NodeLauncher>,
    router: HostCommandRouter,
    extractor: LogAttributeExtractor,
    nodes: BTreeMap<NodeIdx, NodeRecord>,
    home: String,
    log_dir: String,
}

impl App {
    /// `home` holds the node run directories, `log_dir` the node logs.
    pub fn new(
        name: impl Into<String>,
        launcher: Box<dyn NodeLauncher>,
        executor: Arc<dyn RemoteExecutor>,
        home: impl Into<String>,
        log_dir: impl Into<String>,
    ) -> Self {
        let router = HostCommandRouter::new(executor);
        let extractor = LogAttributeExtractor::new(router.clone());

        Self {
            name: name.into(),
            launcher,
            router,
            extractor,
            nodes: BTreeMap::new(),
            home: home.into(),
            log_dir: log_dir.into(),
        }
    }

    /// Build an application from its configuration section and add its nodes.
    pub fn from_config(name: &str, config: &HarnessConfig, executor: Arc<dyn RemoteExecutor>) -> Result<Self> {
        let app_config = config
            .app(name)
            .map_err(|e| AppError::MissingRequirement(e.to_string()))?;
        let launcher = launcher_for(name, app_config)?;

        let hosts = config.environment.hosts_for(name, app_config.role);
        if hosts.is_empty() {
            return Err(AppError::MissingRequirement(format!(
                "no environment hosts found for application '{name}'"
            )));
        }

        let home = format!("{}/{}", config.remote.module_dir(), name);
        let mut app = Self::new(name, launcher, executor, home, config.remote.test_dir.clone());
        app.add_nodes(&hosts, config.environment.nodes_per_host(name, app_config.role));
        Ok(app)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &BTreeMap<NodeIdx, NodeRecord> {
        &self.nodes
    }

    pub fn node(&self, id: NodeIdx) -> Option<&NodeRecord> {
        self.nodes.get(&id)
    }

    pub fn router(&self) -> &HostCommandRouter {
        &self.router
    }

    /// Replace the node table, e.g. with records saved by an earlier run.
    pub fn restore_nodes(&mut self, nodes: BTreeMap<NodeIdx, NodeRecord>) {
        self.nodes = nodes;
    }

    /// Add `per_host` nodes on every host.
    pub fn add_nodes(&mut self, hosts: &[String], per_host: usize) -> Vec<NodeIdx> {
        let mut added = Vec::with_capacity(hosts.len() * per_host);
        for host in hosts {
            for _ in 0..per_host {
                added.push(self.add_node(host.clone()));
            }
        }
        added
    }

    pub fn add_node(&mut self, host: impl Into<String>) -> NodeIdx {
        let id = self.nodes.keys().next_back().map(|last| last + 1).unwrap_or(0);
        let node = NodeRecord::new(host).with_run_dir(format!("{}/server.{id}", self.home));
        self.nodes.insert(id, node);
        id
    }

    /// Point the node at a fresh log file, bumping its run counter.
    pub fn rotate_node_log(&mut self, id: NodeIdx) -> Result<()> {
        let (log_dir, name) = (&self.log_dir, &self.name);
        let node = self.nodes.get_mut(&id).ok_or_else(|| AppError::NoSuchNode {
            app: name.clone(),
            node: id,
        })?;
        let run_counter = node.run_counter.map(|c| c + 1).unwrap_or(0);
        node.run_counter = Some(run_counter);
        node.log = Some(format!("{log_dir}/node.{id}.{name}.{run_counter}.log"));
        Ok(())
    }

    pub async fn start_nodes(&mut self) -> Result<()> {
        let ids: Vec<NodeIdx> = self.nodes.keys().copied().collect();
        self.start(&ids).await
    }

    pub async fn start_node(&mut self, id: NodeIdx) -> Result<()> {
        self.start(&[id]).await
    }

    async fn start(&mut self, ids: &[NodeIdx]) -> Result<()> {
        for &id in ids {
            self.rotate_node_log(id)?;
            self.node_mut(id)?.status = NodeStatus::Starting;
        }
        info!(app = %self.name, nodes = ?ids, "Starting nodes");

        let launcher = &self.launcher;
        let selected = select(&self.nodes, &self.name, ids)?;
        let outputs = self
            .router
            .dispatch_batch(selected, |id, node| launcher.start_commands(*id, node))
            .await?;

        for (id, out) in outputs {
            let node = self.nodes.get_mut(&id).ok_or_else(|| AppError::NoSuchNode {
                app: self.name.clone(),
                node: id,
            })?;
            let raw = out.last().map(|s| s.trim()).unwrap_or_default();
            let pid = raw
                .parse::<u32>()
                .ok()
                .filter(|pid| *pid > 0)
                .ok_or_else(|| AppError::StartFailed {
                    app: self.name.clone(),
                    node: id,
                    host: node.host.clone(),
                    reason: format!("no PID in start output {raw:?}"),
                })?;
            node.pid = Some(pid);
        }

        let selected = select(&self.nodes, &self.name, ids)?;
        let checks = self
            .router
            .dispatch_batch(selected, |id, node| launcher.check_commands(*id, node))
            .await?;

        for (id, out) in checks {
            let node = self.nodes.get_mut(&id).ok_or_else(|| AppError::NoSuchNode {
                app: self.name.clone(),
                node: id,
            })?;
            let running = out.first().map(|s| !s.trim().is_empty()).unwrap_or(false);
            if !running {
                return Err(AppError::CheckFailed {
                    app: self.name.clone(),
                    node: id,
                    host: node.host.clone(),
                });
            }
            node.status = NodeStatus::Started;
            info!(app = %self.name, node = id, host = %node.host, pid = ?node.pid, "Node started");
        }

        Ok(())
    }

    /// Signal the given nodes, or every node when `ids` is empty.
    ///
    /// Nodes without a PID are marked killed without contacting their host.
    pub async fn kill_nodes(&mut self, ids: &[NodeIdx], signal: KillSignal) -> Result<()> {
        let ids: Vec<NodeIdx> = if ids.is_empty() {
            self.nodes.keys().copied().collect()
        } else {
            ids.to_vec()
        };

        let mut targets = Vec::new();
        for id in ids {
            match self.nodes.get_mut(&id) {
                None => warn!(app = %self.name, node = id, "No node to kill"),
                Some(node) if node.pid.is_none() => {
                    info!(app = %self.name, node = id, "No PID for node: already killed");
                    node.status = NodeStatus::Killed;
                }
                Some(node) => {
                    info!(app = %self.name, node = id, host = %node.host, signal = signal.number(), "Killing node");
                    node.status = NodeStatus::Killing;
                    targets.push(id);
                }
            }
        }

        if targets.is_empty() {
            return Ok(());
        }

        let number = signal.number();
        let selected = select(&self.nodes, &self.name, &targets)?;
        self.router
            .dispatch(selected, |_, node| {
                format!("nohup kill -{number} {} >/dev/null 2>&1", node.pid.unwrap_or_default())
            })
            .await?;

        for id in targets {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.status = NodeStatus::Killed;
            }
        }
        Ok(())
    }

    pub async fn stop_nodes(&mut self, ids: &[NodeIdx]) -> Result<()> {
        self.kill_nodes(ids, KillSignal::Term).await
    }

    pub fn set_node_option(&mut self, filter: &NodeFilter, name: &str, value: serde_json::Value) {
        for (id, node) in self.nodes.iter_mut() {
            if filter.matches(*id) {
                node.extra.insert(name.to_string(), value.clone());
            }
        }
    }

    pub async fn grep_log(
        &self,
        ids: &[NodeIdx],
        specs: &BTreeMap<String, AttributeSpec>,
    ) -> Result<NodeAttributes<NodeIdx>> {
        Ok(self.extractor.extract(&self.nodes, ids, specs).await?)
    }

    /// Wait until `message` shows up in the logs of all given nodes, or of
    /// every node when `ids` is `None`. Returns false on timeout.
    pub async fn wait_message(
        &self,
        message: &str,
        ids: Option<&[NodeIdx]>,
        timeout: Duration,
        interval: Duration,
    ) -> Result<bool> {
        let ids: Vec<NodeIdx> = match ids {
            Some(ids) => ids.to_vec(),
            None => self.nodes.keys().copied().collect(),
        };
        let mut specs = BTreeMap::new();
        specs.insert("message".to_string(), masks::message(message));

        let app_name = self.name.clone();
        let text = message.to_string();
        let node_list = format!("{ids:?}");
        let timeout_secs = timeout.as_secs();

        let app = self;
        let ids_ref = &ids;
        let specs_ref = &specs;

        let outcome = WaitCondition::<NodeAttributes<NodeIdx>>::new(timeout)
            .interval(interval)
            .progress_every(3)
            .on_progress(move |elapsed, done| {
                if done {
                    info!(app = %app_name, message = %text, nodes = %node_list, elapsed_secs = elapsed, "Stopped waiting for message");
                } else {
                    info!(app = %app_name, message = %text, nodes = %node_list, "Waiting for message, {elapsed}/{timeout_secs} sec");
                }
            })
            .wait(
                move || app.grep_log(ids_ref, specs_ref),
                |found: &NodeAttributes<NodeIdx>| {
                    ids_ref.iter().all(|id| {
                        matches!(
                            found.get(id).and_then(|attrs| attrs.get("message")),
                            Some(Some(AttributeValue::Text(value))) if value == message
                        )
                    })
                },
            )
            .await?;

        Ok(outcome.is_success())
    }

    /// Fetch the current log of every node that has one.
    pub async fn download_logs(&self, local_path: &Path, prepend_host: bool) -> Result<()> {
        let mut paths = HostPaths::new();
        for node in self.nodes.values() {
            if let Some(log) = &node.log {
                paths.entry(node.host.clone()).or_default().push(log.clone());
            }
        }

        info!(app = %self.name, hosts = paths.len(), local_path = %local_path.display(), "Downloading node logs");
        self.router.executor().download(&paths, local_path, prepend_host).await?;
        Ok(())
    }

    /// Fetch files relative to each node's run directory.
    pub async fn download_node_files(
        &self,
        files: &BTreeMap<NodeIdx, Vec<String>>,
        local_path: &Path,
        prepend_host: bool,
    ) -> Result<()> {
        self.router
            .download_from_nodes(&self.nodes, files, local_path, prepend_host)
            .await?;
        Ok(())
    }

    fn node_mut(&mut self, id: NodeIdx) -> Result<&mut NodeRecord> {
        let app = &self.name;
        self.nodes.get_mut(&id).ok_or_else(|| AppError::NoSuchNode {
            app: app.clone(),
            node: id,
        })
    }
}

fn select<'a>(
    nodes: &'a BTreeMap<NodeIdx, NodeRecord>,
    app: &str,
    ids: &[NodeIdx],
) -> Result<Vec<(&'a NodeIdx, &'a NodeRecord)>> {
    ids.iter()
        .map(|id| {
            nodes.get_key_value(id).ok_or_else(|| AppError::NoSuchNode {
                app: app.to_string(),
                node: *id,
            })
        })
        .collect()
}
