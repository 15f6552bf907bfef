use crate::remote::RemoteExecutor;
use crate::routing::{Result, RoutingError};
use crate::types::{HostCommands, HostPaths, NodeRecord};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Where a node's commands sit inside its host batch.
struct Slot<K> {
    node: K,
    host: String,
    start: usize,
    count: usize,
}

/// Groups per-node commands by host, sends one batch per host and hands
/// each node back the outputs of its own commands.
///
/// Outputs are matched to nodes by position only. Within a host, nodes keep
/// the order in which the caller's iterator yielded them.
#[derive(Clone)]
pub struct HostCommandRouter {
    executor: Arc<dyn RemoteExecutor>,
}

impl HostCommandRouter {
    pub fn new(executor: Arc<dyn RemoteExecutor>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> Arc<dyn RemoteExecutor> {
        Arc::clone(&self.executor)
    }

    /// Run one command per node and return each node's output.
    pub async fn dispatch<'a, K, I, F>(&self, nodes: I, mut command_fn: F) -> Result<BTreeMap<K, String>>
    where
        K: Ord + Clone + Display + 'a,
        I: IntoIterator<Item = (&'a K, &'a NodeRecord)>,
        F: FnMut(&K, &NodeRecord) -> String,
    {
        let outputs = self
            .dispatch_batch(nodes, |id, node| vec![command_fn(id, node)])
            .await?;

        Ok(outputs
            .into_iter()
            .filter_map(|(id, out)| out.into_iter().next().map(|o| (id, o)))
            .collect())
    }

    /// Run an ordered command list per node.
    ///
    /// A node's commands are appended to its host batch as one contiguous
    /// run, and the node receives exactly that run of outputs back.
    #[instrument(skip_all)]
    pub async fn dispatch_batch<'a, K, I, F>(
        &self,
        nodes: I,
        mut commands_fn: F,
    ) -> Result<BTreeMap<K, Vec<String>>>
    where
        K: Ord + Clone + Display + 'a,
        I: IntoIterator<Item = (&'a K, &'a NodeRecord)>,
        F: FnMut(&K, &NodeRecord) -> Vec<String>,
    {
        let mut slots = Vec::new();
        let mut commands = HostCommands::new();

        for (id, node) in nodes {
            let node_commands = commands_fn(id, node);
            let host_commands = commands.entry(node.host.clone()).or_default();
            slots.push(Slot {
                node: id.clone(),
                host: node.host.clone(),
                start: host_commands.len(),
                count: node_commands.len(),
            });
            host_commands.extend(node_commands);
        }

        if slots.is_empty() {
            return Ok(BTreeMap::new());
        }

        debug!(hosts = commands.len(), nodes = slots.len(), "Dispatching node commands");
        let outputs = self.executor.exec(&commands).await?;

        for (host, host_commands) in &commands {
            let received = outputs
                .get(host)
                .ok_or_else(|| RoutingError::MissingHost { host: host.clone() })?
                .len();
            if received > host_commands.len() {
                return Err(RoutingError::OutputCountMismatch {
                    host: host.clone(),
                    expected: host_commands.len(),
                    received,
                });
            }
        }

        let mut result = BTreeMap::new();
        for slot in slots {
            let host_outputs = outputs
                .get(&slot.host)
                .ok_or_else(|| RoutingError::MissingHost { host: slot.host.clone() })?;

            let end = slot.start + slot.count;
            if end > host_outputs.len() {
                return Err(RoutingError::MissingOutput {
                    node: slot.node.to_string(),
                    position: slot.start.max(host_outputs.len()),
                    received: host_outputs.len(),
                    host: slot.host,
                });
            }

            result.insert(slot.node, host_outputs[slot.start..end].to_vec());
        }

        Ok(result)
    }

    /// Fetch files relative to each node's run directory.
    ///
    /// Nodes absent from `files` contribute nothing, but their host still
    /// takes part in the transfer request.
    #[instrument(skip_all, fields(local_path = %local_path.display()))]
    pub async fn download_from_nodes<'a, K, I>(
        &self,
        nodes: I,
        files: &BTreeMap<K, Vec<String>>,
        local_path: &Path,
        prepend_host: bool,
    ) -> Result<()>
    where
        K: Ord + Clone + Display + 'a,
        I: IntoIterator<Item = (&'a K, &'a NodeRecord)>,
    {
        let mut paths = HostPaths::new();

        for (id, node) in nodes {
            let host_paths = paths.entry(node.host.clone()).or_default();
            let Some(node_files) = files.get(id) else {
                continue;
            };
            let run_dir = node
                .run_dir
                .as_deref()
                .ok_or_else(|| RoutingError::MissingRunDir { node: id.to_string() })?;
            host_paths.extend(node_files.iter().map(|file| format!("{run_dir}/{file}")));
        }

        info!(hosts = paths.len(), "Downloading node files");
        self.executor.download(&paths, local_path, prepend_host).await?;
        Ok(())
    }

    /// List a directory on every host in `hosts`.
    pub async fn list_dir(
        &self,
        hosts: &[String],
        dir: Option<&str>,
        params: Option<&str>,
    ) -> Result<BTreeMap<String, Vec<String>>> {
        let mut ls = match params {
            Some(params) => format!("ls {params}"),
            None => "ls".to_string(),
        };
        if let Some(dir) = dir {
            ls = format!("{ls} {dir}");
        }

        let commands: HostCommands = hosts
            .iter()
            .map(|host| (host.clone(), vec![ls.clone()]))
            .collect();
        let outputs = self.executor.exec(&commands).await?;

        Ok(outputs
            .into_iter()
            .map(|(host, out)| {
                let listing = out
                    .first()
                    .map(|text| text.trim_end().lines().map(str::to_string).collect())
                    .unwrap_or_default();
                (host, listing)
            })
            .collect())
    }
}
