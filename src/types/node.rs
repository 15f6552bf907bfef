use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Index of a node inside one application.
pub type NodeIdx = usize;

/// Ordered command list per host. The position of a command is the only
/// correlation key back to the node that produced it.
pub type HostCommands = BTreeMap<String, Vec<String>>;

/// Ordered outputs per host, one per submitted command.
pub type HostOutputs = BTreeMap<String, Vec<String>>;

/// Remote file paths to fetch, grouped by host.
pub type HostPaths = BTreeMap<String, Vec<String>>;

/// Snapshot of a cluster member as seen by the harness core.
///
/// The core only reads `host` for grouping and the path fields for building
/// commands; the application layer owns every mutation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeRecord {
    pub host: String,
    pub log: Option<String>,
    pub run_dir: Option<String>,
    pub pid: Option<u32>,
    pub run_counter: Option<u32>,
    pub status: NodeStatus,
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl NodeRecord {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    pub fn with_log(mut self, log: impl Into<String>) -> Self {
        self.log = Some(log.into());
        self
    }

    pub fn with_run_dir(mut self, run_dir: impl Into<String>) -> Self {
        self.run_dir = Some(run_dir.into());
        self
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Look up a free-form option set through [`NodeRecord::extra`].
    pub fn option(&self, name: &str) -> Option<&serde_json::Value> {
        self.extra.get(name)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum NodeStatus {
    #[default]
    New,
    Starting,
    Started,
    Killing,
    Killed,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeStatus::New => "new",
            NodeStatus::Starting => "starting",
            NodeStatus::Started => "started",
            NodeStatus::Killing => "killing",
            NodeStatus::Killed => "killed",
        };
        f.write_str(s)
    }
}

/// Signal sent to node processes by `kill`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KillSignal {
    Term,
    Kill,
}

impl KillSignal {
    pub fn number(&self) -> i32 {
        match self {
            KillSignal::Term => 15,
            KillSignal::Kill => 9,
        }
    }
}
