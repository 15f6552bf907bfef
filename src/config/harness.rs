use crate::config::{ConfigError, Result};
use crate::remote::SshOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Top-level harness configuration, usually read from YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub ssh: SshConfig,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub apps: BTreeMap<String, AppConfig>,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SshConfig {
    #[serde(flatten)]
    pub options: SshOptions,
    #[serde(default)]
    pub hosts: Vec<String>,
}

/// Which host list and per-host count an application draws from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Server,
    #[default]
    Client,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HostGroup {
    #[serde(default)]
    pub server_hosts: Vec<String>,
    #[serde(default)]
    pub client_hosts: Vec<String>,
    pub servers_per_host: Option<usize>,
    pub clients_per_host: Option<usize>,
}

impl HostGroup {
    fn hosts(&self, role: NodeRole) -> &[String] {
        match role {
            NodeRole::Server => &self.server_hosts,
            NodeRole::Client => &self.client_hosts,
        }
    }

    fn per_host(&self, role: NodeRole) -> Option<usize> {
        match role {
            NodeRole::Server => self.servers_per_host,
            NodeRole::Client => self.clients_per_host,
        }
    }
}

/// Host layout. Sections named after an application override the global
/// host lists for that application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub home: Option<String>,
    #[serde(default)]
    pub apps_use_global_hosts: bool,
    #[serde(default)]
    pub server_hosts: Vec<String>,
    #[serde(default)]
    pub client_hosts: Vec<String>,
    pub servers_per_host: Option<usize>,
    pub clients_per_host: Option<usize>,
    #[serde(flatten)]
    pub overrides: BTreeMap<String, HostGroup>,
}

impl EnvironmentConfig {
    fn global(&self) -> HostGroup {
        HostGroup {
            server_hosts: self.server_hosts.clone(),
            client_hosts: self.client_hosts.clone(),
            servers_per_host: self.servers_per_host,
            clients_per_host: self.clients_per_host,
        }
    }

    fn group_for(&self, app: &str) -> HostGroup {
        if self.apps_use_global_hosts {
            return self.global();
        }
        self.overrides.get(app).cloned().unwrap_or_else(|| self.global())
    }

    pub fn hosts_for(&self, app: &str, role: NodeRole) -> Vec<String> {
        self.group_for(app).hosts(role).to_vec()
    }

    /// Defaults to one node per host.
    pub fn nodes_per_host(&self, app: &str, role: NodeRole) -> usize {
        self.group_for(app).per_host(role).unwrap_or(1)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppKind {
    #[default]
    Java,
    Shell,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub kind: AppKind,
    #[serde(default)]
    pub role: NodeRole,
    pub jar: Option<String>,
    pub class_name: Option<String>,
    #[serde(default)]
    pub jvm_options: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,
    /// Start command for shell applications.
    pub command: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_test_dir")]
    pub test_dir: String,
    pub test_module_dir: Option<String>,
}

fn default_test_dir() -> String {
    "/tmp/gridharness".to_string()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            test_dir: default_test_dir(),
            test_module_dir: None,
        }
    }
}

impl RemoteConfig {
    /// Directory under which applications keep their node run directories.
    pub fn module_dir(&self) -> &str {
        self.test_module_dir.as_deref().unwrap_or(&self.test_dir)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub teamcity: bool,
    pub url: Option<String>,
    pub title: Option<String>,
}

impl HarnessConfig {
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "Loading configuration");
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_yaml(&content)
    }

    /// `~/.config/gridharness/config.yaml` on Linux.
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("gridharness").join("config.yaml"))
            .ok_or(ConfigError::NoDefaultLocation)
    }

    pub fn app(&self, name: &str) -> Result<&AppConfig> {
        self.apps.get(name).ok_or_else(|| ConfigError::UnknownApp {
            name: name.to_string(),
        })
    }
}
