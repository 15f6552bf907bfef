use crate::remote::{RemoteError, RemoteExecutor, Result};
use crate::types::{HostCommands, HostOutputs, HostPaths};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

type BatchResponder = Box<dyn Fn(&str, &[String]) -> Vec<String> + Send + Sync>;

/// A recorded `download` call.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadCall {
    pub paths: HostPaths,
    pub local_path: PathBuf,
    pub prepend_host: bool,
}

/// In-memory executor that answers with canned outputs.
///
/// Every call is recorded so tests can assert on the exact batches sent.
/// The responder's result is returned verbatim, even when it has the wrong
/// length, so callers' output validation can be exercised.
pub struct ScriptedExecutor {
    responder: BatchResponder,
    failing_hosts: Mutex<HashSet<String>>,
    calls: Mutex<Vec<HostCommands>>,
    downloads: Mutex<Vec<DownloadCall>>,
}

impl ScriptedExecutor {
    /// Answer each command independently.
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&str, &str) -> String + Send + Sync + 'static,
    {
        Self::batch(move |host, commands| commands.iter().map(|cmd| respond(host, cmd)).collect())
    }

    /// Answer a whole host batch at once.
    pub fn batch<F>(respond: F) -> Self
    where
        F: Fn(&str, &[String]) -> Vec<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(respond),
            failing_hosts: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            downloads: Mutex::new(Vec::new()),
        }
    }

    /// Executor whose outputs are the commands themselves.
    pub fn echo() -> Self {
        Self::new(|_, cmd| cmd.to_string())
    }

    /// Make every batch sent to `host` fail with a non-zero exit.
    pub fn fail_host(self, host: impl Into<String>) -> Self {
        if let Ok(mut hosts) = self.failing_hosts.lock() {
            hosts.insert(host.into());
        }
        self
    }

    pub fn calls(&self) -> Vec<HostCommands> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    /// All commands sent to `host`, across every call.
    pub fn commands_for(&self, host: &str) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|call| call.get(host))
            .flatten()
            .cloned()
            .collect()
    }

    pub fn downloads(&self) -> Vec<DownloadCall> {
        self.downloads.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RemoteExecutor for ScriptedExecutor {
    async fn exec(&self, commands: &HostCommands) -> Result<HostOutputs> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(commands.clone());
        }

        let failing = self
            .failing_hosts
            .lock()
            .map(|hosts| hosts.clone())
            .unwrap_or_default();

        let mut outputs = HostOutputs::new();
        for (host, host_commands) in commands {
            if failing.contains(host) {
                return Err(RemoteError::ExecutionFailed {
                    host: host.clone(),
                    code: Some(255),
                    stderr: "scripted failure".to_string(),
                });
            }
            outputs.insert(host.clone(), (self.responder)(host, host_commands));
        }

        Ok(outputs)
    }

    async fn download(&self, remote_paths: &HostPaths, local_path: &Path, prepend_host: bool) -> Result<()> {
        if let Ok(mut downloads) = self.downloads.lock() {
            downloads.push(DownloadCall {
                paths: remote_paths.clone(),
                local_path: local_path.to_path_buf(),
                prepend_host,
            });
        }
        Ok(())
    }
}
