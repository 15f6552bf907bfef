//! Gridharness - multi-host test harness core
//!
//! This crate groups per-node shell commands into one batch per host, runs
//! them through a pluggable remote executor, extracts typed attributes from
//! node logs and polls for cluster conditions with bounded waits.

pub mod app;
pub mod cli;
pub mod config;
pub mod extract;
pub mod remote;
pub mod report;
pub mod routing;
pub mod types;
pub mod utility;
pub mod wait;

pub use app::App;
pub use extract::{AttributeSpec, AttributeValue, LogAttributeExtractor};
pub use remote::{LocalExecutor, RemoteExecutor, ScriptedExecutor, SshExecutor};
pub use routing::HostCommandRouter;
pub use types::*;
pub use wait::{WaitCondition, WaitOutcome};
