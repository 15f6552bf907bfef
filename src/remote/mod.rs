//! Command execution on cluster hosts.

pub mod batch;
pub mod error;
pub mod executor;
pub mod local;
pub mod scripted;
pub mod ssh;

pub use batch::{run_batch, BatchScript};
pub use error::{RemoteError, Result};
pub use executor::{download_destination, parse_jps, JavaProcess, RemoteExecutor};
pub use local::LocalExecutor;
pub use scripted::{DownloadCall, ScriptedExecutor};
pub use ssh::{SshExecutor, SshOptions};
