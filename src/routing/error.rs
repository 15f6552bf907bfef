use crate::remote::RemoteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("No output for node {node} on host {host} at position {position} ({received} outputs received)")]
    MissingOutput {
        node: String,
        host: String,
        position: usize,
        received: usize,
    },

    #[error("Host {host} returned {received} outputs for {expected} commands")]
    OutputCountMismatch {
        host: String,
        expected: usize,
        received: usize,
    },

    #[error("Executor returned no outputs for host {host}")]
    MissingHost { host: String },

    #[error("Node {node} has no run directory")]
    MissingRunDir { node: String },

    #[error("Remote execution failed: {0}")]
    Remote(#[from] RemoteError),
}

pub type Result<T> = std::result::Result<T, RoutingError>;
