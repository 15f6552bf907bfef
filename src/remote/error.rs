use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Failed to spawn {program} for host {host}: {source}")]
    Spawn {
        host: String,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Remote execution on {host} failed (exit code {code:?}): {stderr}")]
    ExecutionFailed {
        host: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Host {host} returned {received} outputs for {expected} commands")]
    IncompleteOutput {
        host: String,
        expected: usize,
        received: usize,
    },

    #[error("Transfer from {host} failed: {reason}")]
    TransferFailed { host: String, reason: String },

    #[error("{program} client not found in PATH")]
    ClientNotFound { program: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RemoteError>;
