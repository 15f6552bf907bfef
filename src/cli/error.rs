use crate::app::AppError;
use crate::config::ConfigError;
use crate::remote::RemoteError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    App(#[from] AppError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Node state file {path}: {reason}")]
    State { path: PathBuf, reason: String },

    #[error("No hosts given and none configured under ssh.hosts")]
    NoHosts,
}

pub type Result<T> = std::result::Result<T, CliError>;
