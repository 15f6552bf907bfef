use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("No default configuration directory on this platform")]
    NoDefaultLocation,

    #[error("Application {name} is not configured")]
    UnknownApp { name: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
