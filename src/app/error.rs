use crate::extract::ExtractorError;
use crate::remote::RemoteError;
use crate::routing::RoutingError;
use crate::types::NodeIdx;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Can't start {app} node {node} at host {host}: {reason}")]
    StartFailed {
        app: String,
        node: NodeIdx,
        host: String,
        reason: String,
    },

    #[error("Can't check {app} node {node} started at host {host}")]
    CheckFailed { app: String, node: NodeIdx, host: String },

    #[error("No node {node} in application {app}")]
    NoSuchNode { app: String, node: NodeIdx },

    #[error("Missing requirement: {0}")]
    MissingRequirement(String),

    #[error(transparent)]
    Extractor(#[from] ExtractorError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

pub type Result<T> = std::result::Result<T, AppError>;
