use crate::routing::RoutingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("At least one node id must be passed")]
    NoNodes,

    #[error("At least one attribute must be passed")]
    NoAttributes,

    #[error("Unknown node {node}")]
    UnknownNode { node: String },

    #[error("Node {node} has no log file")]
    MissingLogPath { node: String },

    #[error("Invalid regex for attribute {attribute}: {source}")]
    InvalidRegex {
        attribute: String,
        #[source]
        source: regex::Error,
    },

    #[error("Local regex for attribute {attribute} has no capture group")]
    NoCaptureGroup { attribute: String },

    #[error("Attribute {attribute} of node {node} is not an integer: {raw:?}")]
    AttributeType {
        node: String,
        attribute: String,
        raw: String,
    },

    #[error("Malformed probe output for node {node}, attribute {attribute}: {reason}")]
    MalformedOutput {
        node: String,
        attribute: String,
        reason: String,
    },

    #[error(transparent)]
    Routing(#[from] RoutingError),
}

pub type Result<T> = std::result::Result<T, ExtractorError>;
