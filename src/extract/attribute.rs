use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of an extracted value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    #[default]
    Text,
    Int,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Int(i64),
    Text(String),
    List(Vec<Option<AttributeValue>>),
}

impl AttributeValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Int(v) => write!(f, "{v}"),
            AttributeValue::Text(v) => f.write_str(v),
            AttributeValue::List(values) => {
                let parts: Vec<String> = values
                    .iter()
                    .map(|v| v.as_ref().map(|v| v.to_string()).unwrap_or_else(|| "-".to_string()))
                    .collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

/// How to find one attribute in a node log.
///
/// `remote_regex` is handed to `grep` on the host and only narrows the log
/// down to candidate lines. `local_regex` then runs here and its first
/// capture group is the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub remote_regex: String,
    pub local_regex: String,
    #[serde(default, rename = "type")]
    pub value_type: AttributeType,
    #[serde(default)]
    pub join_lines: bool,
    #[serde(default)]
    pub capture_all: bool,
    #[serde(default)]
    pub grep_options: Option<String>,
}

impl AttributeSpec {
    pub fn new(remote_regex: impl Into<String>, local_regex: impl Into<String>) -> Self {
        Self {
            remote_regex: remote_regex.into(),
            local_regex: local_regex.into(),
            value_type: AttributeType::Text,
            join_lines: false,
            capture_all: false,
            grep_options: None,
        }
    }

    /// Use the same expression for both phases.
    pub fn regex(regex: impl Into<String>) -> Self {
        let regex = regex.into();
        Self::new(regex.clone(), regex)
    }

    pub fn with_type(mut self, value_type: AttributeType) -> Self {
        self.value_type = value_type;
        self
    }

    /// Remove line breaks from the grep output before matching.
    pub fn join_lines(mut self) -> Self {
        self.join_lines = true;
        self
    }

    /// Return every capture group instead of the first one.
    pub fn capture_all(mut self) -> Self {
        self.capture_all = true;
        self
    }

    pub fn grep_options(mut self, options: impl Into<String>) -> Self {
        self.grep_options = Some(options.into());
        self
    }
}
