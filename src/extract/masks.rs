//! Ready-made attribute specs for common log lines.

use crate::extract::{AttributeSpec, AttributeType};

/// JMX port announced by a node at startup.
pub fn jmx_port() -> AttributeSpec {
    AttributeSpec::new(r"JMX (remote: on, port: [0-9]\+,", r"JMX \(remote: on, port: (\d+),").with_type(AttributeType::Int)
}

/// Literal message text. The captured value equals `text` once it is logged.
pub fn message(text: &str) -> AttributeSpec {
    AttributeSpec::new(text, format!("({})", regex::escape(text))).grep_options("-F")
}
