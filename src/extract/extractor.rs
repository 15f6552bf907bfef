use crate::extract::{AttributeSpec, AttributeType, AttributeValue, ExtractorError, Result};
use crate::routing::HostCommandRouter;
use crate::types::NodeRecord;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt::Display;
use tracing::{debug, instrument};

/// Extracted attributes per node. `None` means the log has no match yet.
pub type NodeAttributes<K> = BTreeMap<K, BTreeMap<String, Option<AttributeValue>>>;

/// Reads typed attributes out of node logs.
#[derive(Clone)]
pub struct LogAttributeExtractor {
    router: HostCommandRouter,
}

struct CompiledSpec<'a> {
    name: &'a str,
    spec: &'a AttributeSpec,
    local: Regex,
}

impl LogAttributeExtractor {
    pub fn new(router: HostCommandRouter) -> Self {
        Self { router }
    }

    /// Grep each node's log once per attribute and parse the results.
    ///
    /// All probes go out in a single routed dispatch. Attributes are probed
    /// in name order.
    #[instrument(skip_all, fields(nodes = ids.len(), attributes = specs.len()))]
    pub async fn extract<K>(
        &self,
        nodes: &BTreeMap<K, NodeRecord>,
        ids: &[K],
        specs: &BTreeMap<String, AttributeSpec>,
    ) -> Result<NodeAttributes<K>>
    where
        K: Ord + Clone + Display,
    {
        if ids.is_empty() {
            return Err(ExtractorError::NoNodes);
        }
        if specs.is_empty() {
            return Err(ExtractorError::NoAttributes);
        }

        let compiled = compile(specs)?;

        let mut selected: Vec<(&K, &NodeRecord)> = Vec::with_capacity(ids.len());
        for id in ids {
            let node = nodes
                .get(id)
                .ok_or_else(|| ExtractorError::UnknownNode { node: id.to_string() })?;
            if node.log.is_none() {
                return Err(ExtractorError::MissingLogPath { node: id.to_string() });
            }
            if !selected.iter().any(|(seen, _)| *seen == id) {
                selected.push((id, node));
            }
        }

        let outputs = self
            .router
            .dispatch_batch(selected.iter().copied(), |id, node| {
                let log = node.log.as_deref().unwrap_or_default();
                compiled
                    .iter()
                    .map(|attr| probe_command(&id.to_string(), attr.name, log, attr.spec))
                    .collect()
            })
            .await?;

        let mut result = NodeAttributes::new();
        for (id, blocks) in outputs {
            let node = id.to_string();
            let mut values = BTreeMap::new();
            for (attr, block) in compiled.iter().zip(blocks.iter()) {
                let text = block_body(&node, attr.name, block)?;
                let value = parse_value(&node, attr, &text)?;
                debug!(node = %node, attribute = %attr.name, found = value.is_some(), "Parsed attribute");
                values.insert(attr.name.to_string(), value);
            }
            result.insert(id, values);
        }

        Ok(result)
    }
}

fn compile(specs: &BTreeMap<String, AttributeSpec>) -> Result<Vec<CompiledSpec<'_>>> {
    specs
        .iter()
        .map(|(name, spec)| {
            let local = Regex::new(&spec.local_regex).map_err(|e| ExtractorError::InvalidRegex {
                attribute: name.clone(),
                source: e,
            })?;
            if local.captures_len() < 2 {
                return Err(ExtractorError::NoCaptureGroup {
                    attribute: name.clone(),
                });
            }
            Ok(CompiledSpec {
                name: name.as_str(),
                spec,
                local,
            })
        })
        .collect()
}

/// Shell command that prints the node id, the attribute name and then the
/// grep-filtered log.
pub fn probe_command(node: &str, attribute: &str, log: &str, spec: &AttributeSpec) -> String {
    let mut grep = vec!["grep".to_string()];
    if let Some(options) = spec.grep_options.as_deref().filter(|o| !o.trim().is_empty()) {
        grep.push(options.to_string());
    }
    grep.push(shell_words::quote(&spec.remote_regex).into_owned());

    format!(
        "echo {}; echo {}; cat {} | {}",
        shell_words::quote(node),
        shell_words::quote(attribute),
        shell_words::quote(log),
        grep.join(" ")
    )
}

/// Check the two header lines of a probe block and return what follows.
fn block_body(node: &str, attribute: &str, block: &str) -> Result<String> {
    let mut parts = block.splitn(3, '\n');
    let malformed = |reason: String| ExtractorError::MalformedOutput {
        node: node.to_string(),
        attribute: attribute.to_string(),
        reason,
    };

    let seen_node = parts.next().unwrap_or_default().trim_end();
    let seen_attribute = parts
        .next()
        .ok_or_else(|| malformed("missing attribute header".to_string()))?
        .trim_end();

    if seen_node != node || seen_attribute != attribute {
        return Err(malformed(format!(
            "headers read {seen_node:?}/{seen_attribute:?}"
        )));
    }

    Ok(parts.next().unwrap_or_default().to_string())
}

fn parse_value(node: &str, attr: &CompiledSpec<'_>, text: &str) -> Result<Option<AttributeValue>> {
    let joined;
    let haystack = if attr.spec.join_lines {
        joined = text.replace('\n', "");
        joined.as_str()
    } else {
        text
    };

    let Some(captures) = attr.local.captures(haystack) else {
        return Ok(None);
    };

    let convert = |raw: &str| coerce(node, attr.name, attr.spec.value_type, raw);

    if attr.spec.capture_all {
        let values = captures
            .iter()
            .skip(1)
            .map(|group| group.map(|m| convert(m.as_str())).transpose())
            .collect::<Result<Vec<_>>>()?;
        return Ok(Some(AttributeValue::List(values)));
    }

    captures.get(1).map(|m| convert(m.as_str())).transpose()
}

fn coerce(node: &str, attribute: &str, value_type: AttributeType, raw: &str) -> Result<AttributeValue> {
    match value_type {
        AttributeType::Text => Ok(AttributeValue::Text(raw.to_string())),
        AttributeType::Int => raw
            .trim()
            .parse::<i64>()
            .map(AttributeValue::Int)
            .map_err(|_| ExtractorError::AttributeType {
                node: node.to_string(),
                attribute: attribute.to_string(),
                raw: raw.to_string(),
            }),
    }
}
