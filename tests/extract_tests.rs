//! Log attribute extraction against scripted and real logs

use gridharness::extract::{masks, AttributeSpec, AttributeType, AttributeValue, ExtractorError, LogAttributeExtractor};
use gridharness::remote::{LocalExecutor, RemoteExecutor, ScriptedExecutor};
use gridharness::routing::HostCommandRouter;
use gridharness::types::NodeRecord;
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;

const IGNITE_LOG: &str = "\
[12:00:01] Ignite node starting
[12:00:02] JMX (remote: on, port: 1234, auth: off, ssl: off)
[12:00:03] Topology snapshot [ver=1, servers=1, clients=0]
";

/// Answers probe commands as if every node's log held `log`.
fn log_responder(log: &'static str) -> ScriptedExecutor {
    ScriptedExecutor::new(move |_, cmd| {
        let mut parts = cmd.splitn(3, "; ");
        let node = parts.next().unwrap_or_default().trim_start_matches("echo ");
        let attribute = parts.next().unwrap_or_default().trim_start_matches("echo ");
        format!("{node}\n{attribute}\n{log}")
    })
}

fn extractor(executor: impl RemoteExecutor + 'static) -> LogAttributeExtractor {
    LogAttributeExtractor::new(HostCommandRouter::new(Arc::new(executor)))
}

fn cluster() -> BTreeMap<usize, NodeRecord> {
    let mut nodes = BTreeMap::new();
    nodes.insert(1, NodeRecord::new("h1").with_log("/logs/node.1.log"));
    nodes.insert(2, NodeRecord::new("h2").with_log("/logs/node.2.log"));
    nodes
}

fn specs(pairs: Vec<(&str, AttributeSpec)>) -> BTreeMap<String, AttributeSpec> {
    pairs.into_iter().map(|(name, spec)| (name.to_string(), spec)).collect()
}

#[tokio::test]
async fn test_jmx_port_is_read_as_int() {
    let extractor = extractor(log_responder(IGNITE_LOG));

    let attributes = extractor
        .extract(&cluster(), &[1, 2], &specs(vec![("jmx_port", masks::jmx_port())]))
        .await
        .unwrap();

    assert_eq!(attributes[&1]["jmx_port"], Some(AttributeValue::Int(1234)));
    assert_eq!(attributes[&2]["jmx_port"], Some(AttributeValue::Int(1234)));
}

#[tokio::test]
async fn test_several_attributes_in_one_dispatch() {
    let executor = Arc::new(log_responder(IGNITE_LOG));
    let extractor = LogAttributeExtractor::new(HostCommandRouter::new(executor.clone()));

    let specs = specs(vec![
        ("jmx_port", masks::jmx_port()),
        (
            "servers",
            AttributeSpec::new("Topology snapshot", r"servers=(\d+)").with_type(AttributeType::Int),
        ),
        ("missing", AttributeSpec::new("Node stopped", r"Node (stopped)")),
    ]);

    let attributes = extractor.extract(&cluster(), &[2], &specs).await.unwrap();

    assert_eq!(executor.call_count(), 1);
    assert_eq!(executor.commands_for("h2").len(), 3);
    assert!(executor.commands_for("h1").is_empty());

    let values = &attributes[&2];
    assert_eq!(values["jmx_port"], Some(AttributeValue::Int(1234)));
    assert_eq!(values["servers"], Some(AttributeValue::Int(1)));
    assert_eq!(values["missing"], None);
}

#[tokio::test]
async fn test_empty_inputs_are_rejected() {
    let extractor = extractor(ScriptedExecutor::echo());

    let err = extractor.extract(&cluster(), &[1], &BTreeMap::new()).await.unwrap_err();
    assert!(matches!(err, ExtractorError::NoAttributes));

    let err = extractor
        .extract(&cluster(), &[], &specs(vec![("jmx_port", masks::jmx_port())]))
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractorError::NoNodes));
}

#[tokio::test]
async fn test_unknown_node() {
    let extractor = extractor(log_responder(IGNITE_LOG));

    let err = extractor
        .extract(&cluster(), &[1, 9], &specs(vec![("jmx_port", masks::jmx_port())]))
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractorError::UnknownNode { node } if node == "9"));
}

#[tokio::test]
async fn test_non_numeric_int_attribute() {
    let extractor = extractor(log_responder("version=abc\n"));
    let spec = AttributeSpec::new("version=", r"version=(\w+)").with_type(AttributeType::Int);

    let err = extractor
        .extract(&cluster(), &[1], &specs(vec![("version", spec)]))
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractorError::AttributeType { raw, .. } if raw == "abc"));
}

#[tokio::test]
async fn test_extract_from_local_log_file() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("node.1.log");
    std::fs::write(&log, IGNITE_LOG).unwrap();

    let mut nodes = BTreeMap::new();
    nodes.insert(1, NodeRecord::new("localhost").with_log(log.to_string_lossy()));

    let extractor = extractor(LocalExecutor::new());
    let attributes = extractor
        .extract(
            &nodes,
            &[1],
            &specs(vec![
                ("jmx_port", masks::jmx_port()),
                ("started", masks::message("Ignite node starting")),
                ("stopped", masks::message("Ignite node stopped")),
            ]),
        )
        .await
        .unwrap();

    assert_eq!(attributes[&1]["jmx_port"], Some(AttributeValue::Int(1234)));
    assert_eq!(
        attributes[&1]["started"],
        Some(AttributeValue::Text("Ignite node starting".to_string()))
    );
    assert_eq!(attributes[&1]["stopped"], None);
}

#[tokio::test]
async fn test_log_path_with_spaces() {
    let dir = TempDir::new().unwrap();
    let run_dir = dir.path().join("run 1");
    std::fs::create_dir_all(&run_dir).unwrap();
    let log = run_dir.join("node.1.log");
    std::fs::write(&log, IGNITE_LOG).unwrap();

    let mut nodes = BTreeMap::new();
    nodes.insert(1, NodeRecord::new("localhost").with_log(log.to_string_lossy()));

    let attributes = extractor(LocalExecutor::new())
        .extract(&nodes, &[1], &specs(vec![("jmx_port", masks::jmx_port())]))
        .await
        .unwrap();

    assert_eq!(attributes[&1]["jmx_port"], Some(AttributeValue::Int(1234)));
}
