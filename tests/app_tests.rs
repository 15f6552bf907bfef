//! Application lifecycle over a scripted cluster

use gridharness::app::{App, AppError, JavaLauncher, NodeFilter, ShellLauncher};
use gridharness::config::HarnessConfig;
use gridharness::remote::{LocalExecutor, ScriptedExecutor};
use gridharness::types::{KillSignal, NodeStatus};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Pretends to be a host where every start succeeds.
fn healthy_cluster() -> Arc<ScriptedExecutor> {
    let next_pid = Arc::new(AtomicU32::new(1000));
    Arc::new(ScriptedExecutor::new(move |_, cmd| {
        if cmd.ends_with("echo $!") {
            format!("{}\n", next_pid.fetch_add(1, Ordering::SeqCst))
        } else if cmd.contains("ps -p") {
            "ignite   1000     1  0 12:00 ?  00:00:05 java -server ...\n".to_string()
        } else {
            String::new()
        }
    }))
}

fn ignite(executor: Arc<ScriptedExecutor>) -> App {
    let launcher = JavaLauncher::new("/opt/ignite/libs/ignite.jar", "org.apache.ignite.startup.cmdline.CommandLineStartup");
    App::new("ignite", Box::new(launcher), executor, "/work/ignite", "/work/logs")
}

#[tokio::test]
async fn test_start_then_kill_all_nodes() {
    let executor = healthy_cluster();
    let mut app = ignite(executor.clone());
    app.add_nodes(&["h1".to_string(), "h2".to_string()], 2);

    app.start_nodes().await.unwrap();

    // one batch for the start commands, one for the checks
    assert_eq!(executor.call_count(), 2);
    let first = &executor.calls()[0];
    assert_eq!(first["h1"].len(), 4);
    assert_eq!(first["h1"][0], "mkdir -p /work/ignite/server.0");

    let mut pids: Vec<u32> = app.nodes().values().filter_map(|n| n.pid).collect();
    pids.sort_unstable();
    assert_eq!(pids, vec![1000, 1001, 1002, 1003]);
    assert!(app.nodes().values().all(|n| n.status == NodeStatus::Started));
    assert_eq!(app.node(3).unwrap().log.as_deref(), Some("/work/logs/node.3.ignite.0.log"));

    app.kill_nodes(&[], KillSignal::Kill).await.unwrap();

    assert_eq!(executor.call_count(), 3);
    assert!(executor.commands_for("h2").iter().any(|cmd| cmd.starts_with("nohup kill -9 ")));
    assert!(app.nodes().values().all(|n| n.status == NodeStatus::Killed));
}

#[tokio::test]
async fn test_restart_rotates_log() {
    let mut app = ignite(healthy_cluster());
    let id = app.add_node("h1");

    app.start_node(id).await.unwrap();
    app.stop_nodes(&[id]).await.unwrap();
    app.start_node(id).await.unwrap();

    let node = app.node(id).unwrap();
    assert_eq!(node.run_counter, Some(1));
    assert_eq!(node.log.as_deref(), Some("/work/logs/node.0.ignite.1.log"));
    assert_eq!(node.status, NodeStatus::Started);
}

#[tokio::test]
async fn test_start_without_pid_fails() {
    let executor = Arc::new(ScriptedExecutor::new(|_, _| String::new()));
    let mut app = ignite(executor);
    app.add_node("h1");

    let err = app.start_nodes().await.unwrap_err();
    assert!(matches!(err, AppError::StartFailed { node: 0, .. }));
}

#[tokio::test]
async fn test_dead_process_fails_check() {
    let executor = Arc::new(ScriptedExecutor::new(|_, cmd| {
        if cmd.ends_with("echo $!") {
            "4242\n".to_string()
        } else {
            String::new()
        }
    }));
    let mut app = ignite(executor);
    app.add_node("h1");

    let err = app.start_nodes().await.unwrap_err();
    assert!(matches!(err, AppError::CheckFailed { node: 0, .. }));
    assert_eq!(app.node(0).unwrap().pid, Some(4242));
}

#[tokio::test]
async fn test_kill_node_without_pid_skips_host() {
    let executor = healthy_cluster();
    let mut app = ignite(executor.clone());
    app.add_node("h1");

    app.kill_nodes(&[0], KillSignal::Term).await.unwrap();

    assert_eq!(executor.call_count(), 0);
    assert_eq!(app.node(0).unwrap().status, NodeStatus::Killed);
}

#[tokio::test]
async fn test_wait_message_sees_every_node() {
    let polls = Arc::new(AtomicU32::new(0));
    let p = polls.clone();
    let executor = Arc::new(ScriptedExecutor::new(move |_, cmd| {
        p.fetch_add(1, Ordering::SeqCst);
        let mut parts = cmd.splitn(3, "; ");
        let node = parts.next().unwrap_or_default().trim_start_matches("echo ");
        let attribute = parts.next().unwrap_or_default().trim_start_matches("echo ");
        format!("{node}\n{attribute}\nTopology snapshot [ver=2, servers=2]\n")
    }));

    let mut app = ignite(executor);
    app.add_nodes(&["h1".to_string(), "h2".to_string()], 1);
    for id in [0, 1] {
        app.rotate_node_log(id).unwrap();
    }

    let found = app
        .wait_message("Topology snapshot", None, Duration::from_secs(5), Duration::from_millis(10))
        .await
        .unwrap();
    assert!(found);
    assert_eq!(polls.load(Ordering::SeqCst), 2);

    let found = app
        .wait_message("Node stopped", Some(&[1][..]), Duration::ZERO, Duration::from_millis(10))
        .await
        .unwrap();
    assert!(!found);
}

#[tokio::test]
async fn test_download_logs_groups_by_host() {
    let executor = healthy_cluster();
    let mut app = ignite(executor.clone());
    app.add_nodes(&["h1".to_string(), "h2".to_string()], 1);
    app.add_node("h1");
    app.rotate_node_log(0).unwrap();
    app.rotate_node_log(2).unwrap();

    app.download_logs(Path::new("/tmp/collected"), true).await.unwrap();

    let downloads = executor.downloads();
    assert_eq!(downloads.len(), 1);
    assert_eq!(
        downloads[0].paths["h1"],
        vec!["/work/logs/node.0.ignite.0.log", "/work/logs/node.2.ignite.0.log"]
    );
    assert!(!downloads[0].paths.contains_key("h2"));
}

#[tokio::test]
async fn test_node_options_reach_the_java_command() {
    let executor = healthy_cluster();
    let mut app = ignite(executor.clone());
    app.add_nodes(&["h1".to_string()], 2);
    app.set_node_option(&NodeFilter::Ids(vec![1]), "jvm_options", serde_json::json!("-Xmx2g"));

    app.start_nodes().await.unwrap();

    let starts: Vec<String> = executor
        .commands_for("h1")
        .into_iter()
        .filter(|cmd| cmd.contains("nohup java"))
        .collect();
    assert_eq!(starts.len(), 2);
    assert!(!starts[0].contains("-Xmx2g"));
    assert!(starts[1].contains("-Xmx2g"));
}

#[test]
fn test_from_config_lays_out_nodes() {
    let config = HarnessConfig::from_yaml(
        r#"
environment:
  server_hosts: [10.0.0.1, 10.0.0.2]
  servers_per_host: 2
remote:
  test_dir: /var/tmp/run-1
apps:
  ignite:
    role: server
    jar: /opt/ignite/ignite.jar
    class_name: org.apache.ignite.startup.cmdline.CommandLineStartup
"#,
    )
    .unwrap();

    let app = App::from_config("ignite", &config, Arc::new(ScriptedExecutor::echo())).unwrap();

    assert_eq!(app.nodes().len(), 4);
    assert_eq!(app.node(2).unwrap().host, "10.0.0.2");
    assert_eq!(app.node(2).unwrap().run_dir.as_deref(), Some("/var/tmp/run-1/ignite/server.2"));
}

#[test]
fn test_from_config_without_hosts() {
    let config = HarnessConfig::from_yaml(
        r#"
apps:
  piclient:
    kind: shell
    command: ./piclient.sh
"#,
    )
    .unwrap();

    let Err(err) = App::from_config("piclient", &config, Arc::new(ScriptedExecutor::echo())) else {
        panic!("an app without hosts must be rejected");
    };
    assert!(matches!(err, AppError::MissingRequirement(_)));
}

#[tokio::test]
async fn test_shell_app_node_files_download_locally() {
    let remote = TempDir::new().unwrap();
    let local = TempDir::new().unwrap();
    let home = remote.path().to_string_lossy().to_string();

    let mut app = App::new(
        "piclient",
        Box::new(ShellLauncher::new("./piclient.sh")),
        Arc::new(LocalExecutor::new()),
        home.clone(),
        home,
    );
    let id = app.add_node("localhost");

    let run_dir = remote.path().join("server.0");
    std::fs::create_dir_all(&run_dir).unwrap();
    std::fs::write(run_dir.join("result.txt"), "pi=3.14159\n").unwrap();

    let mut files = std::collections::BTreeMap::new();
    files.insert(id, vec!["result.txt".to_string()]);
    app.download_node_files(&files, local.path(), true).await.unwrap();

    let fetched = local.path().join("localhost").join("result.txt");
    assert_eq!(std::fs::read_to_string(fetched).unwrap(), "pi=3.14159\n");
}
