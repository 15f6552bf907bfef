//! Single-process command batches.
//!
//! All commands for a host are sent as one shell script read from stdin.
//! Every command runs in its own subshell with stdin closed and is followed
//! by a marker line unique to the batch, so the combined stdout can be cut
//! back into one output per command.

use crate::remote::{RemoteError, Result};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct BatchScript {
    script: String,
    marker: String,
    expected: usize,
}

impl BatchScript {
    pub fn new(commands: &[String]) -> Self {
        let marker = format!("__gridharness_{}__", Uuid::new_v4().simple());
        let mut script = String::new();

        for command in commands {
            script.push_str("(\n");
            script.push_str(command);
            script.push_str("\n) </dev/null\n");
            script.push_str(&format!("printf '\\n%s\\n' '{marker}'\n"));
        }

        Self {
            script,
            marker,
            expected: commands.len(),
        }
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Cut the combined stdout into per-command outputs.
    ///
    /// Only complete segments (those followed by the marker) are returned, so
    /// a batch that died midway yields fewer outputs than commands.
    pub fn split_output(&self, stdout: &str) -> Vec<String> {
        let separator = format!("\n{}\n", self.marker);
        let mut outputs: Vec<String> = stdout.split(separator.as_str()).map(str::to_string).collect();
        // Text after the last marker belongs to no command.
        outputs.pop();
        outputs.truncate(self.expected);
        outputs
    }
}

/// Feed the batch script to `command` and split its stdout.
pub async fn run_batch(host: &str, mut command: Command, commands: &[String]) -> Result<Vec<String>> {
    let batch = BatchScript::new(commands);
    let program = command.as_std().get_program().to_string_lossy().to_string();

    debug!(host = %host, commands = commands.len(), "Running command batch");

    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|e| RemoteError::Spawn {
        host: host.to_string(),
        program: program.clone(),
        source: e,
    })?;

    // stdout is drained while the script streams in, a full pipe on either
    // side would otherwise block both processes
    let stdin = child.stdin.take();
    let script = batch.script().as_bytes();
    let feed = async move {
        if let Some(mut stdin) = stdin {
            stdin.write_all(script).await?;
            stdin.shutdown().await?;
        }
        Ok::<(), std::io::Error>(())
    };

    let (fed, output) = tokio::join!(feed, child.wait_with_output());
    let output = output?;
    match fed {
        // the shell exited before reading everything, its output tells why
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
            debug!(host = %host, "Batch shell closed stdin early");
        }
        other => other?,
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let outputs = batch.split_output(&stdout);

    if outputs.len() < batch.expected() {
        if !output.status.success() {
            return Err(RemoteError::ExecutionFailed {
                host: host.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        return Err(RemoteError::IncompleteOutput {
            host: host.to_string(),
            expected: batch.expected(),
            received: outputs.len(),
        });
    }

    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulate(batch: &BatchScript, outputs: &[&str]) -> String {
        outputs
            .iter()
            .map(|out| format!("{out}\n{}\n", batch.marker))
            .collect()
    }

    #[test]
    fn test_script_wraps_every_command() {
        let commands = vec!["echo one".to_string(), "cd /tmp; pwd".to_string()];
        let batch = BatchScript::new(&commands);

        assert_eq!(batch.expected(), 2);
        assert_eq!(batch.script().matches(&batch.marker).count(), 2);
        assert!(batch.script().contains("(\necho one\n) </dev/null"));
        assert!(batch.script().contains("(\ncd /tmp; pwd\n) </dev/null"));
    }

    #[test]
    fn test_split_preserves_order_and_trailing_newlines() {
        let commands = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let batch = BatchScript::new(&commands);

        let stdout = simulate(&batch, &["first\n", "", "third"]);
        let outputs = batch.split_output(&stdout);

        assert_eq!(outputs, vec!["first\n", "", "third"]);
    }

    #[test]
    fn test_split_drops_unterminated_segment() {
        let commands = vec!["a".to_string(), "b".to_string()];
        let batch = BatchScript::new(&commands);

        let mut stdout = simulate(&batch, &["first"]);
        stdout.push_str("partial output of a killed command");

        assert_eq!(batch.split_output(&stdout), vec!["first"]);
    }

    #[tokio::test]
    async fn test_run_batch_through_local_shell() {
        let mut command = Command::new("sh");
        command.arg("-s");
        let commands = vec![
            "echo hello".to_string(),
            "cd /; pwd".to_string(),
            "pwd >/dev/null; printf no-newline".to_string(),
        ];

        let outputs = run_batch("localhost", command, &commands).await.unwrap();

        assert_eq!(outputs.len(), 3);
        assert_eq!(outputs[0], "hello\n");
        assert_eq!(outputs[1], "/\n");
        assert_eq!(outputs[2], "no-newline");
    }

    #[tokio::test]
    async fn test_run_batch_reports_incomplete_output() {
        let mut command = Command::new("sh");
        command.arg("-s");
        let commands = vec!["echo ok".to_string(), "kill -9 $$".to_string(), "echo never".to_string()];

        let err = run_batch("localhost", command, &commands).await.unwrap_err();
        assert!(matches!(err, RemoteError::ExecutionFailed { .. } | RemoteError::IncompleteOutput { .. }));
    }

    #[tokio::test]
    async fn test_large_script_with_large_output() {
        let mut command = Command::new("sh");
        command.arg("-s");
        let mut commands = vec!["seq 1 200000".to_string()];
        commands.extend((0..3000).map(|i| format!("echo padding-{i}")));

        let outputs = tokio::time::timeout(
            std::time::Duration::from_secs(60),
            run_batch("localhost", command, &commands),
        )
        .await
        .expect("batch must not stall on full pipes")
        .unwrap();

        assert_eq!(outputs.len(), 3001);
        assert_eq!(outputs[0].lines().count(), 200000);
        assert!(outputs[0].ends_with("200000\n"));
        assert_eq!(outputs[3000], "padding-2999\n");
    }
}
