use crate::remote::{RemoteError, RemoteExecutor, Result};
use crate::wait::{WaitCondition, WaitOutcome};
use std::time::Duration;
use tracing::info;

/// Poll a log on one host until the last line matching `grep_text`
/// satisfies `compare`. The matching line is returned on success.
pub async fn wait_for_log_text<C>(
    executor: &dyn RemoteExecutor,
    host: &str,
    log_file: &str,
    grep_text: &str,
    mut compare: C,
    timeout: Duration,
    interval: Duration,
) -> Result<WaitOutcome<String>>
where
    C: FnMut(&str) -> bool,
{
    let command = format!("grep {} {}", shell_words::quote(grep_text), log_file);
    info!(host = %host, log_file = %log_file, pattern = %grep_text, "Waiting for log text");

    WaitCondition::new(timeout)
        .interval(interval)
        .wait(
            || {
                let command = command.clone();
                async move {
                    let mut outputs = executor.exec_on_host(host, &[command]).await?;
                    Ok::<_, RemoteError>(last_line(&outputs.pop().unwrap_or_default()))
                }
            },
            |line: &String| compare(line),
        )
        .await
}

fn last_line(output: &str) -> String {
    output
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default()
        .to_string()
}
