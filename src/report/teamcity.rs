use crate::report::{Result, TestFinish, TestHook, TestStart};
use async_trait::async_trait;
use chrono::Local;
use std::io::Write;
use std::sync::Mutex;

/// Escape a value for a TeamCity service message.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '|' | '\'' | '[' | ']' => {
                escaped.push('|');
                escaped.push(c);
            }
            '\n' => escaped.push_str("|n"),
            '\r' => escaped.push_str("|r"),
            '\t' => escaped.push_str("|t"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

pub fn test_started(name: &str, timestamp: &str) -> String {
    format!("##teamcity[testStarted timestamp='{timestamp}' name='{}']", escape(name))
}

pub fn test_finished(test: &TestFinish, timestamp: &str) -> String {
    if test.status.is_pass() {
        return format!("##teamcity[testFinished timestamp='{timestamp}' name='{}']", escape(&test.name));
    }
    format!(
        "##teamcity[testFailed timestamp='{timestamp}' name='{}' message='{}' details='{}']",
        escape(&test.name),
        escape(test.exception.as_deref().unwrap_or_default()),
        escape(test.stacktrace.as_deref().unwrap_or_default()),
    )
}

/// Prints TeamCity service messages, to stdout unless another writer is given.
pub struct TeamcityHook {
    out: Mutex<Box<dyn Write + Send>>,
}

impl TeamcityHook {
    pub fn new() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self { out: Mutex::new(out) }
    }

    fn emit(&self, line: &str) -> Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| std::io::Error::other("teamcity writer poisoned"))?;
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }
}

impl Default for TeamcityHook {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TestHook for TeamcityHook {
    async fn before_test(&self, test: &TestStart) -> Result<()> {
        self.emit(&test_started(&test.name, &timestamp()))
    }

    async fn after_test(&self, test: &TestFinish) -> Result<()> {
        self.emit(&test_finished(test, &timestamp()))
    }
}
