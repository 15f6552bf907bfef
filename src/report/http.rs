use crate::report::{Result, TestFinish, TestHook, TestStart, TestStatus};
use async_trait::async_trait;
use chrono::{Local, TimeZone};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, OnceLock};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportTime {
    pub start: i64,
    pub start_pretty: String,
    pub end: i64,
    pub end_pretty: String,
    pub diff: String,
}

/// JSON body posted for every finished test.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub title: String,
    pub test_case_id: u64,
    pub run_id: String,
    pub time: ReportTime,
    pub status: String,
    pub data: serde_json::Map<String, serde_json::Value>,
    pub steps: Vec<serde_json::Value>,
    pub suites: Vec<String>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<String>,
}

/// Posts test results to a report collector over HTTP.
///
/// Delivery problems are logged and never fail the test run.
pub struct HttpReportHook {
    client: reqwest::Client,
    url: String,
    section: String,
    run_id: String,
    current: Mutex<Option<TestReport>>,
}

impl HttpReportHook {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            section: "Distributed tests".to_string(),
            run_id: Uuid::new_v4().to_string(),
            current: Mutex::new(None),
        }
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = section.into();
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Report for `test` as it stands right after the test started.
    pub fn start_report(&self, test: &TestStart, now_ms: i64) -> TestReport {
        let title = display_title(&test.name);
        let mut suites = vec![
            self.section.clone(),
            test.version.clone().unwrap_or_else(|| "unknown version".to_string()),
        ];
        suites.extend(find_suites(&test.module, &title));

        TestReport {
            title,
            run_id: self.run_id.clone(),
            time: ReportTime {
                start: now_ms,
                start_pretty: pretty_datetime(now_ms),
                ..Default::default()
            },
            suites,
            ..Default::default()
        }
    }

    fn take_current(&self) -> Option<TestReport> {
        self.current.lock().ok().and_then(|mut current| current.take())
    }
}

/// Complete a started report with the test outcome.
pub fn finish_report(mut report: TestReport, test: &TestFinish, now_ms: i64) -> TestReport {
    report.status = match test.status {
        TestStatus::Pass => "passed",
        TestStatus::Fail | TestStatus::Error => "failed",
    }
    .to_string();

    report.time.end = now_ms;
    report.time.end_pretty = pretty_datetime(now_ms);
    report.time.diff = pretty_diff((report.time.end - report.time.start) / 1000);

    if let Some(description) = &test.description {
        report.description = description.clone();
    }
    if !test.known_issues.is_empty() {
        let issues = test
            .known_issues
            .iter()
            .map(|id| serde_json::json!({ "id": id, "message": "known issue" }))
            .collect();
        report.data.insert("known_issues".to_string(), serde_json::Value::Array(issues));
    }
    if let Some(exception) = &test.exception {
        report.stacktrace = Some(format!(
            "{exception}\n{}",
            test.stacktrace.as_deref().unwrap_or_default()
        ));
    }
    report
}

/// `test_ignite_put(x=1)` reads as `put (x=1)`.
pub fn display_title(test_name: &str) -> String {
    static PREFIX: OnceLock<Option<Regex>> = OnceLock::new();
    let prefix = PREFIX.get_or_init(|| Regex::new(r"^test_(ignite_)?").ok());
    let stripped = match prefix {
        Some(re) => re.replace(test_name, "").into_owned(),
        None => test_name.to_string(),
    };
    stripped.replace('(', " (")
}

fn find_suites(module: &str, title: &str) -> Vec<String> {
    let module_suite = module.split('.').nth(1).unwrap_or(module).replace("test_", "");
    let mut suites = vec![module_suite];
    if let Some(idx) = title.find('(') {
        suites.push(title[..idx].trim().to_string());
    }
    suites
}

fn pretty_datetime(ms: i64) -> String {
    Local
        .timestamp_millis_opt(ms)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S%.6f").to_string())
        .unwrap_or_default()
}

/// Whole seconds as `Ns`, or `Xm Ys` past one minute.
pub fn pretty_diff(secs: i64) -> String {
    if secs > 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}

#[async_trait]
impl TestHook for HttpReportHook {
    async fn before_test(&self, test: &TestStart) -> Result<()> {
        let report = self.start_report(test, Local::now().timestamp_millis());
        if let Ok(mut current) = self.current.lock() {
            *current = Some(report);
        }
        Ok(())
    }

    async fn after_test(&self, test: &TestFinish) -> Result<()> {
        let Some(started) = self.take_current() else {
            warn!(test = %test.name, "No started report for finished test");
            return Ok(());
        };
        let report = finish_report(started, test, Local::now().timestamp_millis());

        info!(title = %report.title, status = %report.status, url = %self.url, "Sending test result");
        match self.client.post(&self.url).json(&report).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                warn!(title = %report.title, status = %response.status(), "Report collector rejected test result")
            }
            Err(e) => warn!(error = %e, url = %self.url, "Failed to send test result"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_title() {
        assert_eq!(display_title("test_ignite_snapshot(wal=False)"), "snapshot (wal=False)");
        assert_eq!(display_title("test_restart"), "restart");
    }

    #[test]
    fn test_pretty_diff() {
        assert_eq!(pretty_diff(42), "42s");
        assert_eq!(pretty_diff(60), "60s");
        assert_eq!(pretty_diff(125), "2m 5s");
    }

    #[test]
    fn test_report_lifecycle() {
        let hook = HttpReportHook::new("http://localhost:9/report").with_section("Nightly");
        let start = TestStart {
            module: "snapshots.test_snapshots".to_string(),
            name: "test_snapshot(wal=False)".to_string(),
            version: Some("8.7.1".to_string()),
        };

        let report = hook.start_report(&start, 1_000);
        assert_eq!(report.title, "snapshot (wal=False)");
        assert_eq!(report.suites, vec!["Nightly", "8.7.1", "snapshots", "snapshot"]);
        assert_eq!(report.run_id, hook.run_id());

        let mut finish = TestFinish::new("test_snapshot(wal=False)", TestStatus::Error);
        finish.exception = Some("TimeoutError".to_string());
        finish.stacktrace = Some("trace".to_string());
        finish.known_issues = vec!["GG-1".to_string()];

        let report = finish_report(report, &finish, 91_000);
        assert_eq!(report.status, "failed");
        assert_eq!(report.time.diff, "1m 30s");
        assert_eq!(report.stacktrace.as_deref(), Some("TimeoutError\ntrace"));
        assert_eq!(report.data["known_issues"][0]["id"], "GG-1");
    }
}
