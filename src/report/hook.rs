use crate::config::ReportConfig;
use crate::report::{HttpReportHook, Result, TeamcityHook};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pass,
    Fail,
    Error,
}

impl TestStatus {
    pub fn is_pass(&self) -> bool {
        matches!(self, TestStatus::Pass)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestStart {
    /// Dotted module path, e.g. `snapshots.test_snapshots`.
    pub module: String,
    pub name: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestFinish {
    pub name: String,
    pub status: TestStatus,
    pub exception: Option<String>,
    pub stacktrace: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub known_issues: Vec<String>,
}

impl TestFinish {
    pub fn new(name: impl Into<String>, status: TestStatus) -> Self {
        Self {
            name: name.into(),
            status,
            exception: None,
            stacktrace: None,
            description: None,
            known_issues: Vec::new(),
        }
    }
}

/// Called around every test method.
#[async_trait]
pub trait TestHook: Send + Sync {
    async fn before_test(&self, test: &TestStart) -> Result<()>;

    async fn after_test(&self, test: &TestFinish) -> Result<()>;
}

/// Hooks enabled by the `report` configuration section.
///
/// `title` names the top report suite of the HTTP collector.
pub fn hooks_from_config(config: &ReportConfig) -> Vec<Box<dyn TestHook>> {
    let mut hooks: Vec<Box<dyn TestHook>> = Vec::new();
    if config.teamcity {
        hooks.push(Box::new(TeamcityHook::new()));
    }
    if let Some(url) = config.url.as_deref().filter(|u| !u.is_empty()) {
        let mut hook = HttpReportHook::new(url);
        if let Some(title) = &config.title {
            hook = hook.with_section(title.as_str());
        }
        hooks.push(Box::new(hook));
    }
    hooks
}
