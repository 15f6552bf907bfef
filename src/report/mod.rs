//! Test lifecycle hooks for external trackers.

pub mod error;
pub mod hook;
pub mod http;
pub mod teamcity;

pub use error::{ReportError, Result};
pub use hook::{hooks_from_config, TestFinish, TestHook, TestStart, TestStatus};
pub use http::{HttpReportHook, TestReport};
pub use teamcity::TeamcityHook;
