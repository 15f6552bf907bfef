//! Node orchestration on top of routing, extraction and waits.

pub mod application;
pub mod error;
pub mod launcher;

pub use application::{App, NodeFilter};
pub use error::{AppError, Result};
pub use launcher::{launcher_for, JavaLauncher, NodeLauncher, ShellLauncher};
