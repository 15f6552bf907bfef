//! Bounded polling.

pub mod engine;
pub mod log;

pub use engine::{WaitCondition, WaitOutcome};
pub use log::wait_for_log_text;
