pub mod error;
pub mod harness;

pub use error::{ConfigError, Result};
pub use harness::*;
