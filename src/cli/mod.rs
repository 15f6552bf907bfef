pub mod commands;
pub mod error;
pub mod options;
pub mod output;

pub use commands::*;
pub use error::{CliError, Result};
pub use options::*;
pub use output::*;
