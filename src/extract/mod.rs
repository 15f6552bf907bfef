//! Two phase attribute extraction from node logs.

pub mod attribute;
pub mod error;
pub mod extractor;
pub mod masks;

pub use attribute::{AttributeSpec, AttributeType, AttributeValue};
pub use error::{ExtractorError, Result};
pub use extractor::{probe_command, LogAttributeExtractor, NodeAttributes};
