pub mod node;

pub use node::*;
