pub mod error;
pub mod router;

pub use error::{Result, RoutingError};
pub use router::HostCommandRouter;
