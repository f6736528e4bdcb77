pub mod config;
pub mod domain;
pub mod error;
pub mod id;
pub mod logging;
pub mod metrics;
pub mod query;

// Gateway and the ports it talks through
pub mod app;
// Backend implementations of those ports
pub mod infra;

pub use app::RemoteGateway;
pub use error::{GatewayError, Result};
