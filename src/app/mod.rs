pub mod gateway;
pub mod ports;

pub use gateway::RemoteGateway;
