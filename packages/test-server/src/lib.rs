//! Deploything Agent Test Server Library
//!
//! This crate stands in for the control plane when exercising a deploything
//! agent: it accepts the agent's WebSocket connection, sends typed run/stop
//! commands, and decodes the state snapshots the agent pushes back.

pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod server;
pub mod snapshot;

// Re-exports for convenience
pub use command::builder::{
    build_run_command, build_stop_command, parse_port_mapping, serialize_command, DEFAULT_TAG,
};
pub use config::Config;
pub use connection::agent::{AgentConnection, CommandOutcome, ConnectionMode, ConnectionOptions};
pub use connection::protocol::{
    AgentSnapshot, ContainerHostConfig, ContainerState, ContainerStatus, PortMap, RemoteCommand,
    RunParams, StopParams,
};
pub use error::{CommandError, ConnectionError, ServerError};
pub use server::acceptor::AgentTestServer;
pub use server::registry::ConnectionRegistry;
pub use snapshot::formatter::format_snapshot;
