//! Error types for the test server core.

use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Malformed operator input rejected by the command builder
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("image name must not be empty")]
    EmptyImageName,

    #[error("container id must not be empty")]
    EmptyContainerId,

    #[error("invalid port mapping format: {0:?} (expected <container_port[/protocol]>:<host_port>)")]
    InvalidPortMapping(String),
}

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("connection closed")]
    Closed,

    #[error("refusing to send a command with no variant set")]
    EmptyCommand,

    #[error("no response from agent within {0:?}")]
    ResponseTimeout(Duration),

    #[error("websocket error: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error(transparent)]
    InvalidCommand(#[from] CommandError),
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server is already running on {0}")]
    AlreadyRunning(std::net::SocketAddr),

    #[error("no agent connected within {0:?}")]
    Timeout(Duration),
}
