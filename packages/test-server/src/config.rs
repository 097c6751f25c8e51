//! Configuration module
//!
//! Handles loading and saving test server configuration from TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::connection::agent::{ConnectionMode, ConnectionOptions};

/// Main configuration structure for the agent test server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Per-connection settings
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the WebSocket listener to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on (0 picks a free port)
    #[serde(default = "default_port")]
    pub port: u16,

    /// How accepted connections interpret inbound frames
    #[serde(default)]
    pub mode: ConnectionMode,
}

/// Agent connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Capacity of the queue holding text responses (request/response mode)
    #[serde(default = "default_response_queue_capacity")]
    pub response_queue_capacity: usize,

    /// Capacity of the queue holding decoded snapshots (fire-and-forget mode)
    #[serde(default = "default_snapshot_queue_capacity")]
    pub snapshot_queue_capacity: usize,

    /// How long the operator console waits for a response (0 = forever)
    #[serde(default = "default_response_timeout")]
    pub response_timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    4040
}

fn default_response_queue_capacity() -> usize {
    16
}

fn default_snapshot_queue_capacity() -> usize {
    64
}

fn default_response_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            mode: ConnectionMode::default(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            response_queue_capacity: default_response_queue_capacity(),
            snapshot_queue_capacity: default_snapshot_queue_capacity(),
            response_timeout_secs: default_response_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl ConnectionConfig {
    /// Response timeout, `None` when disabled
    pub fn response_timeout(&self) -> Option<Duration> {
        (self.response_timeout_secs > 0).then(|| Duration::from_secs(self.response_timeout_secs))
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self::default()
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Reject values tokio channels cannot be built with
    pub fn validate(&self) -> Result<()> {
        if self.connection.response_queue_capacity == 0 {
            anyhow::bail!("connection.response_queue_capacity must be greater than zero");
        }
        if self.connection.snapshot_queue_capacity == 0 {
            anyhow::bail!("connection.snapshot_queue_capacity must be greater than zero");
        }
        Ok(())
    }

    /// Options handed to every accepted connection
    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            mode: self.server.mode,
            response_queue_capacity: self.connection.response_queue_capacity,
            snapshot_queue_capacity: self.connection.snapshot_queue_capacity,
        }
    }
}
