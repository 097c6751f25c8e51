//! Agent Test Server Entry Point
//!
//! Starts the WebSocket listener, waits for a deploything agent and hands the
//! terminal to the interactive console.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use deploything_test_server::config::LoggingConfig;
use deploything_test_server::{AgentTestServer, ConnectionMode};

mod config;
mod input;
mod output;
mod repl;

use crate::config::Overrides;
use crate::repl::Repl;

#[derive(Parser)]
#[command(name = "agent-test-server")]
#[command(version, about = "Interactive test server for the deploything agent")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "AGENT_TEST_SERVER_CONFIG")]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Connection mode: request_response or fire_and_forget
    #[arg(short, long)]
    mode: Option<ConnectionMode>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = config::load(cli.config.as_deref())?;
    Overrides {
        host: cli.host,
        port: cli.port,
        mode: cli.mode,
        verbose: cli.verbose,
    }
    .apply(&mut config);

    init_logging(&config.logging)?;

    let server = Arc::new(AgentTestServer::from_config(&config));
    server
        .start()
        .await
        .context("Failed to start agent test server")?;

    let mut repl = Repl::new(server.clone(), config.connection.response_timeout());
    let result = repl.run().await;

    server.stop().await;
    info!("Agent test server shut down");
    println!("\nGoodbye!");

    result
}

/// Initialize logging; `RUST_LOG` wins over the configured level
fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("Invalid log level")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = match logging.format.as_str() {
        "json" => builder.json().try_init(),
        "compact" => builder.compact().try_init(),
        _ => builder.pretty().try_init(),
    };

    installed.map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {e}"))
}
