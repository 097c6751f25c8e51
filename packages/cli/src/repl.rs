//! Interactive console for sending commands to the agent.

use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::debug;

use deploything_test_server::{
    format_snapshot, AgentConnection, AgentTestServer, CommandOutcome, ConnectionError,
    ConnectionMode, DEFAULT_TAG,
};

use crate::input::{parse_line, ReplCommand, HELP};
use crate::output::{log_block, INBOUND};

/// Second Ctrl-C within this window quits
const DOUBLE_CTRL_C_TIMEOUT: Duration = Duration::from_secs(1);

/// How often the snapshot printer looks for a (new) agent
const SNAPSHOT_POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct Repl {
    server: Arc<AgentTestServer>,
    response_timeout: Option<Duration>,
    containers: Vec<String>,
    last_interrupt: Option<Instant>,
}

impl Repl {
    pub fn new(server: Arc<AgentTestServer>, response_timeout: Option<Duration>) -> Self {
        Self {
            server,
            response_timeout,
            containers: Vec::new(),
            last_interrupt: None,
        }
    }

    /// Wait for the agent, then read commands until quit, EOF or double Ctrl-C
    pub async fn run(&mut self) -> Result<()> {
        let address = match self.server.local_addr() {
            Some(addr) => addr.to_string(),
            None => format!("{}:{}", self.server.host(), self.server.port()),
        };
        println!(
            "Agent Test Server listening on {} ({})",
            format!("ws://{}", address).bold(),
            self.server.mode()
        );

        if !self.wait_for_agent().await? {
            return Ok(());
        }
        println!("Type 'help' for available commands.\n");

        let printer = self.spawn_snapshot_printer();
        let result = self.read_loop().await;
        if let Some(printer) = printer {
            printer.abort();
        }
        result
    }

    async fn wait_for_agent(&self) -> Result<bool> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
                .template("{spinner:.blue} {msg}")?,
        );
        spinner.set_message("Waiting for agent to connect...");
        spinner.enable_steady_tick(Duration::from_millis(100));

        tokio::select! {
            result = self.server.wait_for_connection(None) => {
                let connection = result?;
                spinner.finish_with_message(format!(
                    "{} Agent connected from {}",
                    "✓".green().bold(),
                    connection.peer_addr()
                ));
                Ok(true)
            }
            _ = tokio::signal::ctrl_c() => {
                spinner.abandon_with_message("Interrupted before an agent connected".to_string());
                Ok(false)
            }
        }
    }

    /// Print snapshots from whichever connection is active (fire-and-forget only)
    fn spawn_snapshot_printer(&self) -> Option<JoinHandle<()>> {
        if self.server.mode() != ConnectionMode::FireAndForget {
            return None;
        }

        let server = self.server.clone();
        Some(tokio::spawn(async move {
            loop {
                let Some(connection) = server.active_connection() else {
                    tokio::time::sleep(SNAPSHOT_POLL_INTERVAL).await;
                    continue;
                };

                debug!(connection_id = %connection.id(), "Printing snapshots");
                let mut snapshots = connection.subscribe_snapshots();
                while let Some(snapshot) = snapshots.recv().await {
                    println!("\n{}", log_block(INBOUND, &format_snapshot(&snapshot)));
                }
                connection.closed().await;
                println!("\n{}", "Agent disconnected".yellow());
            }
        }))
    }

    async fn read_loop(&mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            self.print_prompt()?;

            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    match parse_line(&line) {
                        Ok(Some(ReplCommand::Quit)) => break,
                        Ok(Some(command)) => self.handle(command).await,
                        Ok(None) => {}
                        Err(e) => println!("{}", e),
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    let now = Instant::now();
                    if self
                        .last_interrupt
                        .is_some_and(|last| now.duration_since(last) < DOUBLE_CTRL_C_TIMEOUT)
                    {
                        println!("\nInterrupted.");
                        break;
                    }
                    self.last_interrupt = Some(now);
                    println!("\nPress Ctrl+C again to quit.");
                }
            }
        }

        Ok(())
    }

    fn print_prompt(&self) -> Result<()> {
        let prompt = if self.server.active_connection().is_some() {
            "[connected] > ".green()
        } else {
            "[disconnected] > ".red()
        };
        print!("{}", prompt);
        std::io::stdout().flush()?;
        Ok(())
    }

    async fn handle(&mut self, command: ReplCommand) {
        match command {
            ReplCommand::Help => println!("{}", HELP),
            ReplCommand::Run {
                image,
                tag,
                port_mapping,
            } => self.cmd_run(&image, tag.as_deref(), port_mapping.as_deref()).await,
            ReplCommand::Stop { container_id } => self.cmd_stop(&container_id).await,
            ReplCommand::Status => self.cmd_status(),
            ReplCommand::List => self.cmd_list(),
            ReplCommand::Quit => {}
        }
    }

    fn connection(&self) -> Option<Arc<AgentConnection>> {
        let connection = self.server.active_connection();
        if connection.is_none() {
            println!("{} No agent connected", "Error:".red().bold());
        }
        connection
    }

    async fn cmd_run(&mut self, image: &str, tag: Option<&str>, port_mapping: Option<&str>) {
        let Some(connection) = self.connection() else {
            return;
        };

        println!(
            "{} Sending run command: image={}, tag={}, port_map={}",
            "→".blue().bold(),
            image,
            tag.unwrap_or("(none)"),
            port_mapping.unwrap_or("(none)")
        );

        let result = match deploything_test_server::build_run_command(image, tag, port_mapping) {
            Ok(cmd) => self.send(&connection, &cmd).await,
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(CommandOutcome::Response(response)) => {
                println!("Response: {}", response);
                if response == "ok" {
                    self.containers
                        .push(format!("{}:{}", image, tag.unwrap_or(DEFAULT_TAG)));
                }
            }
            Ok(CommandOutcome::Sent) => println!(
                "Sent run command: image={}, tag={}",
                image,
                tag.unwrap_or(DEFAULT_TAG)
            ),
            Err(e) => println!("{} {}", "Error:".red().bold(), e),
        }
    }

    async fn cmd_stop(&mut self, container_id: &str) {
        let Some(connection) = self.connection() else {
            return;
        };

        println!(
            "{} Sending stop command: container_id={}",
            "→".blue().bold(),
            container_id
        );

        let result = match deploything_test_server::build_stop_command(container_id) {
            Ok(cmd) => self.send(&connection, &cmd).await,
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(CommandOutcome::Response(response)) => println!("Response: {}", response),
            Ok(CommandOutcome::Sent) => {
                println!("Sent stop command: container_id={}", container_id)
            }
            Err(e) => println!("{} {}", "Error:".red().bold(), e),
        }
    }

    async fn send(
        &self,
        connection: &AgentConnection,
        cmd: &deploything_test_server::RemoteCommand,
    ) -> Result<CommandOutcome, ConnectionError> {
        match self.response_timeout {
            Some(timeout) => connection.send_command_timeout(cmd, timeout).await,
            None => connection.send_command(cmd).await,
        }
    }

    fn cmd_status(&self) {
        match self.server.active_connection() {
            Some(connection) => {
                println!("Status: {}", "Connected".green());
                println!("  Agent:     {}", connection.peer_addr());
                println!("  Id:        {}", connection.id());
                println!("  Mode:      {}", connection.mode());
                println!(
                    "  Since:     {}",
                    connection.connected_at().format("%Y-%m-%dT%H:%M:%SZ")
                );
            }
            None => println!("Status: {}", "Disconnected".red()),
        }
    }

    fn cmd_list(&self) {
        if self.containers.is_empty() {
            println!("{}", "No containers started this session.".dimmed());
            return;
        }
        println!("Containers started this session:");
        for (i, container) in self.containers.iter().enumerate() {
            println!("  {}. {}", i + 1, container);
        }
    }
}
