//! Operator input grammar
//!
//! `run <image> [tag] [port_map]`, `stop <container_id>`, `status`, `list`,
//! `help`, `quit`/`exit`.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Run {
        image: String,
        tag: Option<String>,
        port_mapping: Option<String>,
    },
    Stop {
        container_id: String,
    },
    Status,
    List,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// Known command, wrong arguments
    Usage(&'static str),
    Unknown(String),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::Usage(usage) => write!(f, "Usage: {}", usage),
            InputError::Unknown(cmd) => write!(
                f,
                "Unknown command: {}. Type 'help' for available commands.",
                cmd
            ),
        }
    }
}

pub const RUN_USAGE: &str = "run <image> [tag] [port_map]";
pub const STOP_USAGE: &str = "stop <container_id>";

pub const HELP: &str = "\
Available commands:
  help                          Show this help message
  run <image> [tag] [port_map]  Send run command (e.g., run nginx latest 8080/tcp:8080)
  stop <container_id>           Send stop command for a container
  status                        Show connection status
  list                          List containers started this session
  quit                          Exit the CLI";

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<ReplCommand>, InputError> {
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = parts.collect();

    let command = match cmd.to_lowercase().as_str() {
        "help" => ReplCommand::Help,
        "run" => match args.as_slice() {
            [image, rest @ ..] if rest.len() <= 2 => ReplCommand::Run {
                image: image.to_string(),
                tag: rest.first().map(|s| s.to_string()),
                port_mapping: rest.get(1).map(|s| s.to_string()),
            },
            _ => return Err(InputError::Usage(RUN_USAGE)),
        },
        "stop" => match args.as_slice() {
            [container_id] => ReplCommand::Stop {
                container_id: container_id.to_string(),
            },
            _ => return Err(InputError::Usage(STOP_USAGE)),
        },
        "status" => ReplCommand::Status,
        "list" => ReplCommand::List,
        "quit" | "exit" => ReplCommand::Quit,
        _ => return Err(InputError::Unknown(cmd.to_string())),
    };

    Ok(Some(command))
}
