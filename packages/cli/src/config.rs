//! CLI Configuration
//!
//! Locates the test server configuration, by default at
//! `<config dir>/deploything/agent-test-server.toml`.

use anyhow::{Context, Result};
use deploything_test_server::{Config, ConnectionMode};
use std::path::{Path, PathBuf};

/// Get the default config file path
pub fn default_path() -> Result<PathBuf> {
    let dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(dir.join("deploything").join("agent-test-server.toml"))
}

/// Load config from `explicit` if given, else from the default path if it
/// exists, else fall back to built-in defaults
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return Config::load(path);
    }

    match default_path() {
        Ok(path) if path.exists() => Config::load(&path),
        _ => Ok(Config::default_config()),
    }
}

/// Command-line values that take precedence over the file
#[derive(Debug, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub mode: Option<ConnectionMode>,
    pub verbose: bool,
}

impl Overrides {
    pub fn apply(self, config: &mut Config) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(mode) = self.mode {
            config.server.mode = mode;
        }
        if self.verbose {
            config.logging.level = "debug".to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_win() {
        let mut config = Config::default_config();
        Overrides {
            host: Some("0.0.0.0".to_string()),
            port: Some(5050),
            mode: Some(ConnectionMode::FireAndForget),
            verbose: true,
        }
        .apply(&mut config);

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5050);
        assert_eq!(config.server.mode, ConnectionMode::FireAndForget);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_no_overrides_keeps_file_values() {
        let mut config = Config::default_config();
        Overrides::default().apply(&mut config);
        assert_eq!(config, Config::default_config());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        assert!(load(Some(Path::new("/nonexistent/agent-test-server.toml"))).is_err());
    }
}
