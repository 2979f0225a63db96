//! Configuration module for the telnet shell server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Command-line arguments for the console server
#[derive(Parser, Debug)]
#[command(name = "telnet-shell")]
#[command(author = "telnet-shell authors")]
#[command(version = "0.1.0")]
#[command(about = "A multi-user telnet command console", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 0.0.0.0:23233)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Maximum number of simultaneous sessions
    #[arg(short = 'n', long)]
    pub max_sessions: Option<usize>,

    /// Listen backlog passed to listen(2)
    #[arg(long)]
    pub backlog: Option<i32>,

    /// Offer MCCP2 compression to every new client
    #[arg(long)]
    pub offer_compression: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Size of the session table
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Pending connection queue length
    #[serde(default = "default_backlog")]
    pub backlog: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_sessions: default_max_sessions(),
            backlog: default_backlog(),
        }
    }
}

/// Per-session presentation
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    /// Line sent right after a client is accepted
    #[serde(default = "default_banner")]
    pub banner: String,
    /// Shell prompt marker
    #[serde(default = "default_prompt")]
    pub prompt: String,
    #[serde(default)]
    pub offer_compression: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            banner: default_banner(),
            prompt: default_prompt(),
            offer_compression: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:23233".to_string()
}

fn default_max_sessions() -> usize {
    64
}

fn default_backlog() -> i32 {
    5
}

fn default_banner() -> String {
    "Welcome to the debug console.".to_string()
}

fn default_prompt() -> String {
    "==> ".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: SocketAddr,
    pub max_sessions: usize,
    pub backlog: i32,
    pub banner: String,
    pub prompt: String,
    pub offer_compression: bool,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen: SocketAddr::from(([0, 0, 0, 0], 23233)),
            max_sessions: default_max_sessions(),
            backlog: default_backlog(),
            banner: default_banner(),
            prompt: default_prompt(),
            offer_compression: false,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config)
    }

    /// Merge CLI args with TOML config (CLI takes precedence) and validate.
    pub fn merge(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let listen = cli.listen.unwrap_or(toml_config.server.listen);
        let listen = listen
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("invalid listen address '{listen}'")))?;

        let max_sessions = cli.max_sessions.unwrap_or(toml_config.server.max_sessions);
        if max_sessions == 0 {
            return Err(ConfigError::Invalid(
                "max_sessions must be at least 1".to_string(),
            ));
        }

        Ok(Config {
            listen,
            max_sessions,
            backlog: cli.backlog.unwrap_or(toml_config.server.backlog),
            banner: toml_config.session.banner,
            prompt: toml_config.session.prompt,
            offer_compression: cli.offer_compression || toml_config.session.offer_compression,
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        })
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::Invalid(reason) => write!(f, "Invalid configuration: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> CliArgs {
        let mut argv = vec!["telnet-shell"];
        argv.extend_from_slice(args);
        CliArgs::parse_from(argv)
    }

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.server.listen, "0.0.0.0:23233");
        assert_eq!(config.server.max_sessions, 64);
        assert_eq!(config.server.backlog, 5);
        assert_eq!(config.session.prompt, "==> ");
        assert!(!config.session.offer_compression);
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            listen = "127.0.0.1:2323"
            max_sessions = 8

            [session]
            banner = "hello"
            offer_compression = true

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:2323");
        assert_eq!(config.server.max_sessions, 8);
        assert_eq!(config.server.backlog, 5);
        assert_eq!(config.session.banner, "hello");
        assert_eq!(config.session.prompt, "==> ");
        assert!(config.session.offer_compression);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_cli_overrides_toml() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            [server]
            listen = "127.0.0.1:2323"
            max_sessions = 8
            "#,
        )
        .unwrap();

        let config =
            Config::merge(cli(&["-l", "127.0.0.1:4000", "--log-level", "warn"]), toml_config)
                .unwrap();
        assert_eq!(config.listen.port(), 4000);
        assert_eq!(config.max_sessions, 8);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_explicit_log_level_beats_file() {
        let file = || -> TomlConfig {
            toml::from_str(
                r#"
                [logging]
                level = "debug"
                "#,
            )
            .unwrap()
        };

        let config = Config::merge(cli(&["--log-level", "info"]), file()).unwrap();
        assert_eq!(config.log_level, "info");

        let config = Config::merge(cli(&[]), file()).unwrap();
        assert_eq!(config.log_level, "debug");

        let config = Config::merge(cli(&[]), TomlConfig::default()).unwrap();
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = Config::merge(cli(&["-l", "not-an-address"]), TomlConfig::default());
        assert!(matches!(err, Err(ConfigError::Invalid(_))));

        let err = Config::merge(cli(&["-n", "0"]), TomlConfig::default());
        assert!(matches!(err, Err(ConfigError::Invalid(_))));
    }
}
