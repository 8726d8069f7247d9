//! Client configuration: TOML file, environment, then command-line overrides.

use crate::session::GameMode;
use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Port the game server listens on when none is given.
pub const DEFAULT_PORT: u16 = 7350;

/// Environment variables consulted after the config file.
const ENV_USERNAME: &str = "STRICTLY_USERNAME";
const ENV_DEVICE_ID: &str = "STRICTLY_DEVICE_ID";
const ENV_SERVER: &str = "STRICTLY_SERVER";
const ENV_SERVER_KEY: &str = "STRICTLY_SERVER_KEY";

/// `host[:port]` of the game server.
#[derive(Debug, Clone, PartialEq, Eq, Display, Serialize, Deserialize)]
#[display("{}:{}", host, port)]
#[serde(try_from = "String", into = "String")]
pub struct ServerAddress {
    host: String,
    port: u16,
}

impl ServerAddress {
    /// Parses `host` or `host:port`.
    #[instrument]
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConfigError::new("Server address is empty"));
        }
        let (host, port) = match raw.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|e| ConfigError::new(format!("Invalid port '{}': {}", port, e)))?;
                (host, port)
            }
            None => (raw, DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(ConfigError::new(format!("Missing host in '{}'", raw)));
        }
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// Host name or address.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Default for ServerAddress {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl TryFrom<String> for ServerAddress {
    type Error = ConfigError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<ServerAddress> for String {
    fn from(address: ServerAddress) -> Self {
        address.to_string()
    }
}

/// Everything the client needs to reach the server and find a match.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_")]
#[serde(default)]
pub struct ClientConfig {
    /// Display name registered with the server.
    #[setters(into)]
    username: String,

    /// Stable device identifier used for authentication.
    #[setters(into)]
    device_id: String,

    /// Game server address.
    server: ServerAddress,

    /// Server key for device authentication.
    #[setters(into)]
    server_key: String,

    /// Use TLS for REST and the socket.
    use_ssl: bool,

    /// Mode requested from the matchmaker.
    game_mode: GameMode,

    /// Seconds between leaderboard refreshes.
    leaderboard_interval_secs: u64,

    /// Rows requested from the leaderboard.
    leaderboard_size: usize,

    /// Where logs go while the terminal UI owns the screen.
    #[setters(into)]
    log_file: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            device_id: String::new(),
            server: ServerAddress::default(),
            server_key: "defaultkey".to_string(),
            use_ssl: false,
            game_mode: GameMode::Classic,
            leaderboard_interval_secs: 10,
            leaderboard_size: 10,
            log_file: PathBuf::from("strictly_client.log"),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from a TOML file. Missing keys take defaults.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        info!(username = %config.username, server = %config.server, "Config loaded successfully");
        Ok(config)
    }

    /// Loads `path` when given, defaults otherwise, then applies the environment.
    #[instrument]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_env()
    }

    /// Overrides fields from `STRICTLY_*` environment variables.
    #[instrument(skip(self))]
    pub fn with_env(mut self) -> Result<Self, ConfigError> {
        if let Ok(username) = std::env::var(ENV_USERNAME) {
            debug!("Username from environment");
            self.username = username;
        }
        if let Ok(device_id) = std::env::var(ENV_DEVICE_ID) {
            debug!("Device id from environment");
            self.device_id = device_id;
        }
        if let Ok(server) = std::env::var(ENV_SERVER) {
            debug!("Server from environment");
            self.server = ServerAddress::parse(&server)?;
        }
        if let Ok(key) = std::env::var(ENV_SERVER_KEY) {
            self.server_key = key;
        }
        Ok(self)
    }

    /// Checks the inputs a matchmaking attempt cannot do without.
    #[instrument(skip(self))]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.username.trim().is_empty() {
            return Err(ConfigError::new("Username is required"));
        }
        if self.device_id.trim().is_empty() {
            return Err(ConfigError::new("Device id is required"));
        }
        if self.server.host().trim().is_empty() {
            return Err(ConfigError::new("Server address is required"));
        }
        if self.leaderboard_size == 0 {
            return Err(ConfigError::new("Leaderboard size must be positive"));
        }
        Ok(())
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_address_default_port() {
        let address = ServerAddress::parse("games.example.com").unwrap();
        assert_eq!(address.host(), "games.example.com");
        assert_eq!(address.port(), DEFAULT_PORT);
        assert_eq!(address.to_string(), "games.example.com:7350");
    }

    #[test]
    fn test_server_address_rejects_garbage() {
        assert!(ServerAddress::parse("").is_err());
        assert!(ServerAddress::parse(":7350").is_err());
        assert!(ServerAddress::parse("host:notaport").is_err());
        assert_eq!(ServerAddress::parse("host:8080").unwrap().port(), 8080);
    }

    #[test]
    fn test_validate_requires_identity() {
        let config = ClientConfig::default();
        assert!(config.validate().is_err());

        let config = config.with_username("alice").with_device_id("device-1");
        assert!(config.validate().is_ok());

        let config = config.with_username("   ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            username = "alice"
            server = "10.0.0.5"
            game_mode = "timed"
            "#,
        )
        .unwrap();
        assert_eq!(config.username(), "alice");
        assert_eq!(config.server().port(), DEFAULT_PORT);
        assert_eq!(*config.game_mode(), GameMode::Timed);
        assert_eq!(config.server_key(), "defaultkey");
        assert_eq!(*config.leaderboard_interval_secs(), 10);
    }
}
