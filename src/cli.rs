//! Command-line interface for strictly_client.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use strictly_client::{ClientConfig, ConfigError, GameMode, ServerAddress};

/// Strictly Games - online tic-tac-toe client
#[derive(Parser, Debug)]
#[command(name = "strictly_client")]
#[command(about = "Terminal client for server-authoritative tic-tac-toe", long_about = None)]
#[command(version)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Find an opponent and play in the terminal UI
    Play {
        /// Connection settings
        #[command(flatten)]
        server: ServerArgs,

        /// Match mode to queue for
        #[arg(short, long, value_enum)]
        mode: Option<GameMode>,

        /// Log file while the UI is running
        #[arg(long)]
        log_file: Option<PathBuf>,
    },

    /// Print the top players
    Leaderboard {
        /// Connection settings
        #[command(flatten)]
        server: ServerArgs,

        /// Rows to fetch
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Keep refreshing until interrupted
        #[arg(long)]
        watch: bool,
    },
}

/// Connection overrides shared by every command.
#[derive(Args, Debug, Default)]
pub struct ServerArgs {
    /// Display name
    #[arg(short, long)]
    pub username: Option<String>,

    /// Device identifier used to authenticate
    #[arg(long)]
    pub device_id: Option<String>,

    /// Server as host[:port]
    #[arg(short, long)]
    pub server: Option<String>,

    /// Server key
    #[arg(long)]
    pub server_key: Option<String>,

    /// Use TLS
    #[arg(long)]
    pub ssl: bool,
}

impl ServerArgs {
    /// Layers these flags over a loaded configuration.
    pub fn apply(self, mut config: ClientConfig) -> Result<ClientConfig, ConfigError> {
        if let Some(username) = self.username {
            config = config.with_username(username);
        }
        if let Some(device_id) = self.device_id {
            config = config.with_device_id(device_id);
        }
        if let Some(server) = self.server {
            config = config.with_server(ServerAddress::parse(&server)?);
        }
        if let Some(key) = self.server_key {
            config = config.with_server_key(key);
        }
        if self.ssl {
            config = config.with_use_ssl(true);
        }
        Ok(config)
    }
}
