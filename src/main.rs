//! Strictly Games - online tic-tac-toe client
//!
//! Plays against another human through a realtime game server.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use std::sync::Arc;
use std::time::Duration;
use strictly_client::{
    ClientConfig, LeaderboardPoller, LeaderboardSource, LeaderboardView, NakamaTransport,
    Transport, poll_once, run_tui,
};
use tokio::sync::watch;
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = ClientConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Play {
            server,
            mode,
            log_file,
        } => {
            let mut config = server.apply(config)?;
            if let Some(mode) = mode {
                config = config.with_game_mode(mode);
            }
            if let Some(log_file) = log_file {
                config = config.with_log_file(log_file);
            }
            run_tui(config).await
        }
        Command::Leaderboard {
            server,
            limit,
            watch: follow,
        } => {
            let mut config = server.apply(config)?;
            if let Some(limit) = limit {
                config = config.with_leaderboard_size(limit);
            }
            run_leaderboard(config, follow).await
        }
    }
}

/// Prints the leaderboard once, or on every refresh with `--watch`.
#[instrument(skip(config), fields(server = %config.server()))]
async fn run_leaderboard(config: ClientConfig, follow: bool) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(strictly_client::DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    config.validate()?;
    let transport = Arc::new(NakamaTransport::new(
        config.server(),
        config.server_key().clone(),
        *config.use_ssl(),
    ));
    let credential = transport
        .authenticate(config.device_id(), config.username())
        .await
        .context("Authentication failed")?;
    info!(user_id = %credential.user_id(), "Authenticated");

    if !follow {
        let view = poll_once(transport.as_ref(), &credential, *config.leaderboard_size()).await;
        print_leaderboard(&view);
        return Ok(());
    }

    let source: Arc<dyn LeaderboardSource> = transport;
    let (tx, mut rx) = watch::channel(LeaderboardView::Loading);
    let poller = LeaderboardPoller::new(
        source,
        credential,
        Duration::from_secs(*config.leaderboard_interval_secs()),
        *config.leaderboard_size(),
    )
    .spawn(tx);

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                print_leaderboard(&rx.borrow_and_update());
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }
    poller.cancel().await;
    Ok(())
}

fn print_leaderboard(view: &LeaderboardView) {
    match view {
        LeaderboardView::Loading => println!("Loading..."),
        LeaderboardView::NoData => println!("No scores yet - play some games!"),
        LeaderboardView::Ranked(players) => {
            println!("{:>3}  {:<24} {:>8}", "#", "Player", "Score");
            for (i, player) in players.iter().enumerate() {
                println!(
                    "{:>3}  {:<24} {:>8}",
                    i + 1,
                    player.display_name(),
                    player.score
                );
            }
        }
    }
}
