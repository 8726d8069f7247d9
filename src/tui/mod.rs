//! Terminal UI for the online client.

mod app;
mod input;
mod ui;

pub use app::{App, MessageKind};

use input::Action;

use crate::client::GameClient;
use crate::config::ClientConfig;
use crate::games::tictactoe::Position;
use crate::leaderboard::{LeaderboardPoller, LeaderboardView, PollerHandle};
use crate::matchmaking::Connection;
use crate::session::{Notification, Session};
use crate::transport::{LeaderboardSource, NakamaTransport, Transport};
use anyhow::Result;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, instrument, warn};

type Tui = Terminal<CrosstermBackend<io::Stdout>>;

/// Redraw and input polling period.
const FRAME: Duration = Duration::from_millis(50);

/// Run the TUI client
pub async fn run_tui(config: ClientConfig) -> Result<()> {
    // Setup logging to file to avoid interfering with TUI
    let log_file = std::fs::File::create(config.log_file())?;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(crate::DEFAULT_LOG_FILTER)),
        )
        .with_writer(Arc::new(log_file))
        .with_ansi(false)
        .try_init(); // Don't panic if already initialized

    info!(server = %config.server(), mode = %config.game_mode(), "Starting terminal client");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_client(&mut terminal, config).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = &res {
        error!(error = ?err, "Client loop error");
    }
    res
}

/// How a connected session ended.
enum Exit {
    Quit,
    Reconnect,
}

/// Connects, then drives the event loop until the user quits.
///
/// A failed connection or a closed socket can be retried with `r`.
#[instrument(skip_all)]
async fn run_client(terminal: &mut Tui, config: ClientConfig) -> Result<()> {
    let nakama = Arc::new(NakamaTransport::new(
        config.server(),
        config.server_key().clone(),
        *config.use_ssl(),
    ));
    let transport: Arc<dyn Transport> = nakama.clone();
    let source: Arc<dyn LeaderboardSource> = nakama;

    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();
    let mut app = App::new();

    loop {
        let connected =
            GameClient::connect(Arc::clone(&transport), config.clone(), notify_tx.clone()).await;
        let (client, connection) = match connected {
            Ok(connected) => connected,
            Err(e) => {
                while let Ok(notification) = notify_rx.try_recv() {
                    app.handle_notification(notification);
                }
                app.log(MessageKind::Error, e.to_string());
                if wait_for_retry(terminal, &mut app)? {
                    continue;
                }
                break;
            }
        };

        let exit = play(
            terminal,
            &mut app,
            &mut notify_rx,
            client,
            connection,
            Arc::clone(&source),
            &config,
        )
        .await?;
        match exit {
            Exit::Quit => break,
            Exit::Reconnect => info!("Reconnecting"),
        }
    }

    info!("Client stopped");
    Ok(())
}

/// Runs one connected session.
async fn play(
    terminal: &mut Tui,
    app: &mut App,
    notify_rx: &mut mpsc::UnboundedReceiver<Notification>,
    mut client: GameClient,
    connection: Connection,
    source: Arc<dyn LeaderboardSource>,
    config: &ClientConfig,
) -> Result<Exit> {
    let Connection {
        credential,
        mut events,
    } = connection;

    let (board_tx, mut board_rx) = watch::channel(LeaderboardView::Loading);
    let poller: PollerHandle = LeaderboardPoller::new(
        source,
        credential,
        Duration::from_secs(*config.leaderboard_interval_secs()),
        *config.leaderboard_size(),
    )
    .spawn(board_tx);

    if let Err(e) = client.find_match().await {
        warn!(error = %e, "Initial matchmaking failed");
    }

    let mut ticker = tokio::time::interval(FRAME);
    let mut events_open = true;
    let exit = loop {
        tokio::select! {
            event = events.recv(), if events_open => match event {
                Some(event) => client.handle_event(event).await,
                None => events_open = false,
            },
            Some(notification) = notify_rx.recv() => app.handle_notification(notification),
            Ok(()) = board_rx.changed() => {
                let view = board_rx.borrow_and_update().clone();
                app.set_leaderboard(view);
            }
            _ = ticker.tick() => {
                terminal.draw(|frame| ui::draw(frame, app, client.session()))?;
                if let Some(exit) = handle_input(app, &mut client).await? {
                    break exit;
                }
            }
        }
    };

    if client.is_dispatching() {
        client.disconnect().await;
    }
    poller.cancel().await;
    Ok(exit)
}

/// Drains pending key presses. Returns how to leave the session, if at all.
async fn handle_input(app: &mut App, client: &mut GameClient) -> Result<Option<Exit>> {
    while event::poll(Duration::ZERO)? {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        let Some(action) = input::action(key, app.cursor()) else {
            continue;
        };
        match action {
            Action::Quit => {
                info!("User quit");
                return Ok(Some(Exit::Quit));
            }
            Action::Cursor(position) => app.set_cursor(position),
            Action::Submit => {
                let cursor = app.cursor();
                submit(app, client, cursor);
            }
            Action::Play(position) => {
                app.set_cursor(position);
                submit(app, client, position);
            }
            Action::NewGame => {
                if client.session().new_game_allowed() {
                    if let Err(e) = client.new_game().await {
                        warn!(error = %e, "New game failed");
                    }
                } else {
                    app.log(MessageKind::Info, "A new game is available once the match ends");
                }
            }
            Action::Retry if !client.is_dispatching() => return Ok(Some(Exit::Reconnect)),
            Action::Retry => {
                if let Err(e) = client.retry().await {
                    app.log(MessageKind::Info, e.message);
                }
            }
        }
    }
    Ok(None)
}

/// Submits a move unless the previous one is still unanswered.
fn submit(app: &mut App, client: &GameClient, position: Position) {
    if app.move_pending() {
        app.log(MessageKind::Info, "Waiting for the server to answer your last move");
        return;
    }
    if client
        .submit_move(position.row().into(), position.col().into())
        .is_ok()
    {
        app.hold_moves();
    }
}

/// Shows a connection failure until the user retries (`true`) or quits.
fn wait_for_retry(terminal: &mut Tui, app: &mut App) -> Result<bool> {
    let idle = Session::new(String::new());
    loop {
        terminal.draw(|frame| ui::draw(frame, app, &idle))?;
        if event::poll(FRAME)?
            && let Event::Key(key) = event::read()?
        {
            match input::action(key, app.cursor()) {
                Some(Action::Retry) => return Ok(true),
                Some(Action::Quit) => return Ok(false),
                _ => {}
            }
        }
    }
}
