//! Presentation state fed by notifications.

use crate::games::tictactoe::Position;
use crate::leaderboard::LeaderboardView;
use crate::session::{ConnectionStatus, Notification, TurnOwner};
use chrono::{DateTime, Local};
use std::collections::VecDeque;
use tracing::debug;

/// Lines kept in the message log.
pub const MAX_MESSAGES: usize = 50;

/// Turn length assumed when the server never announced one.
pub const DEFAULT_TURN_SECONDS: u64 = 30;

/// Severity of a log line, used for coloring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Neutral.
    Info,
    /// Something went our way.
    Success,
    /// Recoverable problem.
    Warning,
    /// Failure.
    Error,
}

/// One line in the message log.
#[derive(Debug, Clone)]
pub struct LogLine {
    /// When it was recorded.
    pub at: DateTime<Local>,
    /// Severity.
    pub kind: MessageKind,
    /// Text.
    pub text: String,
}

/// Turn clock as the UI shows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimerState {
    /// Clock on screen.
    pub visible: bool,
    /// Seconds left, once known.
    pub remaining: Option<u64>,
    /// Urgent styling.
    pub low_time: bool,
}

/// Main application state.
pub struct App {
    cursor: Position,
    status: ConnectionStatus,
    timer: TimerState,
    messages: VecDeque<LogLine>,
    leaderboard: LeaderboardView,
    /// A move went out and no snapshot has answered it yet.
    move_pending: bool,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    /// Creates a new application.
    pub fn new() -> Self {
        Self {
            cursor: Position::Center,
            status: ConnectionStatus::Offline,
            timer: TimerState::default(),
            messages: VecDeque::with_capacity(MAX_MESSAGES),
            leaderboard: LeaderboardView::Loading,
            move_pending: false,
        }
    }

    /// Cell under the cursor.
    pub fn cursor(&self) -> Position {
        self.cursor
    }

    /// Moves the cursor.
    pub fn set_cursor(&mut self, cursor: Position) {
        self.cursor = cursor;
    }

    /// Connection status line.
    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    /// Turn clock.
    pub fn timer(&self) -> TimerState {
        self.timer
    }

    /// Message log, oldest first.
    pub fn messages(&self) -> impl Iterator<Item = &LogLine> {
        self.messages.iter()
    }

    /// Latest leaderboard.
    pub fn leaderboard(&self) -> &LeaderboardView {
        &self.leaderboard
    }

    /// Replaces the leaderboard.
    pub fn set_leaderboard(&mut self, view: LeaderboardView) {
        self.leaderboard = view;
    }

    /// Whether input is held until the server answers the last move.
    pub fn move_pending(&self) -> bool {
        self.move_pending
    }

    /// Holds further moves until the next authoritative update.
    pub fn hold_moves(&mut self) {
        self.move_pending = true;
    }

    /// Appends to the message log, dropping the oldest line past the cap.
    pub fn log(&mut self, kind: MessageKind, text: impl Into<String>) {
        if self.messages.len() == MAX_MESSAGES {
            self.messages.pop_front();
        }
        self.messages.push_back(LogLine {
            at: Local::now(),
            kind,
            text: text.into(),
        });
    }

    /// Handles a notification from the core.
    pub fn handle_notification(&mut self, notification: Notification) {
        debug!(?notification, "Handling notification");

        match notification {
            Notification::ShowTimer(visible) => self.timer.visible = visible,
            Notification::HideTimer => self.timer = TimerState::default(),
            Notification::MatchStarted => {
                self.log(MessageKind::Success, "Match started");
            }
            Notification::TimerChanged {
                remaining,
                low_time,
            } => {
                self.timer.visible = true;
                self.timer.remaining = Some(remaining);
                self.timer.low_time = low_time;
            }
            Notification::ErrorNotification(error) => {
                self.move_pending = false;
                self.log(MessageKind::Error, error);
            }
            Notification::AllowNewGame => {
                self.log(MessageKind::Info, "Press 'n' for a new game");
            }
            Notification::DisableBoard => {}
            Notification::MoveRejected(rejection) => {
                self.move_pending = false;
                self.log(MessageKind::Warning, format!("Move rejected: {}", rejection));
            }
            Notification::MoveSent { row, col } => {
                if let Some(position) = Position::from_row_col(row.into(), col.into()) {
                    self.log(MessageKind::Info, format!("You played {}", position.label()));
                }
            }
            Notification::MatchOver {
                outcome,
                message,
                winner,
            } => {
                let text = if message.is_empty() {
                    format!("Match over ({})", outcome)
                } else {
                    format!("[{}] {}", outcome, message)
                };
                let kind = if winner.is_some() {
                    MessageKind::Success
                } else {
                    MessageKind::Info
                };
                self.log(kind, text);
            }
            Notification::BoardChanged(_) => self.move_pending = false,
            Notification::TurnChanged { owner, local_turn } => {
                self.move_pending = false;
                if local_turn {
                    self.log(MessageKind::Info, "Your turn");
                } else if owner == TurnOwner::Unknown {
                    self.log(MessageKind::Warning, "Turn owner unknown");
                }
            }
            Notification::SymbolAssigned(mark) => {
                self.log(MessageKind::Success, format!("You are playing {}", mark));
            }
            Notification::RosterChanged(players) => {
                self.log(MessageKind::Info, format!("Players: {}/2", players.len()));
            }
            Notification::GameModeChanged(mode) => {
                self.log(MessageKind::Info, format!("Mode: {}", mode));
            }
            Notification::Announcement(text) => self.log(MessageKind::Info, text),
            Notification::Diagnostic(text) => debug!(%text, "Diagnostic"),
            Notification::SessionReset => {
                self.timer = TimerState::default();
                self.move_pending = false;
                self.log(MessageKind::Info, "Session reset");
            }
            Notification::Status(status) => {
                let kind = match status {
                    ConnectionStatus::Failed(_) => MessageKind::Error,
                    ConnectionStatus::Disconnected => MessageKind::Warning,
                    ConnectionStatus::Connected => MessageKind::Success,
                    _ => MessageKind::Info,
                };
                self.log(kind, format!("Status: {}", status));
                if matches!(
                    status,
                    ConnectionStatus::Failed(_) | ConnectionStatus::Disconnected
                ) {
                    self.log(MessageKind::Info, "Press 'r' to retry");
                }
                self.status = status;
            }
            Notification::MatchJoined { match_id, .. } => {
                self.log(MessageKind::Success, format!("Joined match {}", match_id));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_log_is_capped() {
        let mut app = App::new();
        for i in 0..(MAX_MESSAGES + 5) {
            app.log(MessageKind::Info, format!("line {}", i));
        }
        assert_eq!(app.messages().count(), MAX_MESSAGES);
        assert_eq!(app.messages().next().unwrap().text, "line 5");
    }

    #[test]
    fn test_timer_follows_notifications() {
        let mut app = App::new();
        app.handle_notification(Notification::ShowTimer(true));
        app.handle_notification(Notification::timer(8));
        assert_eq!(
            app.timer(),
            TimerState {
                visible: true,
                remaining: Some(8),
                low_time: true
            }
        );
        app.handle_notification(Notification::HideTimer);
        assert!(!app.timer().visible);
    }

    #[test]
    fn test_moves_held_until_snapshot() {
        let mut app = App::new();
        app.hold_moves();
        app.handle_notification(Notification::MoveSent { row: 1, col: 1 });
        assert!(app.move_pending());
        app.handle_notification(Notification::BoardChanged(Default::default()));
        assert!(!app.move_pending());

        app.hold_moves();
        app.handle_notification(Notification::ErrorNotification("Not your turn".to_string()));
        assert!(!app.move_pending());
    }
}
