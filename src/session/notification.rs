//! Values the core hands to whatever renders the session.

use super::state::{GameMode, Phase, PlayerId, TurnOwner};
use crate::games::tictactoe::{Board, Mark};
use crate::intent::MoveRejection;
use crate::protocol::MatchOutcome;
use derive_more::Display;

/// Seconds at or below which the turn clock is shown as urgent.
pub const LOW_TIME_THRESHOLD: u64 = 10;

/// Connection progress shown in the status line.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ConnectionStatus {
    /// No server contact yet.
    #[display("offline")]
    Offline,
    /// Exchanging device credentials for a token.
    #[display("authenticating")]
    Authenticating,
    /// Opening the realtime socket.
    #[display("connecting")]
    Connecting,
    /// Waiting for the matchmaker.
    #[display("searching for opponent")]
    Searching,
    /// Joined a match.
    #[display("connected")]
    Connected,
    /// Socket closed.
    #[display("disconnected")]
    Disconnected,
    /// A step failed; carries the reason.
    #[display("failed: {_0}")]
    Failed(String),
}

/// Everything the reducer, gate and client tell the UI.
///
/// The core never touches presentation state; a sink consumes these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Show or hide the turn clock depending on the mode.
    ShowTimer(bool),
    /// Hide the turn clock.
    HideTimer,
    /// Roster reached two players.
    MatchStarted,
    /// Turn clock moved.
    TimerChanged {
        /// Clamped seconds left.
        remaining: u64,
        /// At or below [`LOW_TIME_THRESHOLD`].
        low_time: bool,
    },
    /// Server-reported error text.
    ErrorNotification(String),
    /// The UI may offer a restart.
    AllowNewGame,
    /// Cells must stop accepting input.
    DisableBoard,
    /// The intent gate or the send refused a move.
    MoveRejected(MoveRejection),
    /// A move went out to the server.
    MoveSent {
        /// Zero-based row.
        row: u8,
        /// Zero-based column.
        col: u8,
    },
    /// The server declared a result.
    MatchOver {
        /// Category label.
        outcome: MatchOutcome,
        /// Server text.
        message: String,
        /// Winner, when announced.
        winner: Option<PlayerId>,
    },
    /// New board snapshot applied.
    BoardChanged(Board),
    /// Turn ownership recomputed.
    TurnChanged {
        /// Who holds the turn.
        owner: TurnOwner,
        /// Whether that is us.
        local_turn: bool,
    },
    /// Our mark for this match.
    SymbolAssigned(Mark),
    /// Roster membership changed.
    RosterChanged(Vec<PlayerId>),
    /// Mode announced or changed.
    GameModeChanged(GameMode),
    /// Server text worth showing (welcome, join and leave messages).
    Announcement(String),
    /// Something only a developer cares about.
    Diagnostic(String),
    /// Session went back to idle.
    SessionReset,
    /// Connection progress.
    Status(ConnectionStatus),
    /// Session bound to a match.
    MatchJoined {
        /// Joined match.
        match_id: String,
        /// Phase after binding.
        phase: Phase,
    },
}

impl Notification {
    /// Builds a timer notification from a clamped value.
    pub fn timer(remaining: u64) -> Self {
        Notification::TimerChanged {
            remaining,
            low_time: remaining <= LOW_TIME_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_time_threshold_is_inclusive() {
        assert_eq!(
            Notification::timer(10),
            Notification::TimerChanged {
                remaining: 10,
                low_time: true
            }
        );
        assert_eq!(
            Notification::timer(11),
            Notification::TimerChanged {
                remaining: 11,
                low_time: false
            }
        );
    }

    #[test]
    fn test_status_text() {
        assert_eq!(ConnectionStatus::Searching.to_string(), "searching for opponent");
        assert_eq!(
            ConnectionStatus::Failed("boom".to_string()).to_string(),
            "failed: boom"
        );
    }
}
