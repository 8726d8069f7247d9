//! Typed payloads carried by session events, plus their wire schemas.
//!
//! The `Raw*` structs mirror the JSON the match server broadcasts. They are
//! lenient about missing fields; the decoder turns them into the typed
//! payloads below, validating boards and symbols on the way.

use crate::games::tictactoe::{Board, Mark};
use crate::protocol::DecodeError;
use crate::session::{GameMode, PlayerId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Sent to each player right after they join.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Welcome {
    /// Greeting text.
    pub message: String,
    /// Mode of the match, when announced.
    pub game_mode: Option<GameMode>,
    /// Players in the match when the welcome was sent.
    pub player_count: Option<u32>,
    /// Seconds per turn in timed matches.
    pub turn_time_limit: Option<u64>,
}

/// Broadcast when a presence joins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerJoined {
    /// Identifier of the joining player.
    pub user_id: PlayerId,
    /// Display name of the joining player.
    pub username: Option<String>,
    /// Mark the server assigned to the joining player.
    pub symbol: Option<Mark>,
    /// Server-side player count after the join.
    pub total_players: Option<u32>,
    /// Whose turn it is.
    pub current_turn: Option<PlayerId>,
    /// Board snapshot.
    pub board: Option<Board>,
    /// Mode of the match.
    pub game_mode: Option<GameMode>,
    /// Seconds per turn in timed matches.
    pub turn_time_limit: Option<u64>,
    /// Seconds left on the current turn.
    pub time_remaining: Option<i64>,
}

/// Broadcast when a presence leaves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerLeft {
    /// Identifier of the departed player.
    pub user_id: PlayerId,
    /// Server text.
    pub message: String,
}

/// Full snapshot after an accepted move.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardUpdate {
    /// Board snapshot.
    pub board: Option<Board>,
    /// Whose turn it is now.
    pub current_turn: Option<PlayerId>,
    /// Mode of the match.
    pub game_mode: Option<GameMode>,
    /// Seconds left on the new turn (timed matches).
    pub time_remaining: Option<i64>,
}

/// Final message for a win, draw or timeout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchEnded {
    /// Human-readable result.
    pub message: String,
    /// Final board, when included.
    pub board: Option<Board>,
    /// Winner, for wins and timeouts.
    pub winner: Option<PlayerId>,
    /// Mode of the match.
    pub game_mode: Option<GameMode>,
}

/// Server rejected one of our moves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerError {
    /// Reason given by the server.
    pub error: String,
}

/// Periodic turn clock update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerTick {
    /// Seconds left; may be negative on the wire.
    pub time_remaining: i64,
    /// Whose turn the clock belongs to.
    pub current_turn: Option<PlayerId>,
}

/// Outbound move body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
pub struct MovePayload {
    /// Zero-based row.
    pub row: u8,
    /// Zero-based column.
    pub col: u8,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawWelcome {
    #[serde(default)]
    message: String,
    game_mode: Option<String>,
    player_count: Option<u32>,
    turn_time_limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawPlayerJoined {
    user_id: String,
    username: Option<String>,
    symbol: Option<String>,
    total_players: Option<u32>,
    current_turn: Option<String>,
    board_state: Option<Vec<String>>,
    game_mode: Option<String>,
    turn_time_limit: Option<i64>,
    time_remaining: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawPlayerLeft {
    user_id: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawBoardUpdate {
    board_state: Option<Vec<String>>,
    current_turn: Option<String>,
    game_mode: Option<String>,
    time_remaining: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawMatchEnded {
    #[serde(default)]
    message: String,
    board_state: Option<Vec<String>>,
    winner_id: Option<String>,
    game_mode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawPlayerError {
    #[serde(default)]
    error: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawTimerTick {
    time_remaining: i64,
    current_turn: Option<String>,
}

/// A wire schema that validates into a typed payload.
pub(super) trait WirePayload: DeserializeOwned {
    /// Typed payload produced by validation.
    type Output;

    /// Checks boards, symbols and required fields.
    fn validate(self) -> Result<Self::Output, DecodeError>;
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn board(raw: Option<Vec<String>>) -> Result<Option<Board>, DecodeError> {
    raw.map(|cells| Board::from_wire(&cells)).transpose()
}

fn game_mode(raw: Option<String>) -> Option<GameMode> {
    let raw = non_empty(raw)?;
    let mode = GameMode::from_wire(&raw);
    if mode.is_none() {
        warn!(game_mode = %raw, "Ignoring unknown game mode");
    }
    mode
}

fn seconds(raw: Option<i64>) -> Option<u64> {
    raw.map(|s| s.max(0) as u64)
}

impl WirePayload for RawWelcome {
    type Output = Welcome;

    fn validate(self) -> Result<Welcome, DecodeError> {
        Ok(Welcome {
            message: self.message,
            game_mode: game_mode(self.game_mode),
            player_count: self.player_count,
            turn_time_limit: seconds(self.turn_time_limit),
        })
    }
}

impl WirePayload for RawPlayerJoined {
    type Output = PlayerJoined;

    fn validate(self) -> Result<PlayerJoined, DecodeError> {
        if self.user_id.is_empty() {
            return Err(DecodeError::new("Join announcement without user_id"));
        }
        let symbol = match self.symbol {
            Some(s) => Mark::from_wire(&s)?,
            None => None,
        };
        Ok(PlayerJoined {
            user_id: self.user_id,
            username: non_empty(self.username),
            symbol,
            total_players: self.total_players,
            current_turn: non_empty(self.current_turn),
            board: board(self.board_state)?,
            game_mode: game_mode(self.game_mode),
            turn_time_limit: seconds(self.turn_time_limit),
            time_remaining: self.time_remaining,
        })
    }
}

impl WirePayload for RawPlayerLeft {
    type Output = PlayerLeft;

    fn validate(self) -> Result<PlayerLeft, DecodeError> {
        if self.user_id.is_empty() {
            return Err(DecodeError::new("Leave announcement without user_id"));
        }
        Ok(PlayerLeft {
            user_id: self.user_id,
            message: self.message,
        })
    }
}

impl WirePayload for RawBoardUpdate {
    type Output = BoardUpdate;

    fn validate(self) -> Result<BoardUpdate, DecodeError> {
        Ok(BoardUpdate {
            board: board(self.board_state)?,
            current_turn: non_empty(self.current_turn),
            game_mode: game_mode(self.game_mode),
            time_remaining: self.time_remaining,
        })
    }
}

impl WirePayload for RawMatchEnded {
    type Output = MatchEnded;

    fn validate(self) -> Result<MatchEnded, DecodeError> {
        Ok(MatchEnded {
            message: self.message,
            board: board(self.board_state)?,
            winner: non_empty(self.winner_id),
            game_mode: game_mode(self.game_mode),
        })
    }
}

impl WirePayload for RawPlayerError {
    type Output = PlayerError;

    fn validate(self) -> Result<PlayerError, DecodeError> {
        Ok(PlayerError { error: self.error })
    }
}

impl WirePayload for RawTimerTick {
    type Output = TimerTick;

    fn validate(self) -> Result<TimerTick, DecodeError> {
        Ok(TimerTick {
            time_remaining: self.time_remaining,
            current_turn: non_empty(self.current_turn),
        })
    }
}
