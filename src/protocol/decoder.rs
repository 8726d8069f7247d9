//! Maps raw `(opcode, payload)` pairs to typed session events.

use super::opcode::Opcode;
use super::payloads::{
    BoardUpdate, MatchEnded, PlayerError, PlayerJoined, PlayerLeft, RawBoardUpdate,
    RawMatchEnded, RawPlayerError, RawPlayerJoined, RawPlayerLeft, RawTimerTick, RawWelcome,
    TimerTick, Welcome, WirePayload,
};
use crate::session::MatchId;
use crate::transport::InboundMessage;
use derive_more::{Display, Error};
use tracing::{debug, instrument, warn};

/// Payload could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("Decode error: {} at {}:{}", message, file, line)]
pub struct DecodeError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl DecodeError {
    /// Creates a new decode error with caller location tracking.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// How a match ended. Only the display category differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum MatchOutcome {
    /// A player completed a line.
    Win,
    /// Board filled up.
    Draw,
    /// A player ran out of time.
    Timeout,
}

/// A decoded inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Opcode 1.
    Welcome(Welcome),
    /// Opcode 2.
    PlayerJoined(PlayerJoined),
    /// Opcode 3.
    PlayerLeft(PlayerLeft),
    /// Opcode 4.
    BoardUpdate(BoardUpdate),
    /// Opcodes 5 (win), 7 (draw) and 8 (timeout).
    MatchEnded(MatchOutcome, MatchEnded),
    /// Opcode 6.
    PlayerError(PlayerError),
    /// Opcode 9.
    TimerTick(TimerTick),
    /// Any opcode outside the known set.
    Unknown {
        /// Wire opcode.
        opcode: i64,
        /// Untouched payload bytes.
        payload: Vec<u8>,
    },
}

impl SessionEvent {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::Welcome(_) => "welcome",
            SessionEvent::PlayerJoined(_) => "player_joined",
            SessionEvent::PlayerLeft(_) => "player_left",
            SessionEvent::BoardUpdate(_) => "board_update",
            SessionEvent::MatchEnded(..) => "match_ended",
            SessionEvent::PlayerError(_) => "player_error",
            SessionEvent::TimerTick(_) => "timer_tick",
            SessionEvent::Unknown { .. } => "unknown",
        }
    }
}

/// A decoded event together with the match it was sent for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Match the transport delivered this event for, if it said.
    pub match_id: Option<MatchId>,
    /// The event itself.
    pub event: SessionEvent,
}

impl Envelope {
    /// Wraps an event for the given match.
    pub fn new(match_id: impl Into<MatchId>, event: SessionEvent) -> Self {
        Self {
            match_id: Some(match_id.into()),
            event,
        }
    }

    /// Wraps an event without a match id.
    pub fn unaddressed(event: SessionEvent) -> Self {
        Self {
            match_id: None,
            event,
        }
    }
}

fn parse<R: WirePayload>(opcode: Opcode, payload: &[u8]) -> Result<R::Output, DecodeError> {
    let raw: R = serde_json::from_slice(payload)
        .map_err(|e| DecodeError::new(format!("Invalid {} payload: {}", opcode, e)))?;
    raw.validate()
}

/// Decodes one inbound message body.
///
/// Unrecognized opcodes are not an error: they come back as
/// [`SessionEvent::Unknown`] with the raw bytes.
#[instrument(skip(payload), fields(len = payload.len()))]
pub fn decode(opcode: i64, payload: &[u8]) -> Result<SessionEvent, DecodeError> {
    let Some(known) = Opcode::from_code(opcode) else {
        debug!(opcode, "Unrecognized opcode");
        return Ok(SessionEvent::Unknown {
            opcode,
            payload: payload.to_vec(),
        });
    };

    let event = match known {
        Opcode::Welcome => SessionEvent::Welcome(parse::<RawWelcome>(known, payload)?),
        Opcode::PlayerJoined => {
            SessionEvent::PlayerJoined(parse::<RawPlayerJoined>(known, payload)?)
        }
        Opcode::PlayerLeft => SessionEvent::PlayerLeft(parse::<RawPlayerLeft>(known, payload)?),
        Opcode::BoardUpdate => {
            SessionEvent::BoardUpdate(parse::<RawBoardUpdate>(known, payload)?)
        }
        Opcode::Win => {
            SessionEvent::MatchEnded(MatchOutcome::Win, parse::<RawMatchEnded>(known, payload)?)
        }
        Opcode::PlayerError => {
            SessionEvent::PlayerError(parse::<RawPlayerError>(known, payload)?)
        }
        Opcode::Draw => {
            SessionEvent::MatchEnded(MatchOutcome::Draw, parse::<RawMatchEnded>(known, payload)?)
        }
        Opcode::Timeout => SessionEvent::MatchEnded(
            MatchOutcome::Timeout,
            parse::<RawMatchEnded>(known, payload)?,
        ),
        Opcode::TimerTick => SessionEvent::TimerTick(parse::<RawTimerTick>(known, payload)?),
    };

    debug!(kind = event.kind(), "Decoded event");
    Ok(event)
}

/// Decodes a transport message into an addressed event.
#[instrument(skip(message), fields(opcode = message.opcode, match_id = ?message.match_id))]
pub fn decode_envelope(message: &InboundMessage) -> Result<Envelope, DecodeError> {
    let event = decode(message.opcode, &message.payload).inspect_err(|e| {
        warn!(error = %e, "Dropping undecodable message");
    })?;
    Ok(Envelope {
        match_id: message.match_id.clone(),
        event,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::tictactoe::{Cell, Mark, Position};
    use crate::session::GameMode;

    #[test]
    fn test_decode_player_joined() {
        let payload = br#"{
            "message": "New player joined!",
            "user_id": "alice",
            "username": "Alice",
            "total_players": 1,
            "current_turn": "alice",
            "board_state": ["", "", "", "", "", "", "", "", ""],
            "symbol": "X",
            "game_mode": "timed",
            "turn_time_limit": 30,
            "time_remaining": 30
        }"#;

        let SessionEvent::PlayerJoined(joined) = decode(2, payload).unwrap() else {
            panic!("expected PlayerJoined");
        };
        assert_eq!(joined.user_id, "alice");
        assert_eq!(joined.symbol, Some(Mark::X));
        assert_eq!(joined.current_turn.as_deref(), Some("alice"));
        assert_eq!(joined.game_mode, Some(GameMode::Timed));
        assert_eq!(joined.turn_time_limit, Some(30));
        assert_eq!(joined.board.unwrap().occupied_count(), 0);
    }

    #[test]
    fn test_decode_match_ended_kinds() {
        let payload = br#"{"message": "It's a draw in classic mode!", "game_mode": "classic"}"#;
        assert!(matches!(
            decode(7, payload).unwrap(),
            SessionEvent::MatchEnded(MatchOutcome::Draw, _)
        ));
        assert!(matches!(
            decode(5, payload).unwrap(),
            SessionEvent::MatchEnded(MatchOutcome::Win, _)
        ));
        assert!(matches!(
            decode(8, payload).unwrap(),
            SessionEvent::MatchEnded(MatchOutcome::Timeout, _)
        ));
    }

    #[test]
    fn test_decode_board_update_snapshot() {
        let payload = br#"{"board_state": ["X", "", "", "", "O", "", "", "", ""], "current_turn": "bob", "game_mode": "classic"}"#;
        let SessionEvent::BoardUpdate(update) = decode(4, payload).unwrap() else {
            panic!("expected BoardUpdate");
        };
        let board = update.board.unwrap();
        assert_eq!(board.get(Position::TopLeft), Cell::Occupied(Mark::X));
        assert_eq!(board.get(Position::Center), Cell::Occupied(Mark::O));
        assert_eq!(update.time_remaining, None);
    }

    #[test]
    fn test_unknown_opcode_keeps_payload() {
        let event = decode(42, b"not even json").unwrap();
        assert_eq!(
            event,
            SessionEvent::Unknown {
                opcode: 42,
                payload: b"not even json".to_vec()
            }
        );
    }

    #[test]
    fn test_malformed_payload_is_error() {
        assert!(decode(4, b"{not json").is_err());
        assert!(decode(9, br#"{"current_turn": "alice"}"#).is_err());
        assert!(decode(3, br#"{"message": "left"}"#).is_err());
    }

    #[test]
    fn test_empty_strings_mean_absent() {
        let payload = br#"{"user_id": "bob", "symbol": "", "current_turn": ""}"#;
        let SessionEvent::PlayerJoined(joined) = decode(2, payload).unwrap() else {
            panic!("expected PlayerJoined");
        };
        assert_eq!(joined.symbol, None);
        assert_eq!(joined.current_turn, None);
    }

    #[test]
    fn test_unknown_game_mode_is_dropped() {
        let payload = br#"{"message": "Welcome to blitz mode!", "game_mode": "blitz"}"#;
        let SessionEvent::Welcome(welcome) = decode(1, payload).unwrap() else {
            panic!("expected Welcome");
        };
        assert_eq!(welcome.game_mode, None);
        assert_eq!(welcome.message, "Welcome to blitz mode!");
    }
}
