//! Strictly Games client library - online tic-tac-toe against a realtime server
//!
//! The server is authoritative: the client mirrors match state from an
//! opcode-tagged event stream and forwards move intents.
//!
//! # Architecture
//!
//! - **Transport**: device authentication, realtime socket, leaderboard RPC
//! - **Protocol**: opcode decoding into typed [`SessionEvent`]s
//! - **Session**: the local match mirror and its pure reducer
//! - **Intent gate**: local move checks before anything is sent
//! - **Matchmaking**: authenticate, connect, register, join
//! - **TUI**: ratatui front end consuming [`Notification`]s
//!
//! # Example
//!
//! ```no_run
//! use strictly_client::{Envelope, GameMode, Session, SessionEvent, Welcome, apply};
//!
//! let mut session = Session::new("player-1".to_string());
//! session.begin_matchmaking(GameMode::Timed);
//! let welcome = SessionEvent::Welcome(Welcome {
//!     game_mode: Some(GameMode::Timed),
//!     ..Default::default()
//! });
//! let transition = apply(session, Envelope::unaddressed(welcome));
//! assert!(!transition.notifications.is_empty());
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Default `tracing` filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,strictly_client=debug";

// Private module declarations
mod client;
mod config;
mod games;
mod intent;
mod leaderboard;
mod matchmaking;
mod protocol;
mod session;
mod transport;
mod tui;

// Crate-level exports - Configuration
pub use config::{ClientConfig, ConfigError, DEFAULT_PORT, ServerAddress};

// Crate-level exports - Game types (tic-tac-toe)
pub use games::tictactoe::{Board, Cell, Mark, Position};

// Crate-level exports - Protocol
pub use protocol::{
    BoardUpdate, DecodeError, Envelope, MOVE_OPCODE, MatchEnded, MatchOutcome, MovePayload,
    Opcode, PlayerError, PlayerJoined, PlayerLeft, SessionEvent, TimerTick, Welcome, decode,
    decode_envelope,
};

// Crate-level exports - Session state machine
pub use session::{
    ConnectionStatus, GameMode, LOW_TIME_THRESHOLD, MATCH_SIZE, MatchId, Notification, Phase,
    PlayerId, Roster, RosterAdd, Session, Transition, TurnOwner, apply, reset,
};

// Crate-level exports - Intent gate
pub use intent::{AcceptedMove, IntentGate, MoveRejection, check};

// Crate-level exports - Transport
pub use transport::{
    Credential, InboundMessage, LeaderboardSource, MatchFound, MatchHandle, MatchmakerRequest,
    NakamaTransport, Ticket, Transport, TransportError, TransportErrorKind, TransportEvent,
};

// Crate-level exports - Matchmaking
pub use matchmaking::{Connection, Coordinator, Matched, MatchmakingError, MatchmakingStep};

// Crate-level exports - Leaderboard
pub use leaderboard::{LeaderboardPoller, LeaderboardView, PollerHandle, RankedPlayer, poll_once};

// Crate-level exports - Client and terminal UI
pub use client::GameClient;
pub use tui::{App, MessageKind, run_tui};
