//! Contract between the session core and the realtime game server.
//!
//! The core only talks to the [`Transport`] and [`LeaderboardSource`] traits.
//! [`NakamaTransport`] is the production adapter; tests use in-memory fakes.

mod error;
mod nakama;

pub use error::{TransportError, TransportErrorKind};
pub use nakama::NakamaTransport;

use crate::leaderboard::RankedPlayer;
use crate::session::{GameMode, MATCH_SIZE, MatchId, PlayerId};
use async_trait::async_trait;
use derive_getters::Getters;
use tokio::sync::mpsc;

/// Opcode-tagged message delivered on the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Match the server sent this for.
    pub match_id: Option<MatchId>,
    /// Wire opcode.
    pub opcode: i64,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

/// The matchmaker paired us with an opponent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchFound {
    /// Match to join, when the server already created one.
    pub match_id: Option<MatchId>,
    /// Join token issued by the matchmaker.
    pub token: Option<String>,
}

/// Everything the socket can deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Match data.
    Message(InboundMessage),
    /// Matchmaker result.
    MatchFound(MatchFound),
    /// Socket closed or failed.
    Disconnected {
        /// Why it closed.
        reason: String,
    },
}

/// Session credential from device authentication.
#[derive(Debug, Clone, PartialEq, Eq, Getters, derive_new::new)]
pub struct Credential {
    /// Bearer token for REST and socket calls.
    token: String,
    /// Our player identifier.
    user_id: PlayerId,
    /// Display name we registered with.
    username: String,
}

/// Matchmaker ticket.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub struct Ticket(pub String);

/// What we ask the matchmaker for.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct MatchmakerRequest {
    /// Mode both players must share.
    mode: GameMode,
    /// Minimum players.
    min_count: usize,
    /// Maximum players.
    max_count: usize,
}

impl MatchmakerRequest {
    /// Two players in the same mode.
    pub fn for_mode(mode: GameMode) -> Self {
        Self {
            mode,
            min_count: MATCH_SIZE,
            max_count: MATCH_SIZE,
        }
    }

    /// Matchmaker query string.
    pub fn query(&self) -> String {
        format!("+properties.mode:{}", self.mode)
    }
}

/// Result of joining a match.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct MatchHandle {
    /// Joined match.
    match_id: MatchId,
    /// Players already present, ourselves excluded.
    presences: Vec<PlayerId>,
}

impl MatchHandle {
    /// Creates a handle.
    pub fn new(match_id: impl Into<MatchId>, presences: Vec<PlayerId>) -> Self {
        Self {
            match_id: match_id.into(),
            presences,
        }
    }
}

/// Realtime operations the session core needs.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Exchanges a device id for a credential, creating the account if needed.
    async fn authenticate(
        &self,
        device_id: &str,
        username: &str,
    ) -> Result<Credential, TransportError>;

    /// Opens the realtime socket. Events arrive on the returned channel until
    /// a [`TransportEvent::Disconnected`].
    async fn open_socket(
        &self,
        credential: &Credential,
    ) -> Result<mpsc::Receiver<TransportEvent>, TransportError>;

    /// Adds a matchmaker ticket.
    async fn register_matchmaking(
        &self,
        request: &MatchmakerRequest,
    ) -> Result<Ticket, TransportError>;

    /// Joins the matched session.
    async fn join_match(&self, found: &MatchFound) -> Result<MatchHandle, TransportError>;

    /// Sends opcode-tagged match data.
    async fn send_move(
        &self,
        match_id: &str,
        opcode: i64,
        payload: Vec<u8>,
    ) -> Result<(), TransportError>;

    /// Closes the socket. Later sends fail.
    async fn disconnect(&self);
}

/// Ranked player listing.
#[async_trait]
pub trait LeaderboardSource: Send + Sync {
    /// Fetches the top `limit` players.
    async fn query_top_players(
        &self,
        credential: &Credential,
        limit: usize,
    ) -> Result<Vec<RankedPlayer>, TransportError>;
}
