//! The client's mirror of one match.

use crate::games::tictactoe::{Board, Mark, Position};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Unique identifier for a match.
pub type MatchId = String;

/// Unique identifier for a player.
pub type PlayerId = String;

/// Players per match.
pub const MATCH_SIZE: usize = 2;

/// Mode of a match, chosen at matchmaking time.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GameMode {
    /// No turn clock.
    #[default]
    Classic,
    /// Per-turn countdown driven by the server.
    Timed,
}

impl GameMode {
    /// Parses the server's mode string.
    pub fn from_wire(mode: &str) -> Option<Self> {
        mode.parse().ok()
    }

    /// Whether the turn clock applies.
    pub fn is_timed(self) -> bool {
        matches!(self, GameMode::Timed)
    }
}

/// Coarse lifecycle stage of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    /// Not looking for a match.
    #[default]
    Idle,
    /// Registered with the matchmaker or joined and waiting for an opponent.
    Matchmaking,
    /// Both players present.
    InMatch,
    /// The server declared a result.
    Ended,
}

/// Whose turn it is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum TurnOwner {
    /// Not announced yet, or announced for someone we do not know.
    #[default]
    Unknown,
    /// A player in the roster.
    Player(PlayerId),
}

impl TurnOwner {
    /// Returns the owning player, if known.
    pub fn player(&self) -> Option<&str> {
        match self {
            TurnOwner::Unknown => None,
            TurnOwner::Player(id) => Some(id),
        }
    }
}

/// Result of adding a player to a [`Roster`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterAdd {
    /// Newly added.
    Added,
    /// Was already present; nothing changed.
    AlreadyPresent,
    /// Roster already holds [`MATCH_SIZE`] players.
    Full,
}

/// Participants of a match, at most [`MATCH_SIZE`] of them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Roster {
    players: Vec<PlayerId>,
}

impl Roster {
    /// Adds a player; re-adding is a no-op.
    pub fn add(&mut self, id: &str) -> RosterAdd {
        if self.contains(id) {
            return RosterAdd::AlreadyPresent;
        }
        if self.players.len() >= MATCH_SIZE {
            return RosterAdd::Full;
        }
        self.players.push(id.to_string());
        RosterAdd::Added
    }

    /// Removes a player. Returns whether they were present.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.players.len();
        self.players.retain(|p| p != id);
        self.players.len() != before
    }

    /// Whether the player is in the roster.
    pub fn contains(&self, id: &str) -> bool {
        self.players.iter().any(|p| p == id)
    }

    /// Number of players.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// True when nobody is present.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// True when the match is full.
    pub fn is_full(&self) -> bool {
        self.players.len() == MATCH_SIZE
    }

    /// Players in join order.
    pub fn players(&self) -> &[PlayerId] {
        &self.players
    }
}

/// The client's view of one match.
///
/// Only the reducer in [`crate::session`] mutates a session in response to
/// server events; everything else reads it.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct Session {
    /// Local player's identifier from authentication.
    local_player: PlayerId,
    /// Match this session is bound to.
    match_id: Option<MatchId>,
    /// Mark assigned to the local player.
    local_symbol: Option<Mark>,
    /// Whose turn it is.
    turn_owner: TurnOwner,
    /// Last board snapshot from the server.
    board: Board,
    /// Match participants.
    roster: Roster,
    /// Lifecycle stage.
    phase: Phase,
    /// Mode declared by the server.
    game_mode: Option<GameMode>,
    /// Seconds left on the current turn (timed matches only).
    time_remaining: Option<u64>,
    /// Seconds per turn, when the server announced it.
    turn_time_limit: Option<u64>,
}

impl Session {
    /// Creates an idle session for the given local player.
    #[instrument]
    pub fn new(local_player: PlayerId) -> Self {
        debug!("Creating idle session");
        Self {
            local_player,
            match_id: None,
            local_symbol: None,
            turn_owner: TurnOwner::Unknown,
            board: Board::new(),
            roster: Roster::default(),
            phase: Phase::Idle,
            game_mode: None,
            time_remaining: None,
            turn_time_limit: None,
        }
    }

    /// Moves an idle session into matchmaking.
    ///
    /// Any other phase is left untouched and reported as `false`.
    #[instrument(skip(self), fields(phase = %self.phase))]
    pub fn begin_matchmaking(&mut self, mode: GameMode) -> bool {
        if self.phase != Phase::Idle {
            warn!("Matchmaking requested outside idle phase");
            return false;
        }
        info!(%mode, "Session entering matchmaking");
        self.phase = Phase::Matchmaking;
        self.game_mode = Some(mode);
        true
    }

    /// Binds the session to a joined match.
    ///
    /// The match id is set once; rebinding to a different id is refused.
    /// `present` seeds the roster with players already in the match.
    #[instrument(skip(self, present), fields(phase = %self.phase))]
    pub fn bind_match(&mut self, match_id: MatchId, present: &[PlayerId]) -> bool {
        match &self.match_id {
            Some(existing) if *existing != match_id => {
                warn!(%existing, "Session already bound to another match");
                return false;
            }
            _ => {}
        }
        if self.phase != Phase::Matchmaking {
            warn!("Match join outside matchmaking phase");
            return false;
        }
        for id in present {
            if self.roster.add(id) == RosterAdd::Full {
                warn!(player_id = %id, "Roster full while seeding presences");
            }
        }
        info!(%match_id, seeded = self.roster.len(), "Session bound to match");
        self.match_id = Some(match_id);
        true
    }

    /// Returns to idle defaults, keeping the local identity.
    pub fn reset(&mut self) {
        *self = Self::new(std::mem::take(&mut self.local_player));
    }

    /// Whether the local player holds the turn.
    pub fn is_local_turn(&self) -> bool {
        self.turn_owner.player() == Some(self.local_player.as_str())
    }

    /// Whether the surrounding UI may offer a new game.
    pub fn new_game_allowed(&self) -> bool {
        self.phase == Phase::Ended
    }

    /// Whether the turn clock should be on screen.
    pub fn timer_visible(&self) -> bool {
        matches!(self.phase, Phase::Matchmaking | Phase::InMatch)
            && self.game_mode.is_some_and(GameMode::is_timed)
    }

    /// Cells the local player could pick right now.
    pub fn selectable_cells(&self) -> Vec<Position> {
        if self.phase != Phase::InMatch || !self.is_local_turn() {
            return Vec::new();
        }
        Position::valid_moves(&self.board)
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub(crate) fn set_board(&mut self, board: Board) {
        self.board = board;
    }

    pub(crate) fn set_game_mode(&mut self, mode: GameMode) {
        self.game_mode = Some(mode);
    }

    pub(crate) fn set_turn_time_limit(&mut self, seconds: u64) {
        self.turn_time_limit = Some(seconds);
    }

    pub(crate) fn set_time_remaining(&mut self, seconds: u64) {
        self.time_remaining = Some(seconds);
    }

    pub(crate) fn clear_time_remaining(&mut self) {
        self.time_remaining = None;
    }

    pub(crate) fn assign_symbol(&mut self, mark: Mark) {
        self.local_symbol = Some(mark);
    }

    pub(crate) fn set_turn_owner(&mut self, owner: TurnOwner) {
        self.turn_owner = owner;
    }

    pub(crate) fn roster_mut(&mut self) -> &mut Roster {
        &mut self.roster
    }
}
