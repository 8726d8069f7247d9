//! Pure transition function from server events to session state.

use super::notification::Notification;
use super::state::{GameMode, Phase, PlayerId, RosterAdd, Session, TurnOwner};
use crate::games::tictactoe::Board;
use crate::protocol::{
    BoardUpdate, Envelope, MatchEnded, MatchOutcome, PlayerJoined, PlayerLeft, SessionEvent,
    TimerTick, Welcome,
};
use tracing::{debug, info, instrument, warn};

/// Output of one reducer step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Session after the event.
    pub session: Session,
    /// What the UI should hear about, in order.
    pub notifications: Vec<Notification>,
}

impl Transition {
    fn unchanged(session: Session) -> Self {
        Self {
            session,
            notifications: Vec::new(),
        }
    }
}

/// Applies one server event to a session.
///
/// Events for another match and events while idle are logged and dropped.
/// Once ended, only roster and display-only events are applied.
#[instrument(skip_all, fields(
    phase = %session.phase(),
    kind = envelope.event.kind(),
    match_id = ?envelope.match_id,
))]
pub fn apply(session: Session, envelope: Envelope) -> Transition {
    if *session.phase() == Phase::Idle {
        warn!("Protocol violation: event received while idle");
        return Transition::unchanged(session);
    }

    // Match data only arrives after a bind; an addressed event before one is stale.
    if let Some(theirs) = envelope.match_id.as_ref()
        && session.match_id().as_ref() != Some(theirs)
    {
        debug!(current = ?session.match_id(), "Ignoring event for another match");
        return Transition::unchanged(session);
    }

    if *session.phase() == Phase::Ended
        && !matches!(
            envelope.event,
            SessionEvent::PlayerLeft(_) | SessionEvent::PlayerError(_) | SessionEvent::Unknown { .. }
        )
    {
        debug!("Ignoring event after match end");
        return Transition::unchanged(session);
    }

    let mut step = Step {
        session,
        notifications: Vec::new(),
    };
    match envelope.event {
        SessionEvent::Welcome(welcome) => step.welcome(welcome),
        SessionEvent::PlayerJoined(joined) => step.player_joined(joined),
        SessionEvent::PlayerLeft(left) => step.player_left(left),
        SessionEvent::BoardUpdate(update) => step.board_update(update),
        SessionEvent::MatchEnded(outcome, ended) => step.match_ended(outcome, ended),
        SessionEvent::PlayerError(error) => {
            info!(error = %error.error, "Server rejected a move");
            step.emit(Notification::ErrorNotification(error.error));
        }
        SessionEvent::TimerTick(tick) => step.timer_tick(tick),
        SessionEvent::Unknown { opcode, payload } => {
            debug!(opcode, len = payload.len(), "Unknown opcode");
            step.emit(Notification::Diagnostic(format!(
                "Unhandled opcode {} ({} bytes)",
                opcode,
                payload.len()
            )));
        }
    }

    Transition {
        session: step.session,
        notifications: step.notifications,
    }
}

/// Returns a session to idle, keeping the local identity.
#[instrument(skip_all, fields(phase = %session.phase()))]
pub fn reset(mut session: Session) -> Transition {
    info!("Resetting session");
    session.reset();
    Transition {
        session,
        notifications: vec![Notification::HideTimer, Notification::SessionReset],
    }
}

fn clamp(seconds: i64) -> u64 {
    seconds.max(0) as u64
}

struct Step {
    session: Session,
    notifications: Vec<Notification>,
}

impl Step {
    fn emit(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    fn welcome(&mut self, welcome: Welcome) {
        if let Some(mode) = welcome.game_mode {
            self.game_mode(mode);
        }
        if let Some(limit) = welcome.turn_time_limit {
            self.session.set_turn_time_limit(limit);
        }
        let timed = self.session.game_mode().is_some_and(GameMode::is_timed);
        self.emit(Notification::ShowTimer(timed));
        if !welcome.message.is_empty() {
            self.emit(Notification::Announcement(welcome.message));
        }
    }

    fn player_joined(&mut self, joined: PlayerJoined) {
        match self.session.roster_mut().add(&joined.user_id) {
            RosterAdd::Full => {
                warn!(player_id = %joined.user_id, "Rejecting join into a full roster");
                self.emit(Notification::Diagnostic(format!(
                    "Ignored join from {}: match is full",
                    joined.user_id
                )));
                return;
            }
            RosterAdd::AlreadyPresent => {
                debug!(player_id = %joined.user_id, "Player already in roster");
            }
            RosterAdd::Added => {
                info!(player_id = %joined.user_id, "Player joined");
                let players = self.session.roster().players().to_vec();
                self.emit(Notification::RosterChanged(players));
                let name = joined.username.as_deref().unwrap_or(&joined.user_id);
                self.emit(Notification::Announcement(format!("{} joined", name)));
            }
        }

        if joined.user_id == *self.session.local_player()
            && let Some(symbol) = joined.symbol
        {
            match *self.session.local_symbol() {
                None => {
                    info!(%symbol, "Local symbol assigned");
                    self.session.assign_symbol(symbol);
                    self.emit(Notification::SymbolAssigned(symbol));
                }
                Some(existing) => {
                    warn!(%existing, offered = %symbol, "Rejecting second symbol assignment");
                }
            }
        }

        if let Some(mode) = joined.game_mode {
            self.game_mode(mode);
        }
        if let Some(limit) = joined.turn_time_limit {
            self.session.set_turn_time_limit(limit);
        }
        if let Some(board) = joined.board {
            self.board(board);
        }
        self.turn(joined.current_turn);
        self.time(joined.time_remaining);

        if *self.session.phase() == Phase::Matchmaking && self.session.roster().is_full() {
            info!("Roster complete, match started");
            self.session.set_phase(Phase::InMatch);
            self.emit(Notification::MatchStarted);
        }
    }

    fn player_left(&mut self, left: PlayerLeft) {
        if self.session.roster_mut().remove(&left.user_id) {
            info!(player_id = %left.user_id, "Player left");
            let players = self.session.roster().players().to_vec();
            self.emit(Notification::RosterChanged(players));
            if self.session.turn_owner().player() == Some(left.user_id.as_str()) {
                debug!("Turn owner left");
                self.set_owner(TurnOwner::Unknown);
            }
        } else {
            debug!(player_id = %left.user_id, "Departure of unknown player");
        }
        if !left.message.is_empty() {
            self.emit(Notification::Announcement(left.message));
        }
    }

    fn board_update(&mut self, update: BoardUpdate) {
        if let Some(mode) = update.game_mode {
            self.game_mode(mode);
        }
        match update.board {
            Some(board) => self.board(board),
            None => debug!("Board update without snapshot"),
        }
        self.turn(update.current_turn);
        self.time(update.time_remaining);
    }

    fn match_ended(&mut self, outcome: MatchOutcome, ended: MatchEnded) {
        info!(%outcome, winner = ?ended.winner, "Match ended");
        self.session.set_phase(Phase::Ended);
        if let Some(board) = ended.board {
            self.board(board);
        }
        self.session.clear_time_remaining();
        self.emit(Notification::HideTimer);
        self.emit(Notification::DisableBoard);
        self.emit(Notification::MatchOver {
            outcome,
            message: ended.message,
            winner: ended.winner,
        });
        self.emit(Notification::AllowNewGame);
    }

    fn timer_tick(&mut self, tick: TimerTick) {
        self.turn(tick.current_turn);
        if !self.time(Some(tick.time_remaining)) {
            debug!("Timer tick outside a timed match");
        }
    }

    fn game_mode(&mut self, mode: GameMode) {
        if *self.session.game_mode() != Some(mode) {
            debug!(%mode, "Game mode changed");
            self.session.set_game_mode(mode);
            self.emit(Notification::GameModeChanged(mode));
        }
    }

    fn board(&mut self, board: Board) {
        let cleared = self.session.board().cleared_in(&board);
        if !cleared.is_empty() {
            warn!(?cleared, "Board snapshot cleared occupied cells");
        }
        self.session.set_board(board);
        self.emit(Notification::BoardChanged(board));
    }

    fn turn(&mut self, current: Option<PlayerId>) {
        let Some(id) = current else {
            return;
        };
        let owner = if self.session.roster().contains(&id) {
            TurnOwner::Player(id)
        } else {
            warn!(player_id = %id, "Turn owner not in roster");
            TurnOwner::Unknown
        };
        self.set_owner(owner);
    }

    /// Stores the owner, notifying only on an actual change.
    fn set_owner(&mut self, owner: TurnOwner) {
        if *self.session.turn_owner() == owner {
            return;
        }
        self.session.set_turn_owner(owner.clone());
        let local_turn = self.session.is_local_turn();
        self.emit(Notification::TurnChanged { owner, local_turn });
    }

    /// Records a clock value in timed matches. Returns whether it applied.
    fn time(&mut self, remaining: Option<i64>) -> bool {
        let Some(raw) = remaining else {
            return false;
        };
        if !self.session.game_mode().is_some_and(GameMode::is_timed) {
            return false;
        }
        let remaining = clamp(raw);
        self.session.set_time_remaining(remaining);
        self.emit(Notification::timer(remaining));
        true
    }
}
