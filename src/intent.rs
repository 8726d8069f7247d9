//! Local validation and forwarding of move intents.
//!
//! The gate only checks what the client can know: bounds, phase, turn and
//! occupancy of the last server snapshot. Legality beyond that belongs to the
//! server. The board is never updated optimistically, so two submissions
//! before the next snapshot are both accepted.

use crate::games::tictactoe::Position;
use crate::protocol::{MOVE_OPCODE, MovePayload};
use crate::session::{MatchId, Phase, Session};
use crate::transport::Transport;
use derive_more::{Display, Error};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Why a move did not go out.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum MoveRejection {
    /// Coordinates outside the 3x3 board.
    #[display("({row}, {col}) is off the board")]
    OutOfBounds {
        /// Requested row.
        row: i64,
        /// Requested column.
        col: i64,
    },
    /// No match is bound to the session.
    #[display("not joined to a match")]
    NoMatch,
    /// The match has not started.
    #[display("match not in progress ({_0})")]
    NotInMatch(#[error(not(source))] Phase),
    /// The match is over; start a new game first.
    #[display("match is over")]
    MatchOver,
    /// Opponent's turn.
    #[display("not your turn")]
    NotYourTurn,
    /// Cell already taken on the last known board.
    #[display("{_0} is already occupied")]
    CellOccupied(#[error(not(source))] Position),
    /// Transport refused the send.
    #[display("send failed: {_0}")]
    SendFailed(#[error(not(source))] String),
}

/// A move that passed the local checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedMove {
    /// Match the move is for.
    pub match_id: MatchId,
    /// Target cell.
    pub position: Position,
}

impl AcceptedMove {
    /// Wire body for the move.
    pub fn payload(&self) -> MovePayload {
        MovePayload::new(self.position.row(), self.position.col())
    }
}

/// Checks a move against the session without sending anything.
#[instrument(skip(session), fields(phase = %session.phase()))]
pub fn check(session: &Session, row: i64, col: i64) -> Result<AcceptedMove, MoveRejection> {
    let position =
        Position::from_row_col(row, col).ok_or(MoveRejection::OutOfBounds { row, col })?;

    match *session.phase() {
        Phase::InMatch => {}
        Phase::Ended => return Err(MoveRejection::MatchOver),
        phase => return Err(MoveRejection::NotInMatch(phase)),
    }
    let match_id = session.match_id().clone().ok_or(MoveRejection::NoMatch)?;
    if !session.is_local_turn() {
        return Err(MoveRejection::NotYourTurn);
    }
    if !session.board().is_empty(position) {
        return Err(MoveRejection::CellOccupied(position));
    }

    debug!(%position, "Move passed local checks");
    Ok(AcceptedMove { match_id, position })
}

/// Validates move intents and forwards accepted ones.
#[derive(Clone)]
pub struct IntentGate {
    transport: Arc<dyn Transport>,
}

impl IntentGate {
    /// Creates a gate that sends through `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Sends an accepted move. The session is not touched.
    #[instrument(skip(self), fields(match_id = %accepted.match_id, position = %accepted.position))]
    pub async fn forward(&self, accepted: &AcceptedMove) -> Result<(), MoveRejection> {
        let payload = serde_json::to_vec(&accepted.payload())
            .map_err(|e| MoveRejection::SendFailed(e.to_string()))?;
        self.transport
            .send_move(&accepted.match_id, MOVE_OPCODE, payload)
            .await
            .map_err(|e| {
                warn!(error = %e, "Move send failed");
                MoveRejection::SendFailed(e.message)
            })?;
        info!("Move sent");
        Ok(())
    }

    /// Checks and sends in one step.
    #[instrument(skip(self, session))]
    pub async fn submit_move(
        &self,
        session: &Session,
        row: i64,
        col: i64,
    ) -> Result<AcceptedMove, MoveRejection> {
        let accepted = check(session, row, col)?;
        self.forward(&accepted).await?;
        Ok(accepted)
    }
}
