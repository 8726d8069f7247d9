//! Session synchronization: the local mirror of a match and its reducer.

mod notification;
mod reducer;
mod state;

pub use notification::{ConnectionStatus, LOW_TIME_THRESHOLD, Notification};
pub use reducer::{Transition, apply, reset};
pub use state::{
    GameMode, MATCH_SIZE, MatchId, Phase, PlayerId, Roster, RosterAdd, Session, TurnOwner,
};
