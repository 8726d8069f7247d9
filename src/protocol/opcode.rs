//! Opcode space shared with the match server.

use tracing::instrument;

/// Opcode used for outbound move messages.
pub const MOVE_OPCODE: i64 = 1;

/// Known inbound opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum Opcode {
    /// Per-player welcome after joining.
    Welcome,
    /// A presence joined the match.
    PlayerJoined,
    /// A presence left the match.
    PlayerLeft,
    /// Full board snapshot after a move.
    BoardUpdate,
    /// Someone completed a line.
    Win,
    /// Move rejected by the server.
    PlayerError,
    /// Board filled without a winner.
    Draw,
    /// Turn clock ran out.
    Timeout,
    /// Periodic turn clock broadcast.
    TimerTick,
}

impl Opcode {
    /// Maps a wire opcode to a known kind.
    #[instrument]
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Opcode::Welcome),
            2 => Some(Opcode::PlayerJoined),
            3 => Some(Opcode::PlayerLeft),
            4 => Some(Opcode::BoardUpdate),
            5 => Some(Opcode::Win),
            6 => Some(Opcode::PlayerError),
            7 => Some(Opcode::Draw),
            8 => Some(Opcode::Timeout),
            9 => Some(Opcode::TimerTick),
            _ => None,
        }
    }

    /// Returns the wire value.
    pub fn code(self) -> i64 {
        match self {
            Opcode::Welcome => 1,
            Opcode::PlayerJoined => 2,
            Opcode::PlayerLeft => 3,
            Opcode::BoardUpdate => 4,
            Opcode::Win => 5,
            Opcode::PlayerError => 6,
            Opcode::Draw => 7,
            Opcode::Timeout => 8,
            Opcode::TimerTick => 9,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_codes_are_stable() {
        for opcode in Opcode::iter() {
            assert_eq!(Opcode::from_code(opcode.code()), Some(opcode));
        }
        assert_eq!(Opcode::from_code(0), None);
        assert_eq!(Opcode::from_code(10), None);
    }
}
