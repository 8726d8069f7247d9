//! Inbound match protocol: opcodes, payload schemas and the event decoder.

mod decoder;
mod opcode;
mod payloads;

pub use decoder::{DecodeError, Envelope, MatchOutcome, SessionEvent, decode, decode_envelope};
pub use opcode::{MOVE_OPCODE, Opcode};
pub use payloads::{
    BoardUpdate, MatchEnded, MovePayload, PlayerError, PlayerJoined, PlayerLeft, TimerTick,
    Welcome,
};
