//! Transport error types.

use derive_more::{Display, Error};
use tracing::instrument;

/// Which transport boundary failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum TransportErrorKind {
    /// Device authentication was refused or unreachable.
    Auth,
    /// The realtime socket could not be opened.
    Connect,
    /// The matchmaker refused the ticket.
    Matchmaking,
    /// Joining the matched session failed.
    Join,
    /// An outbound message could not be delivered.
    Send,
    /// A request/response query (RPC) failed.
    Query,
    /// The server answered with something we cannot read.
    Protocol,
}

/// Transport failure with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Transport error ({}): {} at {}:{}", kind, message, file, line)]
pub struct TransportError {
    /// Failed boundary.
    pub kind: TransportErrorKind,
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl TransportError {
    /// Creates a new transport error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Shorthand for an authentication failure.
    #[track_caller]
    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Auth, message)
    }

    /// Shorthand for a socket failure.
    #[track_caller]
    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    /// Shorthand for a send failure.
    #[track_caller]
    pub fn send(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Send, message)
    }

    /// Shorthand for an unreadable server answer.
    #[track_caller]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Protocol, message)
    }
}

impl From<reqwest::Error> for TransportError {
    #[track_caller]
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_decode() {
            TransportErrorKind::Protocol
        } else {
            TransportErrorKind::Query
        };
        Self::new(kind, format!("HTTP error: {}", err))
    }
}

impl From<serde_json::Error> for TransportError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        Self::protocol(format!("JSON error: {}", err))
    }
}
