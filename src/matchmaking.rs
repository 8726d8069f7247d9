//! Sequences the transport calls that take a player from nothing to a match.
//!
//! Validate local input, authenticate, open the socket, register with the
//! matchmaker, wait for a pairing, join. Each failure names its step and
//! nothing is retried automatically.

use crate::config::ClientConfig;
use crate::session::{PlayerId, Session};
use crate::transport::{
    Credential, MatchFound, MatchHandle, MatchmakerRequest, Ticket, Transport, TransportError,
    TransportEvent,
};
use derive_more::{Display, Error};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Where in the matchmaking protocol a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum MatchmakingStep {
    /// Checking username, server and device id.
    Validate,
    /// Device authentication.
    Authenticate,
    /// Opening the realtime socket.
    Connect,
    /// Adding the matchmaker ticket.
    Register,
    /// Waiting for the matchmaker to pair us.
    AwaitMatch,
    /// Joining the matched session.
    Join,
}

/// Matchmaking failure with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Matchmaking failed at {}: {} at {}:{}", step, message, file, line)]
pub struct MatchmakingError {
    /// Failed step.
    pub step: MatchmakingStep,
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl MatchmakingError {
    /// Creates a new matchmaking error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(step: MatchmakingStep, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            step,
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }

    #[track_caller]
    fn from_transport(step: MatchmakingStep, err: TransportError) -> Self {
        Self::new(step, err.message)
    }
}

/// An authenticated socket.
pub struct Connection {
    /// Credential from authentication.
    pub credential: Credential,
    /// Socket events.
    pub events: mpsc::Receiver<TransportEvent>,
}

impl Connection {
    /// Our player identifier.
    pub fn local_player(&self) -> &PlayerId {
        self.credential.user_id()
    }
}

/// Result of a full linear run.
pub struct Matched {
    /// Live socket.
    pub connection: Connection,
    /// Session bound to the joined match.
    pub session: Session,
    /// Join details.
    pub handle: MatchHandle,
}

/// Drives the matchmaking protocol against a [`Transport`].
#[derive(Clone)]
pub struct Coordinator {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
}

impl Coordinator {
    /// Creates a coordinator for the given configuration.
    pub fn new(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Self { transport, config }
    }

    /// Configuration in use.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Step 1: refuses to touch the network with missing input.
    #[instrument(skip(self))]
    pub fn validate(&self) -> Result<(), MatchmakingError> {
        self.config
            .validate()
            .map_err(|e| MatchmakingError::new(MatchmakingStep::Validate, e.message))
    }

    /// Steps 1 to 3: validate, authenticate, open the socket.
    #[instrument(skip(self), fields(username = %self.config.username(), server = %self.config.server()))]
    pub async fn connect(&self) -> Result<Connection, MatchmakingError> {
        self.validate()?;

        let credential = self
            .transport
            .authenticate(self.config.device_id(), self.config.username())
            .await
            .map_err(|e| MatchmakingError::from_transport(MatchmakingStep::Authenticate, e))?;
        info!(user_id = %credential.user_id(), "Authenticated");

        let events = self
            .transport
            .open_socket(&credential)
            .await
            .map_err(|e| MatchmakingError::from_transport(MatchmakingStep::Connect, e))?;
        info!("Socket open");

        Ok(Connection { credential, events })
    }

    /// Step 4: moves an idle session into matchmaking and adds a ticket.
    ///
    /// On failure the session is returned to idle.
    #[instrument(skip(self, session), fields(mode = %self.config.game_mode()))]
    pub async fn register(&self, session: &mut Session) -> Result<Ticket, MatchmakingError> {
        let mode = *self.config.game_mode();
        if !session.begin_matchmaking(mode) {
            return Err(MatchmakingError::new(
                MatchmakingStep::Register,
                format!("Session is {}, not idle", session.phase()),
            ));
        }

        match self
            .transport
            .register_matchmaking(&MatchmakerRequest::for_mode(mode))
            .await
        {
            Ok(ticket) => {
                info!(%ticket, "Waiting for opponent");
                Ok(ticket)
            }
            Err(e) => {
                session.reset();
                Err(MatchmakingError::from_transport(MatchmakingStep::Register, e))
            }
        }
    }

    /// Step 6: joins the matched session and binds it.
    #[instrument(skip(self, session))]
    pub async fn join(
        &self,
        session: &mut Session,
        found: &MatchFound,
    ) -> Result<MatchHandle, MatchmakingError> {
        let handle = self
            .transport
            .join_match(found)
            .await
            .map_err(|e| MatchmakingError::from_transport(MatchmakingStep::Join, e))?;

        if !session.bind_match(handle.match_id().clone(), handle.presences()) {
            return Err(MatchmakingError::new(
                MatchmakingStep::Join,
                format!(
                    "Cannot bind match {} to a {} session",
                    handle.match_id(),
                    session.phase()
                ),
            ));
        }
        Ok(handle)
    }

    /// Runs the whole protocol, waiting on the socket for the pairing.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<Matched, MatchmakingError> {
        let mut connection = self.connect().await?;
        let mut session = Session::new(connection.local_player().clone());
        self.register(&mut session).await?;

        let found = loop {
            match connection.events.recv().await {
                Some(TransportEvent::MatchFound(found)) => break found,
                Some(TransportEvent::Message(message)) => {
                    debug!(opcode = message.opcode, "Dropping match data before join");
                }
                Some(TransportEvent::Disconnected { reason }) => {
                    warn!(%reason, "Socket closed while waiting for a match");
                    return Err(MatchmakingError::new(MatchmakingStep::AwaitMatch, reason));
                }
                None => {
                    return Err(MatchmakingError::new(
                        MatchmakingStep::AwaitMatch,
                        "Event stream ended",
                    ));
                }
            }
        };

        let handle = self.join(&mut session, &found).await?;
        Ok(Matched {
            connection,
            session,
            handle,
        })
    }
}
