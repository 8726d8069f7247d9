//! Event loop glue: socket events in, notifications out.

use crate::config::ClientConfig;
use crate::intent::{self, AcceptedMove, IntentGate, MoveRejection};
use crate::matchmaking::{Connection, Coordinator, MatchmakingError, MatchmakingStep};
use crate::protocol::decode_envelope;
use crate::session::{self, ConnectionStatus, Notification, Phase, PlayerId, Session, Transition};
use crate::transport::{MatchFound, Ticket, Transport, TransportEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

/// Owns the session and is its only mutator.
pub struct GameClient {
    coordinator: Coordinator,
    gate: IntentGate,
    transport: Arc<dyn Transport>,
    session: Session,
    notifications: mpsc::UnboundedSender<Notification>,
    dispatching: bool,
}

impl GameClient {
    /// Creates a client for an already authenticated player.
    pub fn new(
        transport: Arc<dyn Transport>,
        config: ClientConfig,
        local_player: PlayerId,
        notifications: mpsc::UnboundedSender<Notification>,
    ) -> Self {
        Self {
            coordinator: Coordinator::new(Arc::clone(&transport), config),
            gate: IntentGate::new(Arc::clone(&transport)),
            transport,
            session: Session::new(local_player),
            notifications,
            dispatching: true,
        }
    }

    /// Authenticates, opens the socket and builds a client around it.
    ///
    /// Progress and failures are reported as [`Notification::Status`].
    #[instrument(skip_all)]
    pub async fn connect(
        transport: Arc<dyn Transport>,
        config: ClientConfig,
        notifications: mpsc::UnboundedSender<Notification>,
    ) -> Result<(Self, Connection), MatchmakingError> {
        let coordinator = Coordinator::new(Arc::clone(&transport), config.clone());
        let _ = notifications.send(Notification::Status(ConnectionStatus::Authenticating));
        let connection = match coordinator.connect().await {
            Ok(connection) => connection,
            Err(e) => {
                error!(error = %e, "Connection failed");
                let _ = notifications.send(Notification::Status(ConnectionStatus::Failed(
                    e.message.clone(),
                )));
                return Err(e);
            }
        };
        let _ = notifications.send(Notification::Status(ConnectionStatus::Connecting));
        let client = Self::new(
            transport,
            config,
            connection.local_player().clone(),
            notifications,
        );
        Ok((client, connection))
    }

    /// Current session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Whether events are still dispatched.
    pub fn is_dispatching(&self) -> bool {
        self.dispatching
    }

    fn emit(&self, notification: Notification) {
        if self.notifications.send(notification).is_err() {
            debug!("Notification receiver dropped");
        }
    }

    fn commit(&mut self, transition: Transition) {
        self.session = transition.session;
        for notification in transition.notifications {
            self.emit(notification);
        }
    }

    /// Registers with the matchmaker.
    #[instrument(skip(self), fields(phase = %self.session.phase()))]
    pub async fn find_match(&mut self) -> Result<Ticket, MatchmakingError> {
        let result = self.coordinator.register(&mut self.session).await;
        match &result {
            Ok(_) => self.emit(Notification::Status(ConnectionStatus::Searching)),
            Err(e) => {
                warn!(error = %e, "Matchmaking registration failed");
                self.emit(Notification::Status(ConnectionStatus::Failed(e.message.clone())));
            }
        }
        result
    }

    /// Feeds one socket event through decoder and reducer.
    #[instrument(skip(self, event), fields(phase = %self.session.phase()))]
    pub async fn handle_event(&mut self, event: TransportEvent) {
        if !self.dispatching {
            debug!("Dropping event after disconnect");
            return;
        }
        match event {
            TransportEvent::Message(message) => match decode_envelope(&message) {
                Ok(envelope) => {
                    let transition = session::apply(self.session.clone(), envelope);
                    self.commit(transition);
                }
                Err(e) => debug!(error = %e, "Undecodable message dropped"),
            },
            TransportEvent::MatchFound(found) => self.join(found).await,
            TransportEvent::Disconnected { reason } => {
                warn!(%reason, "Transport disconnected");
                let transition = session::reset(self.session.clone());
                self.commit(transition);
                self.emit(Notification::Status(ConnectionStatus::Disconnected));
                self.dispatching = false;
            }
        }
    }

    async fn join(&mut self, found: MatchFound) {
        if *self.session.phase() != Phase::Matchmaking {
            warn!("Match found outside matchmaking, ignoring");
            return;
        }
        match self.coordinator.join(&mut self.session, &found).await {
            Ok(handle) => {
                info!(match_id = %handle.match_id(), "Match joined");
                self.emit(Notification::Status(ConnectionStatus::Connected));
                self.emit(Notification::MatchJoined {
                    match_id: handle.match_id().clone(),
                    phase: *self.session.phase(),
                });
            }
            Err(e) => {
                error!(error = %e, "Join failed");
                let transition = session::reset(self.session.clone());
                self.commit(transition);
                self.emit(Notification::Status(ConnectionStatus::Failed(e.message)));
            }
        }
    }

    /// Checks a move and, when accepted, sends it in the background.
    ///
    /// Returns as soon as the local checks are done. A failed send comes
    /// back as [`Notification::MoveRejected`] with
    /// [`MoveRejection::SendFailed`].
    #[instrument(skip(self), fields(phase = %self.session.phase()))]
    pub fn submit_move(&self, row: i64, col: i64) -> Result<AcceptedMove, MoveRejection> {
        let accepted = match intent::check(&self.session, row, col) {
            Ok(accepted) => accepted,
            Err(rejection) => {
                debug!(%rejection, "Move rejected locally");
                self.emit(Notification::MoveRejected(rejection.clone()));
                return Err(rejection);
            }
        };

        let gate = self.gate.clone();
        let notifications = self.notifications.clone();
        let pending = accepted.clone();
        tokio::spawn(async move {
            let notification = match gate.forward(&pending).await {
                Ok(()) => Notification::MoveSent {
                    row: pending.position.row(),
                    col: pending.position.col(),
                },
                Err(rejection) => Notification::MoveRejected(rejection),
            };
            let _ = notifications.send(notification);
        });
        Ok(accepted)
    }

    /// Registers again after a failed registration or join left the session idle.
    ///
    /// A closed socket cannot be retried here; build a new client with
    /// [`GameClient::connect`] instead.
    #[instrument(skip(self), fields(phase = %self.session.phase()))]
    pub async fn retry(&mut self) -> Result<Ticket, MatchmakingError> {
        if !self.dispatching {
            return Err(MatchmakingError::new(
                MatchmakingStep::Connect,
                "Socket closed, reconnect first",
            ));
        }
        if *self.session.phase() != Phase::Idle {
            return Err(MatchmakingError::new(
                MatchmakingStep::Register,
                format!("Nothing to retry while {}", self.session.phase()),
            ));
        }
        info!("Retrying matchmaking");
        self.find_match().await
    }

    /// Resets the session and looks for another opponent.
    #[instrument(skip(self), fields(phase = %self.session.phase()))]
    pub async fn new_game(&mut self) -> Result<Ticket, MatchmakingError> {
        if matches!(*self.session.phase(), Phase::Matchmaking | Phase::InMatch) {
            return Err(MatchmakingError::new(
                MatchmakingStep::Register,
                "A match is already in progress",
            ));
        }
        let transition = session::reset(self.session.clone());
        self.commit(transition);
        self.find_match().await
    }

    /// Stops dispatching, closes the socket and returns to idle.
    #[instrument(skip(self))]
    pub async fn disconnect(&mut self) {
        info!("Disconnecting");
        self.dispatching = false;
        self.transport.disconnect().await;
        let transition = session::reset(self.session.clone());
        self.commit(transition);
        self.emit(Notification::Status(ConnectionStatus::Disconnected));
    }
}
