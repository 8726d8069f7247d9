//! In-memory transport that records what the client sends.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use strictly_client::{
    ClientConfig, Credential, InboundMessage, LeaderboardSource, MatchFound, MatchHandle,
    MatchmakerRequest, RankedPlayer, Ticket, Transport, TransportError, TransportErrorKind,
    TransportEvent,
};
use tokio::sync::mpsc;

/// One recorded `send_move` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMove {
    pub match_id: String,
    pub opcode: i64,
    pub payload: Value,
}

pub struct RecordingTransport {
    user_id: String,
    pub sent: Mutex<Vec<SentMove>>,
    pub requests: Mutex<Vec<MatchmakerRequest>>,
    pub auth_calls: AtomicUsize,
    pub fail_auth: AtomicBool,
    pub fail_register: AtomicBool,
    pub fail_sends: AtomicBool,
    /// Push a `MatchFound` as soon as a ticket is registered.
    pub auto_match: AtomicBool,
    pub presences: Mutex<Vec<String>>,
    pub leaderboard: Mutex<Option<Vec<RankedPlayer>>>,
    events: Mutex<Option<mpsc::Sender<TransportEvent>>>,
}

impl RecordingTransport {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            sent: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            auth_calls: AtomicUsize::new(0),
            fail_auth: AtomicBool::new(false),
            fail_register: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            auto_match: AtomicBool::new(false),
            presences: Mutex::new(Vec::new()),
            leaderboard: Mutex::new(None),
            events: Mutex::new(None),
        }
    }

    pub fn sent(&self) -> Vec<SentMove> {
        self.sent.lock().unwrap().clone()
    }

    pub fn registrations(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn credential(&self) -> Credential {
        Credential::new("token".to_string(), self.user_id.clone(), "tester".to_string())
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn authenticate(
        &self,
        _device_id: &str,
        username: &str,
    ) -> Result<Credential, TransportError> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_auth.load(Ordering::SeqCst) {
            return Err(TransportError::auth("401 Unauthorized"));
        }
        Ok(Credential::new(
            "token".to_string(),
            self.user_id.clone(),
            username.to_string(),
        ))
    }

    async fn open_socket(
        &self,
        _credential: &Credential,
    ) -> Result<mpsc::Receiver<TransportEvent>, TransportError> {
        let (tx, rx) = mpsc::channel(64);
        *self.events.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn register_matchmaking(
        &self,
        request: &MatchmakerRequest,
    ) -> Result<Ticket, TransportError> {
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(TransportError::new(
                TransportErrorKind::Matchmaking,
                "matchmaker unavailable",
            ));
        }
        self.requests.lock().unwrap().push(request.clone());
        if self.auto_match.load(Ordering::SeqCst)
            && let Some(events) = self.events.lock().unwrap().as_ref()
        {
            let _ = events.try_send(TransportEvent::MatchFound(MatchFound {
                match_id: Some("m1".to_string()),
                token: None,
            }));
        }
        Ok(Ticket(format!("ticket-{}", self.registrations())))
    }

    async fn join_match(&self, found: &MatchFound) -> Result<MatchHandle, TransportError> {
        let match_id = found
            .match_id
            .clone()
            .ok_or_else(|| TransportError::new(TransportErrorKind::Join, "no match id"))?;
        Ok(MatchHandle::new(
            match_id,
            self.presences.lock().unwrap().clone(),
        ))
    }

    async fn send_move(
        &self,
        match_id: &str,
        opcode: i64,
        payload: Vec<u8>,
    ) -> Result<(), TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::send("socket closed"));
        }
        self.sent.lock().unwrap().push(SentMove {
            match_id: match_id.to_string(),
            opcode,
            payload: serde_json::from_slice(&payload).unwrap(),
        });
        Ok(())
    }

    async fn disconnect(&self) {
        self.events.lock().unwrap().take();
    }
}

#[async_trait]
impl LeaderboardSource for RecordingTransport {
    async fn query_top_players(
        &self,
        _credential: &Credential,
        _limit: usize,
    ) -> Result<Vec<RankedPlayer>, TransportError> {
        self.leaderboard
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| TransportError::new(TransportErrorKind::Query, "rpc failed"))
    }
}

/// A config that passes validation.
pub fn config() -> ClientConfig {
    ClientConfig::default()
        .with_username("tester")
        .with_device_id("device-1")
}

/// Match data for `match_id` with a JSON body.
pub fn message(match_id: &str, opcode: i64, body: Value) -> TransportEvent {
    TransportEvent::Message(InboundMessage {
        match_id: Some(match_id.to_string()),
        opcode,
        payload: serde_json::to_vec(&body).unwrap(),
    })
}
