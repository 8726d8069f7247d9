//! Nakama adapter: REST for authentication and RPC, WebSocket for realtime.

use super::{
    Credential, InboundMessage, LeaderboardSource, MatchFound, MatchHandle, MatchmakerRequest,
    Ticket, Transport, TransportError, TransportErrorKind, TransportEvent,
};
use crate::config::ServerAddress;
use crate::leaderboard::RankedPlayer;
use crate::session::PlayerId;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, instrument, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<Result<Value, String>>>>>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const EVENT_BUFFER: usize = 64;
const OUTBOUND_BUFFER: usize = 32;
const LEADERBOARD_RPC: &str = "GetTopPlayers";

struct Socket {
    outbound: mpsc::Sender<Message>,
    pending: Pending,
    reader: JoinHandle<()>,
}

/// [`Transport`] and [`LeaderboardSource`] backed by a Nakama server.
pub struct NakamaTransport {
    http: reqwest::Client,
    http_base: String,
    socket_base: String,
    server_key: String,
    next_cid: AtomicU64,
    socket: Mutex<Option<Socket>>,
}

impl NakamaTransport {
    /// Creates an adapter for the given server. Nothing connects yet.
    #[instrument(skip(server_key))]
    pub fn new(address: &ServerAddress, server_key: impl Into<String>, use_ssl: bool) -> Self {
        let (http, ws) = if use_ssl { ("https", "wss") } else { ("http", "ws") };
        Self {
            http: reqwest::Client::new(),
            http_base: format!("{}://{}", http, address),
            socket_base: format!("{}://{}/ws", ws, address),
            server_key: server_key.into(),
            next_cid: AtomicU64::new(1),
            socket: Mutex::new(None),
        }
    }

    /// Sends a `cid`-tagged request and waits for its response body.
    #[instrument(skip(self, body))]
    async fn request(
        &self,
        kind: TransportErrorKind,
        key: &str,
        body: Value,
    ) -> Result<Value, TransportError> {
        let cid = self.next_cid.fetch_add(1, Ordering::Relaxed).to_string();
        let mut envelope = Map::new();
        envelope.insert("cid".to_string(), Value::String(cid.clone()));
        envelope.insert(key.to_string(), body);
        let text = serde_json::to_string(&Value::Object(envelope))?;

        let (tx, rx) = oneshot::channel();
        let (outbound, pending) = {
            let guard = self.socket.lock().await;
            let socket = guard
                .as_ref()
                .ok_or_else(|| TransportError::new(kind, "Socket not open"))?;
            socket.pending.lock().await.insert(cid.clone(), tx);
            (socket.outbound.clone(), Arc::clone(&socket.pending))
        };

        debug!(%cid, "Sending realtime request");
        if outbound.send(Message::Text(text)).await.is_err() {
            pending.lock().await.remove(&cid);
            return Err(TransportError::new(kind, "Socket closed"));
        }

        match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(Ok(response))) => Ok(response),
            Ok(Ok(Err(message))) => Err(TransportError::new(kind, message)),
            Ok(Err(_)) => Err(TransportError::new(kind, "Socket closed before response")),
            Err(_) => {
                pending.lock().await.remove(&cid);
                Err(TransportError::new(kind, "Timed out waiting for response"))
            }
        }
    }
}

#[async_trait]
impl Transport for NakamaTransport {
    #[instrument(skip(self))]
    async fn authenticate(
        &self,
        device_id: &str,
        username: &str,
    ) -> Result<Credential, TransportError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/v2/account/authenticate/device", self.http_base),
            &[("create", "true"), ("username", username)],
        )
        .map_err(|e| TransportError::auth(format!("Invalid server URL: {}", e)))?;

        let response = self
            .http
            .post(url)
            .basic_auth(&self.server_key, Some(""))
            .json(&json!({ "id": device_id }))
            .send()
            .await
            .map_err(|e| TransportError::auth(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, %body, "Authentication rejected");
            return Err(TransportError::auth(format!("Server returned {}: {}", status, body)));
        }

        let session: RawSession = response
            .json()
            .await
            .map_err(|e| TransportError::auth(format!("Unreadable session: {}", e)))?;
        let user_id = user_id_from_token(&session.token)?;
        info!(%user_id, "Authenticated");
        Ok(Credential::new(session.token, user_id, username.to_string()))
    }

    #[instrument(skip(self, credential), fields(user_id = %credential.user_id()))]
    async fn open_socket(
        &self,
        credential: &Credential,
    ) -> Result<mpsc::Receiver<TransportEvent>, TransportError> {
        self.disconnect().await;

        let url = format!(
            "{}?lang=en&status=true&token={}",
            self.socket_base,
            credential.token()
        );
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::connect(format!("WebSocket handshake failed: {}", e)))?;
        info!(url = %self.socket_base, "Socket connected");

        let (write, read) = stream.split();
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let (events, events_rx) = mpsc::channel(EVENT_BUFFER);
        let pending: Pending = Arc::default();

        tokio::spawn(write_loop(write, outbound_rx));
        let reader = tokio::spawn(read_loop(read, Arc::clone(&pending), events));

        *self.socket.lock().await = Some(Socket {
            outbound,
            pending,
            reader,
        });
        Ok(events_rx)
    }

    #[instrument(skip(self), fields(mode = %request.mode()))]
    async fn register_matchmaking(
        &self,
        request: &MatchmakerRequest,
    ) -> Result<Ticket, TransportError> {
        let body = json!({
            "min_count": request.min_count(),
            "max_count": request.max_count(),
            "query": request.query(),
            "string_properties": { "mode": request.mode().to_string() },
        });
        let response = self
            .request(TransportErrorKind::Matchmaking, "matchmaker_add", body)
            .await?;
        let ticket: RawTicket = serde_json::from_value(
            response
                .get("matchmaker_ticket")
                .cloned()
                .unwrap_or(Value::Null),
        )
        .map_err(|e| {
            TransportError::new(
                TransportErrorKind::Matchmaking,
                format!("Missing ticket: {}", e),
            )
        })?;
        info!(ticket = %ticket.ticket, "Matchmaker ticket issued");
        Ok(Ticket(ticket.ticket))
    }

    #[instrument(skip(self))]
    async fn join_match(&self, found: &MatchFound) -> Result<MatchHandle, TransportError> {
        let body = match (&found.token, &found.match_id) {
            (Some(token), _) => json!({ "token": token }),
            (None, Some(match_id)) => json!({ "match_id": match_id }),
            (None, None) => {
                return Err(TransportError::new(
                    TransportErrorKind::Join,
                    "Match found without token or id",
                ));
            }
        };
        let response = self
            .request(TransportErrorKind::Join, "match_join", body)
            .await?;
        let joined: RawMatch =
            serde_json::from_value(response.get("match").cloned().unwrap_or(Value::Null))
                .map_err(|e| {
                    TransportError::new(TransportErrorKind::Join, format!("Bad join reply: {}", e))
                })?;

        let own = joined.self_presence.map(|p| p.user_id);
        let presences: Vec<PlayerId> = joined
            .presences
            .into_iter()
            .map(|p| p.user_id)
            .filter(|id| Some(id) != own.as_ref())
            .collect();
        info!(match_id = %joined.match_id, present = presences.len(), "Joined match");
        Ok(MatchHandle::new(joined.match_id, presences))
    }

    #[instrument(skip(self, payload), fields(len = payload.len()))]
    async fn send_move(
        &self,
        match_id: &str,
        opcode: i64,
        payload: Vec<u8>,
    ) -> Result<(), TransportError> {
        let text = serde_json::to_string(&json!({
            "match_data_send": {
                "match_id": match_id,
                "op_code": opcode.to_string(),
                "data": STANDARD.encode(&payload),
            }
        }))?;
        let outbound = {
            let guard = self.socket.lock().await;
            guard
                .as_ref()
                .map(|s| s.outbound.clone())
                .ok_or_else(|| TransportError::send("Socket not open"))?
        };
        outbound
            .send(Message::Text(text))
            .await
            .map_err(|_| TransportError::send("Socket closed"))?;
        debug!("Match data sent");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn disconnect(&self) {
        let Some(socket) = self.socket.lock().await.take() else {
            return;
        };
        info!("Closing socket");
        let _ = socket.outbound.send(Message::Close(None)).await;
        socket.pending.lock().await.clear();
        socket.reader.abort();
    }
}

#[async_trait]
impl LeaderboardSource for NakamaTransport {
    #[instrument(skip(self, credential))]
    async fn query_top_players(
        &self,
        credential: &Credential,
        limit: usize,
    ) -> Result<Vec<RankedPlayer>, TransportError> {
        // The RPC body is itself a JSON-encoded string.
        let body = serde_json::to_string(&json!({ "n": limit }))?;
        let response = self
            .http
            .post(format!("{}/v2/rpc/{}", self.http_base, LEADERBOARD_RPC))
            .bearer_auth(credential.token())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::new(
                TransportErrorKind::Query,
                format!("RPC returned {}", status),
            ));
        }
        let rpc: RawRpc = response.json().await?;
        parse_ranked(rpc.payload)
    }
}

async fn write_loop(mut write: SplitSink<WsStream, Message>, mut outbound: mpsc::Receiver<Message>) {
    while let Some(message) = outbound.recv().await {
        let closing = matches!(message, Message::Close(_));
        if let Err(e) = write.send(message).await {
            warn!(error = %e, "Socket write failed");
            break;
        }
        if closing {
            break;
        }
    }
    let _ = write.close().await;
    debug!("Writer finished");
}

async fn read_loop(
    mut read: SplitStream<WsStream>,
    pending: Pending,
    events: mpsc::Sender<TransportEvent>,
) {
    let reason = loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => {
                if let Some(event) = route(&text, &pending).await
                    && events.send(event).await.is_err()
                {
                    break "event receiver dropped".to_string();
                }
            }
            Some(Ok(Message::Close(frame))) => {
                break frame
                    .map(|f| f.reason.to_string())
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| "closed by server".to_string());
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                error!(error = %e, "Socket read failed");
                break e.to_string();
            }
            None => break "stream ended".to_string(),
        }
    };

    info!(%reason, "Socket reader stopped");
    pending.lock().await.clear();
    let _ = events.send(TransportEvent::Disconnected { reason }).await;
}

/// Resolves responses and turns pushes into events.
async fn route(text: &str, pending: &Pending) -> Option<TransportEvent> {
    let envelope: RawEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Unreadable realtime envelope");
            return None;
        }
    };

    if let Some(cid) = envelope.cid {
        let Some(waiter) = pending.lock().await.remove(&cid) else {
            debug!(%cid, "Response without waiter");
            return None;
        };
        let result = match envelope.error {
            Some(err) => Err(err.message),
            None => Ok(Value::Object(envelope.body)),
        };
        let _ = waiter.send(result);
        return None;
    }

    if let Some(data) = envelope.match_data {
        return match data.into_inbound() {
            Ok(message) => Some(TransportEvent::Message(message)),
            Err(e) => {
                warn!(error = %e, "Dropping malformed match data");
                None
            }
        };
    }

    if let Some(matched) = envelope.matchmaker_matched {
        info!(match_id = ?matched.match_id, "Matchmaker matched");
        return Some(TransportEvent::MatchFound(MatchFound {
            match_id: matched.match_id.filter(|s| !s.is_empty()),
            token: matched.token.filter(|s| !s.is_empty()),
        }));
    }

    if let Some(err) = envelope.error {
        warn!(code = err.code, message = %err.message, "Server error push");
    } else {
        debug!(keys = ?envelope.body.keys().collect::<Vec<_>>(), "Ignoring realtime push");
    }
    None
}

/// Reads the `uid` claim out of a session JWT.
fn user_id_from_token(token: &str) -> Result<PlayerId, TransportError> {
    let claims = token
        .split('.')
        .nth(1)
        .ok_or_else(|| TransportError::auth("Session token is not a JWT"))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(claims.trim_end_matches('='))
        .map_err(|e| TransportError::auth(format!("Bad token encoding: {}", e)))?;
    let claims: RawClaims = serde_json::from_slice(&bytes)
        .map_err(|e| TransportError::auth(format!("Bad token claims: {}", e)))?;
    if claims.uid.is_empty() {
        return Err(TransportError::auth("Token carries no user id"));
    }
    Ok(claims.uid)
}

/// The RPC payload is a JSON string holding an array (or `null`).
fn parse_ranked(payload: Option<Value>) -> Result<Vec<RankedPlayer>, TransportError> {
    let rows = match payload {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::String(text)) if text.trim().is_empty() => return Ok(Vec::new()),
        Some(Value::String(text)) => serde_json::from_str::<Option<Vec<RankedPlayer>>>(&text)?,
        Some(other) => serde_json::from_value::<Option<Vec<RankedPlayer>>>(other)?,
    };
    Ok(rows.unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct RawSession {
    token: String,
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    #[serde(default)]
    uid: String,
}

#[derive(Debug, Deserialize)]
struct RawRpc {
    payload: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    cid: Option<String>,
    error: Option<RawError>,
    match_data: Option<RawMatchData>,
    matchmaker_matched: Option<RawMatchmakerMatched>,
    #[serde(flatten)]
    body: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct RawMatchData {
    match_id: Option<String>,
    op_code: Value,
    #[serde(default)]
    data: Option<String>,
}

impl RawMatchData {
    fn into_inbound(self) -> Result<InboundMessage, TransportError> {
        let opcode = match &self.op_code {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
        .ok_or_else(|| TransportError::protocol(format!("Bad op_code {}", self.op_code)))?;
        let payload = match self.data {
            Some(data) => STANDARD
                .decode(data)
                .map_err(|e| TransportError::protocol(format!("Bad match data: {}", e)))?,
            None => Vec::new(),
        };
        Ok(InboundMessage {
            match_id: self.match_id.filter(|s| !s.is_empty()),
            opcode,
            payload,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawMatchmakerMatched {
    match_id: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTicket {
    ticket: String,
}

#[derive(Debug, Deserialize)]
struct RawPresence {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct RawMatch {
    match_id: String,
    #[serde(default)]
    presences: Vec<RawPresence>,
    #[serde(rename = "self")]
    self_presence: Option<RawPresence>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt(claims: &str) -> String {
        format!(
            "{}.{}.signature",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(claims.as_bytes())
        )
    }

    #[test]
    fn test_user_id_from_token() {
        let token = jwt(r#"{"uid":"4ec4f126-3f9d","usn":"alice","exp":1700000000}"#);
        assert_eq!(user_id_from_token(&token).unwrap(), "4ec4f126-3f9d");
        assert!(user_id_from_token("not-a-jwt").is_err());
        assert!(user_id_from_token(&jwt(r#"{"usn":"alice"}"#)).is_err());
    }

    #[tokio::test]
    async fn test_route_match_data() {
        let pending: Pending = Arc::default();
        let text = format!(
            r#"{{"match_data":{{"match_id":"m1.nakama","op_code":"4","data":"{}"}}}}"#,
            STANDARD.encode(br#"{"board_state":[]}"#)
        );
        let event = route(&text, &pending).await;
        assert_eq!(
            event,
            Some(TransportEvent::Message(InboundMessage {
                match_id: Some("m1.nakama".to_string()),
                opcode: 4,
                payload: br#"{"board_state":[]}"#.to_vec(),
            }))
        );
    }

    #[tokio::test]
    async fn test_route_resolves_pending_request() {
        let pending: Pending = Arc::default();
        let (tx, rx) = oneshot::channel();
        pending.lock().await.insert("7".to_string(), tx);

        let event = route(
            r#"{"cid":"7","matchmaker_ticket":{"ticket":"t-1"}}"#,
            &pending,
        )
        .await;
        assert_eq!(event, None);
        let body = rx.await.unwrap().unwrap();
        assert_eq!(body["matchmaker_ticket"]["ticket"], "t-1");
    }

    #[tokio::test]
    async fn test_route_error_response() {
        let pending: Pending = Arc::default();
        let (tx, rx) = oneshot::channel();
        pending.lock().await.insert("3".to_string(), tx);

        route(
            r#"{"cid":"3","error":{"code":3,"message":"Match not found"}}"#,
            &pending,
        )
        .await;
        assert_eq!(rx.await.unwrap(), Err("Match not found".to_string()));
    }

    #[tokio::test]
    async fn test_route_matchmaker_matched() {
        let pending: Pending = Arc::default();
        let event = route(
            r#"{"matchmaker_matched":{"ticket":"t-1","token":"join-token","users":[]}}"#,
            &pending,
        )
        .await;
        assert_eq!(
            event,
            Some(TransportEvent::MatchFound(MatchFound {
                match_id: None,
                token: Some("join-token".to_string()),
            }))
        );
    }

    #[test]
    fn test_parse_ranked_payload_forms() {
        let rows = parse_ranked(Some(Value::String(
            r#"[{"username":"alice","owner_id":"a","score":12}]"#.to_string(),
        )))
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].score, 12);

        assert!(parse_ranked(Some(Value::String("null".to_string()))).unwrap().is_empty());
        assert!(parse_ranked(None).unwrap().is_empty());
        assert!(parse_ranked(Some(Value::String("{oops".to_string()))).is_err());
    }

    #[tokio::test]
    async fn test_send_without_socket_fails() {
        let address = ServerAddress::parse("127.0.0.1").unwrap();
        let transport = NakamaTransport::new(&address, "defaultkey", false);
        let err = transport
            .send_move("m1", 1, b"{}".to_vec())
            .await
            .unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Send);
    }
}
