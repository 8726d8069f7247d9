//! GameClient and Coordinator against a recording transport.

mod common;

use common::{RecordingTransport, SentMove, config, message};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use strictly_client::{
    ConnectionStatus, Coordinator, GameClient, GameMode, MatchFound, MatchmakingStep,
    MoveRejection, Notification, Phase, TransportEvent, TurnOwner,
};
use tokio::sync::mpsc;

type Notifications = mpsc::UnboundedReceiver<Notification>;

async fn connected(transport: &Arc<RecordingTransport>) -> (GameClient, Notifications) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (client, _connection) = GameClient::connect(transport.clone(), config(), tx)
        .await
        .expect("fake transport connects");
    (client, rx)
}

/// Waits for the next notification matching `pred`.
async fn next_matching(
    rx: &mut Notifications,
    pred: impl Fn(&Notification) -> bool,
) -> Notification {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let notification = rx.recv().await.expect("channel open");
            if pred(&notification) {
                return notification;
            }
        }
    })
    .await
    .expect("notification arrived in time")
}

fn found(match_id: &str) -> TransportEvent {
    TransportEvent::MatchFound(MatchFound {
        match_id: Some(match_id.to_string()),
        token: None,
    })
}

fn join(user_id: &str, symbol: &str, current_turn: Option<&str>) -> serde_json::Value {
    json!({
        "user_id": user_id,
        "symbol": symbol,
        "current_turn": current_turn,
        "board_state": ["", "", "", "", "", "", "", "", ""],
    })
}

#[tokio::test]
async fn test_full_match_as_first_joiner() {
    let transport = Arc::new(RecordingTransport::new("A"));
    let (mut client, mut rx) = connected(&transport).await;

    client.find_match().await.expect("registered");
    assert_eq!(*client.session().phase(), Phase::Matchmaking);
    assert_eq!(transport.registrations(), 1);
    next_matching(&mut rx, |n| {
        *n == Notification::Status(ConnectionStatus::Searching)
    })
    .await;

    client.handle_event(found("m1")).await;
    assert_eq!(*client.session().match_id(), Some("m1".to_string()));
    next_matching(&mut rx, |n| matches!(n, Notification::MatchJoined { .. })).await;

    client
        .handle_event(message("m1", 2, join("A", "X", None)))
        .await;
    client
        .handle_event(message("m1", 2, join("B", "O", Some("A"))))
        .await;
    assert_eq!(*client.session().phase(), Phase::InMatch);
    assert!(client.session().is_local_turn());

    // No optimistic update: both submissions pass and both are sent.
    client.submit_move(1, 1).expect("first accepted");
    client.submit_move(1, 1).expect("second accepted");
    for _ in 0..2 {
        next_matching(&mut rx, |n| matches!(n, Notification::MoveSent { .. })).await;
    }
    let expected = SentMove {
        match_id: "m1".to_string(),
        opcode: 1,
        payload: json!({"row": 1, "col": 1}),
    };
    assert_eq!(transport.sent(), vec![expected.clone(), expected]);

    client
        .handle_event(message(
            "m1",
            4,
            json!({"board_state": ["", "", "", "", "X", "", "", "", ""], "current_turn": "B"}),
        ))
        .await;
    assert_eq!(
        client.submit_move(0, 0),
        Err(MoveRejection::NotYourTurn)
    );

    client
        .handle_event(message(
            "m1",
            5,
            json!({"message": "A wins!", "winner_id": "A"}),
        ))
        .await;
    assert_eq!(*client.session().phase(), Phase::Ended);
    assert_eq!(client.submit_move(2, 2), Err(MoveRejection::MatchOver));
    assert_eq!(transport.sent().len(), 2);

    client.new_game().await.expect("new game registers");
    assert_eq!(*client.session().phase(), Phase::Matchmaking);
    assert_eq!(*client.session().match_id(), None);
    assert_eq!(transport.registrations(), 2);
}

#[tokio::test]
async fn test_second_joiner_seeds_roster_from_join() {
    let transport = Arc::new(RecordingTransport::new("B"));
    *transport.presences.lock().unwrap() = vec!["A".to_string()];
    let (mut client, _rx) = connected(&transport).await;

    client.find_match().await.expect("registered");
    client.handle_event(found("m7")).await;
    assert!(client.session().roster().contains("A"));

    // Only our own join is broadcast after we arrive.
    client
        .handle_event(message("m7", 2, join("B", "O", Some("A"))))
        .await;

    let session = client.session();
    assert_eq!(*session.phase(), Phase::InMatch);
    assert_eq!(session.roster().len(), 2);
    assert_eq!(*session.turn_owner(), TurnOwner::Player("A".to_string()));
    assert!(!session.is_local_turn());
}

#[tokio::test]
async fn test_send_failure_comes_back_as_rejection() {
    let transport = Arc::new(RecordingTransport::new("A"));
    let (mut client, mut rx) = connected(&transport).await;
    client.find_match().await.expect("registered");
    client.handle_event(found("m1")).await;
    client
        .handle_event(message("m1", 2, join("A", "X", None)))
        .await;
    client
        .handle_event(message("m1", 2, join("B", "O", Some("A"))))
        .await;

    transport.fail_sends.store(true, Ordering::SeqCst);
    client.submit_move(0, 0).expect("passes local checks");

    let rejected = next_matching(&mut rx, |n| matches!(n, Notification::MoveRejected(_))).await;
    assert!(matches!(
        rejected,
        Notification::MoveRejected(MoveRejection::SendFailed(_))
    ));
    assert!(transport.sent().is_empty());
    assert_eq!(*client.session().phase(), Phase::InMatch);
}

#[tokio::test]
async fn test_new_game_refused_mid_match() {
    let transport = Arc::new(RecordingTransport::new("A"));
    let (mut client, _rx) = connected(&transport).await;
    client.find_match().await.expect("registered");

    let err = client.new_game().await.expect_err("already searching");
    assert_eq!(err.step, MatchmakingStep::Register);
    assert_eq!(transport.registrations(), 1);
}

#[tokio::test]
async fn test_disconnect_resets_and_stops_dispatch() {
    let transport = Arc::new(RecordingTransport::new("A"));
    let (mut client, mut rx) = connected(&transport).await;
    client.find_match().await.expect("registered");
    client.handle_event(found("m1")).await;

    client
        .handle_event(TransportEvent::Disconnected {
            reason: "closed by peer".to_string(),
        })
        .await;
    assert_eq!(*client.session().phase(), Phase::Idle);
    assert!(!client.is_dispatching());
    next_matching(&mut rx, |n| {
        *n == Notification::Status(ConnectionStatus::Disconnected)
    })
    .await;

    client
        .handle_event(message("m1", 2, join("A", "X", None)))
        .await;
    assert!(client.session().roster().is_empty());
}

#[tokio::test]
async fn test_registration_failure_returns_to_idle() {
    let transport = Arc::new(RecordingTransport::new("A"));
    transport.fail_register.store(true, Ordering::SeqCst);
    let (mut client, mut rx) = connected(&transport).await;

    let err = client.find_match().await.expect_err("matchmaker down");
    assert_eq!(err.step, MatchmakingStep::Register);
    assert_eq!(*client.session().phase(), Phase::Idle);
    next_matching(&mut rx, |n| {
        matches!(n, Notification::Status(ConnectionStatus::Failed(_)))
    })
    .await;
}

#[tokio::test]
async fn test_coordinator_runs_to_joined_match() {
    let transport = Arc::new(RecordingTransport::new("A"));
    transport.auto_match.store(true, Ordering::SeqCst);
    let coordinator = Coordinator::new(transport.clone(), config().with_game_mode(GameMode::Timed));

    let matched = coordinator.start().await.expect("matched");
    assert_eq!(matched.handle.match_id(), "m1");
    assert_eq!(*matched.session.phase(), Phase::Matchmaking);
    assert_eq!(*matched.session.match_id(), Some("m1".to_string()));
    assert_eq!(*matched.session.game_mode(), Some(GameMode::Timed));
    assert_eq!(matched.connection.local_player(), "A");

    let requests = transport.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].query(), "+properties.mode:timed");
}

#[tokio::test]
async fn test_coordinator_names_failing_step() {
    let transport = Arc::new(RecordingTransport::new("A"));
    let coordinator = Coordinator::new(transport.clone(), config().with_username(""));
    let err = coordinator.connect().await.err().expect("empty username");
    assert_eq!(err.step, MatchmakingStep::Validate);
    assert_eq!(transport.auth_calls.load(Ordering::SeqCst), 0);

    transport.fail_auth.store(true, Ordering::SeqCst);
    let coordinator = Coordinator::new(transport.clone(), config());
    let err = coordinator.connect().await.err().expect("auth refused");
    assert_eq!(err.step, MatchmakingStep::Authenticate);
    assert_eq!(transport.auth_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_connect_failure_reports_status() {
    let transport = Arc::new(RecordingTransport::new("A"));
    transport.fail_auth.store(true, Ordering::SeqCst);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let result = GameClient::connect(transport.clone(), config(), tx).await;
    assert!(result.is_err());
    next_matching(&mut rx, |n| {
        matches!(n, Notification::Status(ConnectionStatus::Failed(_)))
    })
    .await;
}

#[tokio::test]
async fn test_retry_after_failed_registration() {
    let transport = Arc::new(RecordingTransport::new("A"));
    transport.fail_register.store(true, Ordering::SeqCst);
    let (mut client, _rx) = connected(&transport).await;
    client.find_match().await.expect_err("matchmaker down");

    transport.fail_register.store(false, Ordering::SeqCst);
    client.retry().await.expect("second attempt registers");
    assert_eq!(*client.session().phase(), Phase::Matchmaking);
}

#[tokio::test]
async fn test_retry_after_failed_join() {
    let transport = Arc::new(RecordingTransport::new("A"));
    let (mut client, mut rx) = connected(&transport).await;
    client.find_match().await.expect("registered");

    client
        .handle_event(TransportEvent::MatchFound(MatchFound {
            match_id: None,
            token: None,
        }))
        .await;
    assert_eq!(*client.session().phase(), Phase::Idle);
    next_matching(&mut rx, |n| {
        matches!(n, Notification::Status(ConnectionStatus::Failed(_)))
    })
    .await;

    client.retry().await.expect("registers again");
    assert_eq!(*client.session().phase(), Phase::Matchmaking);
    assert_eq!(transport.registrations(), 2);
}

#[tokio::test]
async fn test_retry_refused_while_searching() {
    let transport = Arc::new(RecordingTransport::new("A"));
    let (mut client, _rx) = connected(&transport).await;
    client.find_match().await.expect("registered");

    let err = client.retry().await.expect_err("already searching");
    assert_eq!(err.step, MatchmakingStep::Register);
    assert_eq!(transport.registrations(), 1);
}

#[tokio::test]
async fn test_closed_socket_needs_fresh_connect() {
    let transport = Arc::new(RecordingTransport::new("A"));
    let (mut client, _rx) = connected(&transport).await;
    client
        .handle_event(TransportEvent::Disconnected {
            reason: "closed by peer".to_string(),
        })
        .await;

    let err = client.retry().await.expect_err("socket closed");
    assert_eq!(err.step, MatchmakingStep::Connect);
    assert_eq!(transport.registrations(), 0);

    let (mut client, _rx) = connected(&transport).await;
    assert!(client.is_dispatching());
    client.find_match().await.expect("registers on the new socket");
    assert_eq!(transport.auth_calls.load(Ordering::SeqCst), 2);
}
