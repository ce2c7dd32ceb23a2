//! End-to-end session scenarios over a real WebSocket.

use std::time::Duration;

use rust_decimal_macros::dec;
use secrecy::SecretString;
use tokio::time::timeout;
use uuid::Uuid;

use liftoff::automation::{AutomationController, AutomationPolicy};
use liftoff::backend::BackendClient;
use liftoff::session::Session;
use liftoff::stream::ws::WsChannel;
use liftoff::stream::{StreamClient, DEST_CASH_OUT, DEST_PLACE_BET, QUEUE_BALANCE, QUEUE_BET_CONFIRMATIONS, TOPIC_GAME_UPDATES};
use liftoff::types::{RoundPhase, SlotLabel, SlotStatus};

use crate::mock_authority::MockAuthority;

fn token() -> SecretString {
    SecretString::new("integration-token".to_string())
}

fn manual_controllers() -> [AutomationController; 2] {
    [
        AutomationController::disarmed(dec!(20.00)),
        AutomationController::disarmed(dec!(20.00)),
    ]
}

/// Connect a session to the authority and give the server's socket task a
/// moment to subscribe to the broadcast feed.
async fn connect_session(
    authority: &MockAuthority,
    controllers: [AutomationController; 2],
) -> Session<WsChannel> {
    let channel = WsChannel::new(authority.ws_url(), token());
    let mut session = Session::new(StreamClient::new(channel), controllers)
        .with_backend(BackendClient::new(&authority.api_url(), token()).unwrap());
    session.connect().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    session
}

/// Pump one inbound message with a test deadline.
async fn pump(session: &mut Session<WsChannel>) -> bool {
    timeout(Duration::from_secs(2), session.pump_one())
        .await
        .expect("timed out waiting for an inbound message")
}

fn confirmation_body(panel: &str, bet_id: &str, amount: &str) -> String {
    format!(r#"{{"panelId": "{panel}", "betId": "{bet_id}", "betAmount": {amount}}}"#)
}

#[tokio::test]
async fn test_manual_lifecycle_over_socket() {
    let authority = MockAuthority::start().await;
    let mut session = connect_session(&authority, manual_controllers()).await;

    // Round opens for betting.
    authority.push_round(RoundPhase::Waiting, dec!(1.00), 10);
    assert!(pump(&mut session).await);
    assert_eq!(session.snapshot().round_phase, RoundPhase::Waiting);

    // Player bets 20.00 on panel1.
    session.place_bet(SlotLabel::Panel1, dec!(20.00), None).await.unwrap();
    assert_eq!(session.slot(SlotLabel::Panel1).status(), SlotStatus::Pending);
    let bets = authority.await_commands(DEST_PLACE_BET, 1).await;
    assert!(bets[0].body.contains("\"panelId\":\"panel1\""));

    // Authority confirms with a server bet id.
    authority.push(QUEUE_BET_CONFIRMATIONS, confirmation_body("panel1", "b1", "20.00"));
    assert!(pump(&mut session).await);
    assert_eq!(session.slot(SlotLabel::Panel1).status(), SlotStatus::Placed);
    assert_eq!(session.slot(SlotLabel::Panel1).server_bet_id(), Some("b1"));

    // The round runs up to 1.75 and the player cashes out.
    authority.push_round(RoundPhase::Running, dec!(1.20), 0);
    assert!(pump(&mut session).await);
    authority.push_round(RoundPhase::Running, dec!(1.75), 0);
    assert!(pump(&mut session).await);
    session.cash_out(SlotLabel::Panel1).await.unwrap();
    let cash_outs = authority.await_commands(DEST_CASH_OUT, 1).await;
    assert!(cash_outs[0].body.contains("b1"));

    // Balance update settles the win.
    authority.push(QUEUE_BALANCE, "115.00");
    assert!(pump(&mut session).await);
    assert_eq!(session.slot(SlotLabel::Panel1).status(), SlotStatus::Won);
    assert_eq!(session.snapshot().balance, Some(dec!(115.00)));

    // Next round boundary resets the slot.
    authority.push_round(RoundPhase::Waiting, dec!(1.00), 10);
    assert!(pump(&mut session).await);
    assert_eq!(session.slot(SlotLabel::Panel1).status(), SlotStatus::Idle);
    assert!(session.slot(SlotLabel::Panel1).server_bet_id().is_none());
}

#[tokio::test]
async fn test_automation_round_trip() {
    let authority = MockAuthority::start().await;
    let controllers = [
        AutomationController::new(
            AutomationPolicy {
                auto_bet_enabled: true,
                auto_cash_out_enabled: true,
                auto_cash_out_value: dec!(2.00),
            },
            dec!(5.00),
        ),
        AutomationController::disarmed(dec!(20.00)),
    ];
    let mut session = connect_session(&authority, controllers).await;

    // WAITING triggers exactly one auto-bet despite repeated ticks.
    authority.push_round(RoundPhase::Waiting, dec!(1.00), 5);
    assert!(pump(&mut session).await);
    authority.push_round(RoundPhase::Waiting, dec!(1.00), 4);
    assert!(pump(&mut session).await);
    let bets = authority.await_commands(DEST_PLACE_BET, 1).await;
    assert_eq!(bets.len(), 1);
    assert!(bets[0].body.contains("\"autoCashOutAt\":2.0"));

    let bet_id = Uuid::new_v4().to_string();
    authority.push(QUEUE_BET_CONFIRMATIONS, confirmation_body("panel1", &bet_id, "5.00"));
    assert!(pump(&mut session).await);
    assert_eq!(session.slot(SlotLabel::Panel1).status(), SlotStatus::Placed);

    // Multiplier climbs past the target: one cash-out, at the first
    // eligible tick.
    for tick in [dec!(1.50), dec!(1.80), dec!(2.10), dec!(2.40)] {
        authority.push_round(RoundPhase::Running, tick, 0);
        assert!(pump(&mut session).await);
    }
    let cash_outs = authority.await_commands(DEST_CASH_OUT, 1).await;
    assert_eq!(cash_outs.len(), 1);
    assert!(cash_outs[0].body.contains(&bet_id));

    authority.push(QUEUE_BALANCE, "110.50");
    assert!(pump(&mut session).await);
    assert_eq!(session.slot(SlotLabel::Panel1).status(), SlotStatus::Won);
}

#[tokio::test]
async fn test_malformed_frames_are_dropped() {
    let authority = MockAuthority::start().await;
    let mut session = connect_session(&authority, manual_controllers()).await;

    // Garbage on a known topic, a frame for an unknown topic, and then a
    // valid update: the session must survive and deliver the good one.
    authority.push(TOPIC_GAME_UPDATES, "{\"multiplier\": \"x\"}");
    authority.push("/topic/unknown", "{}");
    authority.push_round(RoundPhase::Running, dec!(1.42), 0);

    assert!(pump(&mut session).await);
    let snapshot = session.snapshot();
    assert_eq!(snapshot.round_phase, RoundPhase::Running);
    assert_eq!(snapshot.multiplier, dec!(1.42));
}

#[tokio::test]
async fn test_reconnect_preserves_slot_state() {
    let authority = MockAuthority::start().await;
    let mut session = connect_session(&authority, manual_controllers()).await;

    authority.push_round(RoundPhase::Waiting, dec!(1.00), 5);
    assert!(pump(&mut session).await);
    session.place_bet(SlotLabel::Panel1, dec!(20.00), None).await.unwrap();
    authority.push(QUEUE_BET_CONFIRMATIONS, confirmation_body("panel1", "b1", "20.00"));
    assert!(pump(&mut session).await);

    // Outage: the stream drains to disconnected.
    authority.drop_connections();
    while timeout(Duration::from_secs(2), session.pump_one()).await.unwrap() {}
    assert!(!session.is_connected());

    // Commands are refused while down; slot state is untouched.
    assert!(session.cash_out(SlotLabel::Panel1).await.is_err());
    assert_eq!(session.slot(SlotLabel::Panel1).status(), SlotStatus::Placed);

    // Replace the channel: the same session resumes processing.
    session.connect().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(session.slot(SlotLabel::Panel1).server_bet_id(), Some("b1"));
    authority.push_round(RoundPhase::Running, dec!(1.30), 0);
    assert!(pump(&mut session).await);
    assert_eq!(session.snapshot().multiplier, dec!(1.30));
}

#[tokio::test]
async fn test_history_refreshes_after_completed_round() {
    let authority = MockAuthority::start().await;
    let mut session = connect_session(&authority, manual_controllers()).await;

    authority.push_round(RoundPhase::Running, dec!(1.90), 0);
    assert!(pump(&mut session).await);
    authority.push_round(RoundPhase::Completed, dec!(2.45), 0);
    assert!(pump(&mut session).await);

    let snapshot = session.snapshot();
    assert_eq!(snapshot.last_crash, Some(dec!(2.45)));
    assert_eq!(snapshot.history, authority.history());
}

#[tokio::test]
async fn test_backend_collaborators() {
    let authority = MockAuthority::start().await;
    let backend = BackendClient::new(&authority.api_url(), token()).unwrap();

    let profile = backend.fetch_profile().await.unwrap();
    assert_eq!(profile.first_name, "Tester");
    assert_eq!(profile.balance, dec!(100.00));

    let history = backend.fetch_history().await.unwrap();
    assert_eq!(history, authority.history());
}

#[tokio::test]
async fn test_unauthenticated_handshake_rejected() {
    let authority = MockAuthority::start().await;

    // A bare handshake without the bearer header must be refused.
    let result = tokio_tungstenite::connect_async(authority.ws_url()).await;
    assert!(result.is_err());

    // The session's channel attaches the credential and gets through.
    let mut session = connect_session(&authority, manual_controllers()).await;
    assert!(session.is_connected());
    authority.push_round(RoundPhase::Waiting, dec!(1.00), 3);
    assert!(pump(&mut session).await);
}
