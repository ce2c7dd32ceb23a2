//! Round stream client.
//!
//! Single source of truth for round broadcasts and the only component
//! permitted to emit commands to the remote authority. The push channel
//! itself is abstracted behind the [`Channel`] trait (subscribe-by-topic,
//! send-by-destination) so the session core can be exercised without a
//! socket; [`ws::WsChannel`] is the production implementation.
//!
//! Inbound frames are decoded into typed [`ServerMessage`]s. A frame that
//! fails to decode is logged and dropped — it never surfaces as an error
//! and never corrupts session state. Ordering is preserved per message
//! class (the single frame queue gives a total order, which is stronger).

pub mod ws;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{
    BetConfirmation, CashOutCommand, LiftoffError, LiveBetEntry, PlaceBetCommand, RoundUpdate,
    ServerMessage, SlotLabel,
};

// ---------------------------------------------------------------------------
// Destinations
// ---------------------------------------------------------------------------

pub const TOPIC_GAME_UPDATES: &str = "/topic/game-updates";
pub const TOPIC_LIVE_BETS: &str = "/topic/live-bets";
pub const QUEUE_BALANCE: &str = "/user/queue/balance";
pub const QUEUE_NOTIFICATIONS: &str = "/user/queue/notifications";
pub const QUEUE_ERRORS: &str = "/user/queue/errors";
pub const QUEUE_BET_CONFIRMATIONS: &str = "/user/queue/bet-confirmations";
pub const DEST_PLACE_BET: &str = "/app/game/bet";
pub const DEST_CASH_OUT: &str = "/app/game/cashout";

// ---------------------------------------------------------------------------
// Channel abstraction
// ---------------------------------------------------------------------------

/// A routed message on the channel: a destination topic/queue plus a
/// UTF-8 body (JSON for structured classes, free text for notices).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub destination: String,
    pub body: String,
}

/// Bidirectional push channel to the game authority.
///
/// Implementors must deliver inbound frames in arrival order per
/// destination and accept independent, unordered outbound sends.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Channel: Send {
    /// Establish (or re-establish) the connection.
    async fn connect(&mut self) -> Result<(), LiftoffError>;

    /// Next inbound frame, or `None` once the connection is gone.
    async fn next_frame(&mut self) -> Option<Frame>;

    /// Fire-and-forget send to a destination.
    async fn send(&mut self, destination: &str, body: String) -> Result<(), LiftoffError>;

    fn is_connected(&self) -> bool;

    /// Close the connection and release transport resources.
    async fn close(&mut self);
}

// ---------------------------------------------------------------------------
// Frame decoding
// ---------------------------------------------------------------------------

/// Decode a routed frame into its typed message class.
pub fn decode(frame: &Frame) -> Result<ServerMessage, LiftoffError> {
    let malformed = |reason: String| LiftoffError::MalformedMessage {
        destination: frame.destination.clone(),
        reason,
    };

    match frame.destination.as_str() {
        TOPIC_GAME_UPDATES => serde_json::from_str::<RoundUpdate>(&frame.body)
            .map(ServerMessage::Round)
            .map_err(|e| malformed(e.to_string())),
        QUEUE_BALANCE => serde_json::from_str::<Decimal>(&frame.body)
            .map(ServerMessage::Balance)
            .map_err(|e| malformed(e.to_string())),
        // Notices are free text, surfaced verbatim.
        QUEUE_NOTIFICATIONS => Ok(ServerMessage::Notification(frame.body.clone())),
        QUEUE_ERRORS => Ok(ServerMessage::ErrorNotice(frame.body.clone())),
        QUEUE_BET_CONFIRMATIONS => serde_json::from_str::<BetConfirmation>(&frame.body)
            .map(ServerMessage::BetConfirmed)
            .map_err(|e| malformed(e.to_string())),
        TOPIC_LIVE_BETS => serde_json::from_str::<LiveBetEntry>(&frame.body)
            .map(ServerMessage::LiveBet)
            .map_err(|e| malformed(e.to_string())),
        other => Err(malformed(format!("unknown destination {other}"))),
    }
}

// ---------------------------------------------------------------------------
// Stream client
// ---------------------------------------------------------------------------

/// Typed wrapper over a [`Channel`]: decodes inbound frames and
/// serializes the two outbound command shapes.
pub struct StreamClient<C: Channel> {
    channel: C,
}

impl<C: Channel> StreamClient<C> {
    pub fn new(channel: C) -> Self {
        Self { channel }
    }

    pub async fn connect(&mut self) -> Result<(), LiftoffError> {
        self.channel.connect().await
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    /// Receive the next decodable message. Malformed frames are dropped
    /// with a warning; `None` means the connection is gone.
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        loop {
            let frame = self.channel.next_frame().await?;
            match decode(&frame) {
                Ok(message) => return Some(message),
                Err(e) => warn!(error = %e, "Dropping undecodable frame"),
            }
        }
    }

    /// Publish a place-bet command. Success is observed asynchronously via
    /// a bet confirmation, never as a return value here.
    pub async fn send_place_bet(
        &mut self,
        panel_id: SlotLabel,
        bet_amount: Decimal,
        auto_cash_out_at: Option<Decimal>,
    ) -> Result<(), LiftoffError> {
        if !self.channel.is_connected() {
            return Err(LiftoffError::NotConnected);
        }
        let command = PlaceBetCommand { bet_amount, panel_id, auto_cash_out_at };
        let body = serde_json::to_string(&command)
            .map_err(|e| LiftoffError::Connection(format!("encode place-bet: {e}")))?;
        debug!(panel = %panel_id, amount = %bet_amount, "Sending place-bet");
        self.channel.send(DEST_PLACE_BET, body).await
    }

    /// Publish a cash-out command for a confirmed bet.
    pub async fn send_cash_out(&mut self, bet_id: &str) -> Result<(), LiftoffError> {
        if !self.channel.is_connected() {
            return Err(LiftoffError::NotConnected);
        }
        let command = CashOutCommand { bet_id: bet_id.to_string() };
        let body = serde_json::to_string(&command)
            .map_err(|e| LiftoffError::Connection(format!("encode cash-out: {e}")))?;
        debug!(bet_id, "Sending cash-out");
        self.channel.send(DEST_CASH_OUT, body).await
    }

    pub async fn close(&mut self) {
        self.channel.close().await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
