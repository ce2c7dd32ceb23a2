//! Shared types for the LIFTOFF client.
//!
//! These types form the data model used across all modules: the wire
//! payloads exchanged with the game authority, the slot/round enums the
//! state machines run on, and the domain error taxonomy. They are designed
//! to be stable so that stream, slot, automation, and session modules can
//! depend on them without circular references.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Round phase
// ---------------------------------------------------------------------------

/// Phase of the shared multiplier round.
///
/// The authority cycles strictly WAITING → RUNNING → COMPLETED → WAITING.
/// Exactly one round is current at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoundPhase {
    /// Pre-round countdown; bets may be placed.
    Waiting,
    /// Multiplier is climbing; open bets may cash out.
    Running,
    /// Round crashed; the final multiplier is frozen.
    Completed,
}

impl RoundPhase {
    pub const ALL: &'static [RoundPhase] =
        &[RoundPhase::Waiting, RoundPhase::Running, RoundPhase::Completed];

    /// Whether new bets are accepted in this phase.
    pub fn is_betable(&self) -> bool {
        matches!(self, RoundPhase::Waiting)
    }

    /// Whether entering this phase resets slot and live-bet state.
    pub fn is_round_boundary(&self) -> bool {
        matches!(self, RoundPhase::Waiting | RoundPhase::Completed)
    }
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundPhase::Waiting => write!(f, "WAITING"),
            RoundPhase::Running => write!(f, "RUNNING"),
            RoundPhase::Completed => write!(f, "COMPLETED"),
        }
    }
}

impl std::str::FromStr for RoundPhase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "WAITING" => Ok(RoundPhase::Waiting),
            "RUNNING" => Ok(RoundPhase::Running),
            "COMPLETED" => Ok(RoundPhase::Completed),
            _ => Err(anyhow::anyhow!("Unknown round phase: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

/// One of the two fixed betting slots a session operates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotLabel {
    Panel1,
    Panel2,
}

impl SlotLabel {
    pub const ALL: &'static [SlotLabel] = &[SlotLabel::Panel1, SlotLabel::Panel2];

    /// Wire identifier used in commands and confirmations.
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotLabel::Panel1 => "panel1",
            SlotLabel::Panel2 => "panel2",
        }
    }

    /// Stable array index (Panel1 = 0, Panel2 = 1).
    pub fn index(&self) -> usize {
        match self {
            SlotLabel::Panel1 => 0,
            SlotLabel::Panel2 => 1,
        }
    }
}

impl fmt::Display for SlotLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SlotLabel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "panel1" => Ok(SlotLabel::Panel1),
            "panel2" => Ok(SlotLabel::Panel2),
            _ => Err(anyhow::anyhow!("Unknown slot label: {s}")),
        }
    }
}

/// Lifecycle status of a betting slot.
///
/// Transitions: Idle → Pending (bet sent) → Placed (confirmed) → Won
/// (cash-out settled). Any status returns to Idle at a round boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotStatus {
    Idle,
    Pending,
    Placed,
    Won,
}

impl SlotStatus {
    /// Whether the slot currently holds money in the round.
    pub fn is_open(&self) -> bool {
        matches!(self, SlotStatus::Pending | SlotStatus::Placed)
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotStatus::Idle => write!(f, "IDLE"),
            SlotStatus::Pending => write!(f, "PENDING"),
            SlotStatus::Placed => write!(f, "PLACED"),
            SlotStatus::Won => write!(f, "WON"),
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound payloads
// ---------------------------------------------------------------------------

/// Round broadcast pushed on `/topic/game-updates`.
///
/// During RUNNING the multiplier is monotonically non-decreasing and ≥ 1.00;
/// during WAITING the countdown decreases to 0; at COMPLETED the multiplier
/// carries the frozen crash point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundUpdate {
    pub multiplier: Decimal,
    pub status: RoundPhase,
    pub countdown: u32,
}

/// Confirmation that the authority accepted a placed bet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetConfirmation {
    pub panel_id: SlotLabel,
    pub bet_id: String,
    pub bet_amount: Decimal,
}

/// Status of another player's bet in the live feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LiveBetStatus {
    Playing,
    Won,
}

/// One entry in the round-scoped live-bets feed, keyed by username.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveBetEntry {
    pub username: String,
    pub bet_amount: Decimal,
    pub status: LiveBetStatus,
    #[serde(default)]
    pub cash_out_at: Option<Decimal>,
}

impl LiveBetEntry {
    pub fn is_cashed_out(&self) -> bool {
        self.status == LiveBetStatus::Won
    }
}

impl fmt::Display for LiveBetEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status, self.cash_out_at) {
            (LiveBetStatus::Won, Some(at)) => {
                write!(f, "{} ${:.2} cashed out @ {at:.2}x", self.username, self.bet_amount)
            }
            _ => write!(f, "{} ${:.2} playing", self.username, self.bet_amount),
        }
    }
}

/// A decoded inbound message from the round stream, one variant per
/// message class. Ordering is guaranteed within a class only.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Round(RoundUpdate),
    /// Full replacement of the player balance.
    Balance(Decimal),
    /// Free-text notice surfaced verbatim to the player.
    Notification(String),
    /// Free-text rejection/error surfaced verbatim to the player.
    ErrorNotice(String),
    BetConfirmed(BetConfirmation),
    LiveBet(LiveBetEntry),
}

// ---------------------------------------------------------------------------
// Outbound commands
// ---------------------------------------------------------------------------

/// Fire-and-forget bet placement published to `/app/game/bet`.
/// Success is observed via a later `BetConfirmation`, never as a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBetCommand {
    pub bet_amount: Decimal,
    pub panel_id: SlotLabel,
    pub auto_cash_out_at: Option<Decimal>,
}

/// Fire-and-forget cash-out published to `/app/game/cashout`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashOutCommand {
    pub bet_id: String,
}

// ---------------------------------------------------------------------------
// Backend collaborator payloads
// ---------------------------------------------------------------------------

/// Player profile returned by `GET /user/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
    pub id: u64,
    pub first_name: String,
    pub balance: Decimal,
}

impl fmt::Display for PlayerProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{}) balance ${:.2}", self.first_name, self.id, self.balance)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for LIFTOFF.
#[derive(Debug, thiserror::Error)]
pub enum LiftoffError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("round stream closed")]
    ChannelClosed,

    #[error("not connected to the round stream")]
    NotConnected,

    #[error("slot {0} already has an open bet")]
    SlotBusy(SlotLabel),

    #[error("slot {0} has no active bet to cash out")]
    NoActiveBet(SlotLabel),

    #[error("cash-out already in flight for slot {0}")]
    CashOutInFlight(SlotLabel),

    #[error("bets are closed: round phase is {0}")]
    BetsClosed(RoundPhase),

    #[error("invalid bet amount: {0}")]
    InvalidAmount(Decimal),

    #[error("malformed message on {destination}: {reason}")]
    MalformedMessage { destination: String, reason: String },

    #[error("backend request failed: {0}")]
    Backend(String),

    #[error("configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
