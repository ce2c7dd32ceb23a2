//! Session orchestrator.
//!
//! Top-level composition: owns the round stream client, the two bet slot
//! state machines, and their automation controllers; fans inbound
//! broadcasts into round-phase state and slot transitions; exposes the two
//! command surfaces and a read-only snapshot for rendering.
//!
//! All mutation happens on delivery of an inbound message or a local
//! command — one event-processing turn at a time, no parallel mutation of
//! slot or round state. After every turn the automation controllers are
//! re-evaluated against the fresh composed state.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::automation::{AutomationAction, AutomationController};
use crate::backend::BackendClient;
use crate::slot::BetSlot;
use crate::stream::{Channel, StreamClient};
use crate::types::{
    BetConfirmation, LiftoffError, LiveBetEntry, RoundPhase, RoundUpdate, ServerMessage,
    SlotLabel, SlotStatus,
};

// ---------------------------------------------------------------------------
// Reconnect policy
// ---------------------------------------------------------------------------

/// Exponential backoff for channel replacement after an unexpected
/// disconnect. Slot state survives the outage; in-flight commands do not.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub cap: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { base: Duration::from_millis(500), cap: Duration::from_secs(15) }
    }
}

impl ReconnectPolicy {
    /// Delay before the given attempt (0-based): base · 2^attempt, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.base.saturating_mul(factor).min(self.cap)
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Read-only view of the session handed to the presentation layer.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub round_phase: RoundPhase,
    pub multiplier: Decimal,
    pub countdown: u32,
    pub balance: Option<Decimal>,
    /// Frozen crash multiplier of the most recently completed round.
    pub last_crash: Option<Decimal>,
    pub slot1: BetSlot,
    pub slot2: BetSlot,
    pub live_bets: Vec<LiveBetEntry>,
    /// Recent crash points, newest ordering as served by the backend.
    pub history: Vec<Decimal>,
    pub connected: bool,
    pub last_notice: Option<String>,
    pub taken_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct Session<C: Channel> {
    id: Uuid,
    stream: StreamClient<C>,
    backend: Option<BackendClient>,
    reconnect: ReconnectPolicy,

    round_phase: RoundPhase,
    multiplier: Decimal,
    countdown: u32,
    /// No automation runs until the first round broadcast has been seen.
    seen_round: bool,

    balance: Option<Decimal>,
    last_crash: Option<Decimal>,
    last_notice: Option<String>,

    slots: [BetSlot; 2],
    automation: [AutomationController; 2],
    /// Bet id → owning slot, maintained per round.
    bet_owner: HashMap<String, SlotLabel>,
    live_bets: Vec<LiveBetEntry>,

    history: Vec<Decimal>,
    history_stale: bool,

    started_at: DateTime<Utc>,
}

impl<C: Channel> Session<C> {
    pub fn new(stream: StreamClient<C>, automation: [AutomationController; 2]) -> Self {
        Self {
            id: Uuid::new_v4(),
            stream,
            backend: None,
            reconnect: ReconnectPolicy::default(),
            round_phase: RoundPhase::Waiting,
            multiplier: Decimal::ONE,
            countdown: 0,
            seen_round: false,
            balance: None,
            last_crash: None,
            last_notice: None,
            slots: [BetSlot::new(SlotLabel::Panel1), BetSlot::new(SlotLabel::Panel2)],
            automation,
            bet_owner: HashMap::new(),
            live_bets: Vec::new(),
            history: Vec::new(),
            history_stale: true,
            started_at: Utc::now(),
        }
    }

    /// Attach the backend collaborator used for crash-history refreshes.
    pub fn with_backend(mut self, backend: BackendClient) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    // -- Accessors -------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_connected()
    }

    pub fn slot(&self, label: SlotLabel) -> &BetSlot {
        &self.slots[label.index()]
    }

    pub fn automation_mut(&mut self, label: SlotLabel) -> &mut AutomationController {
        &mut self.automation[label.index()]
    }

    /// Which slot owns a confirmed bet id this round, if any.
    pub fn slot_for_bet(&self, bet_id: &str) -> Option<SlotLabel> {
        self.bet_owner.get(bet_id).copied()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            round_phase: self.round_phase,
            multiplier: self.multiplier,
            countdown: self.countdown,
            balance: self.balance,
            last_crash: self.last_crash,
            slot1: self.slots[0].clone(),
            slot2: self.slots[1].clone(),
            live_bets: self.live_bets.clone(),
            history: self.history.clone(),
            connected: self.stream.is_connected(),
            last_notice: self.last_notice.clone(),
            taken_at: Utc::now(),
        }
    }

    // -- Connection ------------------------------------------------------

    pub async fn connect(&mut self) -> Result<(), LiftoffError> {
        self.stream.connect().await?;
        info!(session = %self.id, "Session connected to round stream");
        Ok(())
    }

    // -- Command surfaces ------------------------------------------------

    /// Place a bet from the given slot. Legal only from IDLE during
    /// WAITING while connected; the slot turns PENDING until the authority
    /// confirms or rejects.
    pub async fn place_bet(
        &mut self,
        label: SlotLabel,
        amount: Decimal,
        target: Option<Decimal>,
    ) -> Result<(), LiftoffError> {
        if !self.stream.is_connected() {
            return Err(LiftoffError::NotConnected);
        }
        let phase = self.round_phase;
        self.slots[label.index()].begin_place(amount, target, phase)?;

        match self.stream.send_place_bet(label, amount, target).await {
            Ok(()) => {
                info!(slot = %label, amount = %amount, "Bet submitted");
                Ok(())
            }
            Err(e) => {
                // Nothing reached the authority; release the slot.
                self.slots[label.index()].reject();
                Err(e)
            }
        }
    }

    /// Cash out the given slot's confirmed bet. Rejected locally if the
    /// slot holds no server bet id.
    pub async fn cash_out(&mut self, label: SlotLabel) -> Result<(), LiftoffError> {
        if !self.stream.is_connected() {
            return Err(LiftoffError::NotConnected);
        }
        let bet_id = self.slots[label.index()].request_cash_out()?;

        match self.stream.send_cash_out(&bet_id).await {
            Ok(()) => {
                info!(slot = %label, bet_id = %bet_id, "Cash-out requested");
                Ok(())
            }
            Err(e) => {
                // The command never left; allow a retry.
                self.slots[label.index()].clear_cash_out_request();
                Err(e)
            }
        }
    }

    // -- Event turn ------------------------------------------------------

    /// Apply one inbound message, then re-evaluate automation against the
    /// resulting composed state.
    pub async fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Round(update) => self.apply_round_update(update),
            ServerMessage::BetConfirmed(confirmation) => self.apply_confirmation(confirmation),
            ServerMessage::Balance(balance) => self.apply_balance(balance),
            ServerMessage::Notification(text) => {
                info!(notice = %text, "Notification");
                self.last_notice = Some(text);
            }
            ServerMessage::ErrorNotice(text) => self.apply_error_notice(text),
            ServerMessage::LiveBet(entry) => self.apply_live_bet(entry),
        }
        self.run_automation().await;
    }

    fn apply_round_update(&mut self, update: RoundUpdate) {
        let previous = self.round_phase;
        let entered = !self.seen_round || update.status != previous;
        self.seen_round = true;
        self.round_phase = update.status;
        self.multiplier = update.multiplier;
        self.countdown = update.countdown;

        if !entered {
            return;
        }
        debug!(from = %previous, to = %update.status, "Round phase change");
        if update.status == RoundPhase::Completed {
            self.last_crash = Some(update.multiplier);
            self.history_stale = true;
            info!(crash = %update.multiplier, "Round crashed");
        }
        if update.status.is_round_boundary() {
            self.round_reset();
        }
    }

    fn apply_confirmation(&mut self, confirmation: BetConfirmation) {
        let label = confirmation.panel_id;
        if let Some(owner) = self.bet_owner.get(&confirmation.bet_id) {
            warn!(bet_id = %confirmation.bet_id, owner = %owner, "Duplicate confirmation ignored");
            return;
        }
        match self.slots[label.index()].confirm(&confirmation.bet_id) {
            Ok(()) => {
                self.bet_owner.insert(confirmation.bet_id.clone(), label);
                info!(
                    slot = %label,
                    bet_id = %confirmation.bet_id,
                    amount = %confirmation.bet_amount,
                    "Bet placed"
                );
            }
            Err(e) => warn!(slot = %label, error = %e, "Ignoring confirmation"),
        }
    }

    fn apply_balance(&mut self, balance: Decimal) {
        self.balance = Some(balance);
        debug!(balance = %balance, "Balance replaced");

        // A balance change acknowledges a cash-out currently in flight;
        // unsolicited balance updates (deposits) settle nothing.
        for slot in self.slots.iter_mut() {
            if slot.status() == SlotStatus::Placed
                && slot.cash_out_requested()
                && slot.settle_won().is_ok()
            {
                info!(slot = %slot.label(), multiplier = %self.multiplier, "Cash-out settled");
            }
        }
    }

    fn apply_error_notice(&mut self, text: String) {
        warn!(notice = %text, "Rejection from authority");
        // The rejection payload carries no slot attribution, so any
        // unconfirmed bet is released rather than left stuck PENDING.
        for slot in self.slots.iter_mut() {
            if slot.status() == SlotStatus::Pending {
                slot.reject();
            }
        }
        self.last_notice = Some(text);
    }

    fn apply_live_bet(&mut self, entry: LiveBetEntry) {
        match self.live_bets.iter_mut().find(|b| b.username == entry.username) {
            Some(existing) => *existing = entry,
            None => self.live_bets.push(entry),
        }
    }

    /// Total reset at a round boundary: both slots, the id map, and the
    /// round-scoped live-bets feed.
    fn round_reset(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.reset();
        }
        self.bet_owner.clear();
        self.live_bets.clear();
    }

    // -- Automation ------------------------------------------------------

    async fn run_automation(&mut self) {
        if !self.seen_round {
            return;
        }
        for label in SlotLabel::ALL {
            let action = self.automation[label.index()].evaluate(
                self.round_phase,
                &self.slots[label.index()],
                self.multiplier,
                self.stream.is_connected(),
            );
            let result = match action {
                Some(AutomationAction::PlaceBet { amount, target }) => {
                    self.place_bet(*label, amount, target).await
                }
                Some(AutomationAction::CashOut) => self.cash_out(*label).await,
                None => Ok(()),
            };
            if let Err(e) = result {
                // Automation must never take the session down.
                warn!(slot = %label, error = %e, "Automation command failed");
            }
        }
    }

    // -- Driver ----------------------------------------------------------

    /// Receive and apply the next inbound message, then refresh crash
    /// history if a round completed. Returns `false` once the channel is
    /// gone.
    pub async fn pump_one(&mut self) -> bool {
        match self.stream.recv().await {
            Some(message) => {
                self.handle_message(message).await;
                self.refresh_history_if_stale().await;
                true
            }
            None => false,
        }
    }

    /// Process the stream until shutdown, replacing the channel with
    /// backoff whenever it drops. On teardown the channel is closed and
    /// slot state is discarded with the session.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                alive = self.pump_one() => {
                    if alive {
                        continue;
                    }
                    warn!("Round stream dropped — reconnecting");
                    let mut attempt = 0u32;
                    loop {
                        let delay = self.reconnect.delay_for(attempt);
                        tokio::select! {
                            _ = sleep(delay) => {}
                            _ = &mut shutdown => {
                                info!("Shutdown signal received during reconnect.");
                                self.stream.close().await;
                                return Ok(());
                            }
                        }
                        match self.stream.connect().await {
                            Ok(()) => {
                                info!(attempt, "Round stream replaced");
                                break;
                            }
                            Err(e) => {
                                warn!(error = %e, attempt, "Reconnect failed");
                                attempt = attempt.saturating_add(1);
                            }
                        }
                    }
                }
                _ = &mut shutdown => {
                    info!("Shutdown signal received.");
                    break;
                }
            }
        }

        self.stream.close().await;
        info!(session = %self.id, "Session closed.");
        Ok(())
    }

    async fn refresh_history_if_stale(&mut self) {
        if !self.history_stale {
            return;
        }
        let Some(backend) = &self.backend else {
            self.history_stale = false;
            return;
        };
        match backend.fetch_history().await {
            Ok(history) => {
                debug!(rounds = history.len(), "Crash history refreshed");
                self.history = history;
            }
            Err(e) => warn!(error = %e, "Failed to refresh crash history"),
        }
        // One attempt per completed round either way.
        self.history_stale = false;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
