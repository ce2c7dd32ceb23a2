//! Bet slot state machine.
//!
//! One instance per betting slot (a session operates exactly two). The
//! slot advances IDLE → PENDING → PLACED → WON strictly from round-stream
//! events and local commands, and hard-resets at every round boundary.
//!
//! Invariant: `server_bet_id` is set if and only if the status is PLACED
//! or WON. The slot never checks balance sufficiency — insufficient funds
//! is a remote-side rejection handled by the session (`reject`).

use rust_decimal::Decimal;

use crate::types::{LiftoffError, RoundPhase, SlotLabel, SlotStatus};

/// A single betting slot and its round-scoped state.
#[derive(Debug, Clone)]
pub struct BetSlot {
    label: SlotLabel,
    status: SlotStatus,
    amount: Decimal,
    server_bet_id: Option<String>,
    auto_cash_out_target: Option<Decimal>,
    /// Set once a cash-out command has been issued for the current bet;
    /// cleared only at round reset. Makes repeated cash-out triggers
    /// idempotent while the command is in flight.
    cash_out_requested: bool,
}

impl BetSlot {
    pub fn new(label: SlotLabel) -> Self {
        Self {
            label,
            status: SlotStatus::Idle,
            amount: Decimal::ZERO,
            server_bet_id: None,
            auto_cash_out_target: None,
            cash_out_requested: false,
        }
    }

    // -- Accessors -------------------------------------------------------

    pub fn label(&self) -> SlotLabel {
        self.label
    }

    pub fn status(&self) -> SlotStatus {
        self.status
    }

    /// Amount snapshotted when the current bet was placed.
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn server_bet_id(&self) -> Option<&str> {
        self.server_bet_id.as_deref()
    }

    pub fn auto_cash_out_target(&self) -> Option<Decimal> {
        self.auto_cash_out_target
    }

    pub fn cash_out_requested(&self) -> bool {
        self.cash_out_requested
    }

    // -- Local commands --------------------------------------------------

    /// Move IDLE → PENDING for a locally issued place-bet command.
    ///
    /// Only legal from IDLE during WAITING with a positive amount; the
    /// amount and optional target are snapshotted for the round. The
    /// caller is responsible for actually sending the command.
    pub fn begin_place(
        &mut self,
        amount: Decimal,
        target: Option<Decimal>,
        phase: RoundPhase,
    ) -> Result<(), LiftoffError> {
        if self.status != SlotStatus::Idle {
            return Err(LiftoffError::SlotBusy(self.label));
        }
        if !phase.is_betable() {
            return Err(LiftoffError::BetsClosed(phase));
        }
        if amount <= Decimal::ZERO {
            return Err(LiftoffError::InvalidAmount(amount));
        }
        self.status = SlotStatus::Pending;
        self.amount = amount;
        self.auto_cash_out_target = target;
        Ok(())
    }

    /// Record the intent to cash out the current bet and return the bet id
    /// to send. Legal only from PLACED, at most once per bet.
    pub fn request_cash_out(&mut self) -> Result<String, LiftoffError> {
        if self.status != SlotStatus::Placed {
            return Err(LiftoffError::NoActiveBet(self.label));
        }
        if self.cash_out_requested {
            return Err(LiftoffError::CashOutInFlight(self.label));
        }
        // PLACED implies the id is present.
        let bet_id = self
            .server_bet_id
            .clone()
            .ok_or(LiftoffError::NoActiveBet(self.label))?;
        self.cash_out_requested = true;
        Ok(bet_id)
    }

    /// Undo the cash-out request latch when the command could not be sent,
    /// so a later attempt is possible.
    pub(crate) fn clear_cash_out_request(&mut self) {
        self.cash_out_requested = false;
    }

    // -- Stream-driven transitions ---------------------------------------

    /// PENDING → PLACED on a bet confirmation for this slot.
    pub fn confirm(&mut self, bet_id: &str) -> Result<(), LiftoffError> {
        if self.status != SlotStatus::Pending {
            return Err(LiftoffError::MalformedMessage {
                destination: "/user/queue/bet-confirmations".into(),
                reason: format!("slot {} is {}, not PENDING", self.label, self.status),
            });
        }
        self.status = SlotStatus::Placed;
        self.server_bet_id = Some(bet_id.to_string());
        Ok(())
    }

    /// PLACED → WON once the cash-out is acknowledged. Terminal for the
    /// round; the id is kept so the winning bet stays identifiable until
    /// the round boundary clears it.
    pub fn settle_won(&mut self) -> Result<(), LiftoffError> {
        if self.status != SlotStatus::Placed {
            return Err(LiftoffError::NoActiveBet(self.label));
        }
        self.status = SlotStatus::Won;
        Ok(())
    }

    /// PENDING → IDLE after a remote rejection (e.g. insufficient
    /// balance). No-op in any other status.
    pub fn reject(&mut self) {
        if self.status == SlotStatus::Pending {
            self.status = SlotStatus::Idle;
            self.auto_cash_out_target = None;
        }
    }

    /// Hard reset at a round boundary: back to IDLE with no server id and
    /// a cleared cash-out latch, whatever the current status.
    pub fn reset(&mut self) {
        self.status = SlotStatus::Idle;
        self.server_bet_id = None;
        self.auto_cash_out_target = None;
        self.cash_out_requested = false;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
