//! Automation controller.
//!
//! Per-slot auto-bet and auto-cash-out policies, each a pure reaction to
//! the composed state `(round phase, slot, current multiplier, connection)`.
//! The controller never mutates anything: it returns the action the session
//! should issue through its normal command surfaces, so eligibility is
//! always recomputed from current state at trigger time.
//!
//! One-shot guarantees come from the state machine itself: auto-bet's
//! precondition disappears the moment the slot turns PENDING, and
//! auto-cash-out is latched by the slot's cash-out request flag until the
//! round resets.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::slot::BetSlot;
use crate::types::{RoundPhase, SlotStatus};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Player-configured automation for one slot. Independent of the slot
/// lifecycle: persists across rounds until toggled off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutomationPolicy {
    pub auto_bet_enabled: bool,
    pub auto_cash_out_enabled: bool,
    pub auto_cash_out_value: Decimal,
}

impl Default for AutomationPolicy {
    fn default() -> Self {
        Self {
            auto_bet_enabled: false,
            auto_cash_out_enabled: false,
            auto_cash_out_value: dec!(2.00),
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Action the session should issue on behalf of the player.
#[derive(Debug, Clone, PartialEq)]
pub enum AutomationAction {
    PlaceBet { amount: Decimal, target: Option<Decimal> },
    CashOut,
}

/// Evaluates one slot's automation policy against the composed state.
#[derive(Debug, Clone)]
pub struct AutomationController {
    policy: AutomationPolicy,
    /// Amount sent with every automated bet.
    base_amount: Decimal,
}

impl AutomationController {
    pub fn new(policy: AutomationPolicy, base_amount: Decimal) -> Self {
        Self { policy, base_amount }
    }

    /// A controller with everything switched off.
    pub fn disarmed(base_amount: Decimal) -> Self {
        Self::new(AutomationPolicy::default(), base_amount)
    }

    pub fn policy(&self) -> &AutomationPolicy {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut AutomationPolicy {
        &mut self.policy
    }

    pub fn base_amount(&self) -> Decimal {
        self.base_amount
    }

    pub fn set_base_amount(&mut self, amount: Decimal) {
        self.base_amount = amount;
    }

    /// Decide whether automation should act right now.
    ///
    /// Automation is suppressed entirely while the channel is down; the
    /// player re-observes state after reconnect.
    pub fn evaluate(
        &self,
        phase: RoundPhase,
        slot: &BetSlot,
        multiplier: Decimal,
        connected: bool,
    ) -> Option<AutomationAction> {
        if !connected {
            return None;
        }

        match slot.status() {
            SlotStatus::Idle if phase.is_betable() && self.policy.auto_bet_enabled => {
                let target = self
                    .policy
                    .auto_cash_out_enabled
                    .then_some(self.policy.auto_cash_out_value);
                debug!(slot = %slot.label(), amount = %self.base_amount, "Auto-bet trigger");
                Some(AutomationAction::PlaceBet { amount: self.base_amount, target })
            }
            SlotStatus::Placed
                if self.policy.auto_cash_out_enabled
                    && !slot.cash_out_requested()
                    && multiplier >= self.policy.auto_cash_out_value =>
            {
                debug!(
                    slot = %slot.label(),
                    multiplier = %multiplier,
                    target = %self.policy.auto_cash_out_value,
                    "Auto-cash-out trigger"
                );
                Some(AutomationAction::CashOut)
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
