//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (the bearer token) are referenced by env-var name in the config
//! and resolved at runtime via `std::env::var`.

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;

/// Lowest accepted auto-cash-out target.
pub const MIN_AUTO_CASH_OUT: Decimal = dec!(1.01);

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub client: ClientConfig,
    pub connection: ConnectionConfig,
    pub slots: SlotsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    pub name: String,
    pub currency: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConnectionConfig {
    /// REST base URL for the backend collaborators (profile, history).
    pub api_url: String,
    /// WebSocket URL of the round-broadcast channel.
    pub ws_url: String,
    /// Env var holding the bearer token attached to both.
    pub token_env: String,
    /// First reconnect delay after an unexpected disconnect.
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,
    /// Upper bound for the exponential reconnect backoff.
    #[serde(default = "default_reconnect_cap_ms")]
    pub reconnect_cap_ms: u64,
}

fn default_reconnect_base_ms() -> u64 {
    500
}

fn default_reconnect_cap_ms() -> u64 {
    15_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct SlotsConfig {
    pub panel1: SlotConfig,
    pub panel2: SlotConfig,
}

/// Per-slot betting defaults and automation arming.
#[derive(Debug, Deserialize, Clone)]
pub struct SlotConfig {
    /// Amount sent with every (manual or automated) bet from this slot.
    pub base_amount: Decimal,
    #[serde(default)]
    pub auto_bet: bool,
    #[serde(default)]
    pub auto_cash_out: bool,
    #[serde(default = "default_auto_cash_out_value")]
    pub auto_cash_out_value: Decimal,
}

fn default_auto_cash_out_value() -> Decimal {
    dec!(2.00)
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints that serde can't express.
    pub fn validate(&self) -> Result<()> {
        for (label, slot) in [("panel1", &self.slots.panel1), ("panel2", &self.slots.panel2)] {
            if slot.base_amount <= Decimal::ZERO {
                bail!("slot {label}: base_amount must be positive, got {}", slot.base_amount);
            }
            if slot.auto_cash_out && slot.auto_cash_out_value < MIN_AUTO_CASH_OUT {
                bail!(
                    "slot {label}: auto_cash_out_value must be at least {MIN_AUTO_CASH_OUT}, got {}",
                    slot.auto_cash_out_value
                );
            }
        }
        if self.connection.reconnect_base_ms == 0 {
            bail!("reconnect_base_ms must be non-zero");
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
