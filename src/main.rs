//! LIFTOFF — crash-game client
//!
//! Entry point. Loads configuration, initialises structured logging,
//! authenticates against the backend, connects the round stream, arms
//! per-slot automation from configuration, and runs the session loop
//! with graceful shutdown.

use anyhow::{Context, Result};
use secrecy::SecretString;
use tracing::{info, warn};

use liftoff::automation::{AutomationController, AutomationPolicy};
use liftoff::backend::BackendClient;
use liftoff::config::{self, AppConfig, SlotConfig};
use liftoff::session::{ReconnectPolicy, Session};
use liftoff::stream::ws::WsChannel;
use liftoff::stream::StreamClient;

const BANNER: &str = r#"
 _     ___ _____ _____ ___  _____ _____
| |   |_ _|  ___|_   _/ _ \|  ___|  ___|
| |    | || |_    | || | | | |_  | |_
| |___ | ||  _|   | || |_| |  _| |  _|
|_____|___|_|     |_| \___/|_|   |_|

  Crash-game client — rounds, slots, automation
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        client_name = %cfg.client.name,
        api_url = %cfg.connection.api_url,
        ws_url = %cfg.connection.ws_url,
        currency = %cfg.client.currency,
        "LIFTOFF starting up"
    );

    let token = config::AppConfig::resolve_env(&cfg.connection.token_env)
        .context("Bearer token is required for the channel and backend")?;

    // -- Backend collaborators -------------------------------------------

    let backend = BackendClient::new(&cfg.connection.api_url, SecretString::new(token.clone()))?;
    match backend.fetch_profile().await {
        Ok(profile) => info!(player = %profile, "Signed in"),
        Err(e) => warn!(error = %e, "Profile fetch failed — continuing without it"),
    }

    // -- Session ----------------------------------------------------------

    let automation = [
        controller_from(&cfg.slots.panel1),
        controller_from(&cfg.slots.panel2),
    ];
    log_automation("panel1", &cfg.slots.panel1);
    log_automation("panel2", &cfg.slots.panel2);

    let channel = WsChannel::new(cfg.connection.ws_url.clone(), SecretString::new(token));
    let reconnect = ReconnectPolicy {
        base: std::time::Duration::from_millis(cfg.connection.reconnect_base_ms),
        cap: std::time::Duration::from_millis(cfg.connection.reconnect_cap_ms),
    };
    let mut session = Session::new(StreamClient::new(channel), automation)
        .with_backend(backend)
        .with_reconnect(reconnect);

    session.connect().await.context("Initial channel connect failed")?;

    // -- Main loop ---------------------------------------------------------

    info!("Entering session loop. Press Ctrl+C to stop.");
    session.run().await?;

    let snapshot = session.snapshot();
    info!(
        phase = %snapshot.round_phase,
        balance = ?snapshot.balance,
        rounds_seen = snapshot.history.len(),
        "LIFTOFF shut down cleanly."
    );

    Ok(())
}

/// Build one slot's automation controller from its configuration.
fn controller_from(slot: &SlotConfig) -> AutomationController {
    AutomationController::new(
        AutomationPolicy {
            auto_bet_enabled: slot.auto_bet,
            auto_cash_out_enabled: slot.auto_cash_out,
            auto_cash_out_value: slot.auto_cash_out_value,
        },
        slot.base_amount,
    )
}

fn log_automation(label: &str, slot: &SlotConfig) {
    info!(
        slot = label,
        base_amount = %slot.base_amount,
        auto_bet = slot.auto_bet,
        auto_cash_out = slot.auto_cash_out,
        target = %slot.auto_cash_out_value,
        "Slot armed"
    );
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("liftoff=info"));

    let json_logging = std::env::var("LIFTOFF_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
