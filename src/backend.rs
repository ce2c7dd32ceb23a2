//! Backend collaborators.
//!
//! Thin REST client for the out-of-scope endpoints the session consumes
//! as black boxes: the current player profile and the recent crash-point
//! history. The bearer credential rides on every request. Failures are
//! surfaced as `LiftoffError::Backend` and are never fatal to the session.

use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::types::{LiftoffError, PlayerProfile};

const USER_AGENT: &str = "liftoff/0.1.0 (crash-game-client)";

/// REST client for the game backend's request/response endpoints.
pub struct BackendClient {
    http: Client,
    base_url: String,
    token: SecretString,
}

impl BackendClient {
    /// Create a new backend client. A trailing slash on the base URL is
    /// tolerated and stripped.
    pub fn new(base_url: &str, token: SecretString) -> Result<Self, LiftoffError> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| LiftoffError::Backend(format!("build http client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, LiftoffError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Backend GET");

        let response = self
            .http
            .get(&url)
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .map_err(|e| LiftoffError::Backend(format!("GET {path}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LiftoffError::Backend(format!("GET {path}: {status}: {body}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| LiftoffError::Backend(format!("GET {path}: decode: {e}")))
    }

    /// Fetch the authenticated player's profile (`GET /user/me`).
    pub async fn fetch_profile(&self) -> Result<PlayerProfile, LiftoffError> {
        self.get_json("/user/me").await
    }

    /// Fetch the recent crash points, ordered as served (`GET /game/history`).
    pub async fn fetch_history(&self) -> Result<Vec<Decimal>, LiftoffError> {
        self.get_json("/game/history").await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
