//! Strava refresh-token rotation.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use super::credentials::StravaCredentials;
use crate::error::{Error, Result};

/// Remaining lifetime below which the access token is refreshed.
pub const TOKEN_HEADROOM_SECS: i64 = 30;
const DEFAULT_ACCESS_TTL_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
}

#[derive(Clone)]
struct AccessToken {
    value: String,
    expires_at: i64,
}

#[derive(Default)]
struct TokenState {
    access: Option<AccessToken>,
    /// Latest refresh token handed out by Strava.
    refresh_token: Option<String>,
}

/// Keeps one access token per client id, refreshing it on demand.
///
/// Each client id has its own async lock, so concurrent callers wait for
/// one in-flight refresh and then reuse its result.
pub struct RefreshTokenClient {
    client: Client,
    token_url: String,
    tokens: DashMap<u64, Arc<Mutex<TokenState>>>,
}

impl RefreshTokenClient {
    pub fn new(client: Client, token_url: impl Into<String>) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            tokens: DashMap::new(),
        }
    }

    fn slot(&self, client_id: u64) -> Arc<Mutex<TokenState>> {
        self.tokens
            .entry(client_id)
            .or_insert_with(|| Arc::new(Mutex::new(TokenState::default())))
            .clone()
    }

    /// A bearer with more than [`TOKEN_HEADROOM_SECS`] left, refreshing if needed.
    #[instrument(skip(self, credentials), fields(client_id = credentials.client_id()))]
    pub async fn access_token(&self, credentials: &StravaCredentials) -> Result<String> {
        let slot = self.slot(credentials.client_id());
        let mut state = slot.lock().await;

        let now = Utc::now().timestamp();
        if let Some(token) = state
            .access
            .as_ref()
            .filter(|t| t.expires_at > now + TOKEN_HEADROOM_SECS)
        {
            return Ok(token.value.clone());
        }

        let refresh_token = state
            .refresh_token
            .clone()
            .unwrap_or_else(|| credentials.seed_refresh_token().to_string());

        let response = self.refresh(credentials, &refresh_token).await?;
        let value = response
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::bad_gateway("Strava token response has no access token."))?;
        let expires_at = response.expires_at.unwrap_or_else(|| {
            Utc::now().timestamp() + response.expires_in.unwrap_or(DEFAULT_ACCESS_TTL_SECS)
        });

        let rotated = response
            .refresh_token
            .filter(|t| !t.is_empty() && *t != refresh_token);
        if rotated.is_some() {
            info!("Strava issued a new refresh token");
        }
        state.refresh_token = Some(rotated.unwrap_or(refresh_token));
        state.access = Some(AccessToken {
            value: value.clone(),
            expires_at,
        });

        debug!(expires_at, "Refreshed Strava access token");
        Ok(value)
    }

    async fn refresh(&self, credentials: &StravaCredentials, refresh_token: &str) -> Result<TokenResponse> {
        let client_id = credentials.client_id().to_string();
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("client_id", client_id.as_str()),
                ("client_secret", credentials.client_secret()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::new(
                status,
                format!("Unable to refresh Strava token: {}", body),
            ));
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Forget the access token if it is still `bearer`; the rotated refresh
    /// token is kept.
    pub async fn invalidate(&self, client_id: u64, bearer: &str) {
        let slot = self.slot(client_id);
        let mut state = slot.lock().await;
        if state.access.as_ref().is_some_and(|t| t.value == bearer) {
            info!(client_id, "Dropping rejected Strava access token");
            state.access = None;
        }
    }
}
