//! Long-lived Garmin session: token lifecycle and read API.

use chrono::Utc;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use super::USER_AGENT_MOBILE;
use super::credentials::GarminCredentials;
use super::endpoints::GarminEndpoints;
use super::login::{LoginFlow, LoginStage, SsoRequests};
use super::tokens::{OAuth1Token, OAuth2Token, OAuthConsumer};
use crate::cookies::CookieJar;
use crate::error::{Error, Result};
use crate::limits::ACTIVITY_LIMITS;

/// Remaining lifetime below which the bearer is renewed before use.
pub const TOKEN_HEADROOM_SECS: i64 = 60;

#[derive(Debug, Default)]
struct SessionState {
    jar: CookieJar,
    consumer: Option<OAuthConsumer>,
    oauth1: Option<OAuth1Token>,
    oauth2: Option<OAuth2Token>,
    /// Where the last full sign-in stopped.
    login_stage: &'static str,
    logins: u64,
    cheap_refreshes: u64,
}

impl SessionState {
    /// Current stage; token state wins over the last sign-in result.
    fn stage(&self, now: i64) -> &'static str {
        match (&self.oauth2, &self.oauth1) {
            (Some(token), _) if token.is_fresh(now, 0) => "ready",
            (Some(_), _) => "token_expired",
            (None, Some(_)) => "awaiting_refresh",
            (None, None) => self.login_stage,
        }
    }
}

/// Snapshot of a session for diagnostics. Never contains secrets.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub identity: String,
    pub stage: &'static str,
    pub cookies: usize,
    pub has_consumer: bool,
    pub has_oauth1: bool,
    pub oauth2_expires_at: Option<i64>,
    pub refresh_token_expires_at: Option<i64>,
    pub logins: u64,
    pub cheap_refreshes: u64,
}

/// One signed-in Garmin identity.
///
/// All token work happens under one async mutex, so concurrent callers share
/// a single sign-in or refresh instead of racing.
#[derive(Debug)]
pub struct GarminSession {
    client: Client,
    credentials: GarminCredentials,
    endpoints: GarminEndpoints,
    state: Mutex<SessionState>,
}

impl GarminSession {
    pub fn with_endpoints(
        client: Client,
        credentials: GarminCredentials,
        endpoints: GarminEndpoints,
    ) -> Self {
        Self {
            client,
            credentials,
            endpoints,
            state: Mutex::new(SessionState {
                login_stage: LoginStage::Unauthenticated.name(),
                ..Default::default()
            }),
        }
    }

    pub fn endpoints(&self) -> &GarminEndpoints {
        &self.endpoints
    }

    /// Make sure a usable bearer exists and return it.
    ///
    /// A token with more than [`TOKEN_HEADROOM_SECS`] left is returned as is.
    /// Otherwise the OAuth1 token, when present, is exchanged again; if that
    /// fails the full sign-in runs once with a cleared cookie jar.
    #[instrument(skip(self), fields(identity = %self.credentials.identity()))]
    pub async fn ensure_ready(&self) -> Result<String> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let now = Utc::now().timestamp();
        if let Some(token) = state.oauth2.as_ref().filter(|t| t.is_fresh(now, TOKEN_HEADROOM_SECS)) {
            return Ok(token.access_token.clone());
        }

        if let (Some(consumer), Some(oauth1)) = (state.consumer.as_ref(), state.oauth1.as_ref()) {
            debug!("Refreshing Garmin OAuth2 token from OAuth1 token");
            let exchanged = SsoRequests::new(&self.client, &mut state.jar)
                .exchange(&self.endpoints, consumer, oauth1)
                .await;

            match exchanged {
                Ok(token) => {
                    let bearer = token.access_token.clone();
                    state.oauth2 = Some(token);
                    state.cheap_refreshes += 1;
                    return Ok(bearer);
                }
                Err(e) => {
                    warn!(status = e.status().as_u16(), error = %e, "Garmin OAuth2 refresh failed, signing in again");
                }
            }
        }

        self.login(state).await
    }

    /// Full sign-in. Cookies and tokens from earlier logins are discarded.
    async fn login(&self, state: &mut SessionState) -> Result<String> {
        state.jar.clear();
        state.oauth1 = None;
        state.oauth2 = None;
        state.logins += 1;

        let stage = LoginFlow::new(
            &self.client,
            &mut state.jar,
            &self.endpoints,
            &self.credentials,
            &mut state.consumer,
        )
        .run()
        .await;
        state.login_stage = stage.name();

        match stage {
            LoginStage::Ready(outcome) => {
                let bearer = outcome.oauth2.access_token.clone();
                state.consumer = Some(outcome.consumer);
                state.oauth1 = Some(outcome.oauth1);
                state.oauth2 = Some(outcome.oauth2);
                Ok(bearer)
            }
            LoginStage::Failed { error, .. } => Err(error),
            other => Err(Error::internal(format!(
                "Garmin sign-in stopped in stage {}",
                other.name()
            ))),
        }
    }

    /// Drop the bearer if it is still `bearer`; the next call renews it.
    pub async fn invalidate_token(&self, bearer: &str) {
        let mut state = self.state.lock().await;
        if state
            .oauth2
            .as_ref()
            .is_some_and(|t| t.access_token == bearer)
        {
            info!(identity = %self.credentials.identity(), "Dropping rejected Garmin OAuth2 token");
            state.oauth2 = None;
        }
    }

    pub async fn status(&self) -> SessionStatus {
        let state = self.state.lock().await;
        SessionStatus {
            identity: self.credentials.identity(),
            stage: state.stage(Utc::now().timestamp()),
            cookies: state.jar.len(),
            has_consumer: state.consumer.is_some(),
            has_oauth1: state.oauth1.is_some(),
            oauth2_expires_at: state.oauth2.as_ref().map(|t| t.expires_at),
            refresh_token_expires_at: state.oauth2.as_ref().map(|t| t.refresh_token_expires_at),
            logins: state.logins,
            cheap_refreshes: state.cheap_refreshes,
        }
    }

    /// Social profile of the signed-in user.
    pub async fn profile(&self) -> Result<Option<Value>> {
        self.api_get(&self.endpoints.social_profile()).await
    }

    /// Most recent activities; `limit` is clamped to `[1, 200]` (default 10).
    pub async fn activities(&self, limit: Option<i64>) -> Result<Option<Value>> {
        let limit = ACTIVITY_LIMITS.resolve(limit);
        self.api_get(&self.endpoints.activities(limit)).await
    }

    /// Authenticated GET; an empty body yields `None`.
    #[instrument(skip(self))]
    async fn api_get(&self, url: &str) -> Result<Option<Value>> {
        let bearer = self.ensure_ready().await?;

        let response = self
            .client
            .get(url)
            .bearer_auth(&bearer)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, USER_AGENT_MOBILE)
            .header("NK", "NT")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.invalidate_token(&bearer).await;
            return Err(Error::unauthorized("Garmin rejected the OAuth2 token."));
        }

        let text = response.text().await?;
        if !status.is_success() {
            return Err(Error::new(
                status,
                format!("Garmin API ({}): {}", status.as_u16(), text),
            ));
        }

        if text.is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&text).map(Some).map_err(|e| {
            error!(error = %e, body_len = text.len(), "Unreadable Garmin response");
            Error::bad_gateway("Unreadable Garmin response.").with_detail(e.to_string())
        })
    }
}
