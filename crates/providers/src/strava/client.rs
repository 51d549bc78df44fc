use std::sync::Arc;

use reqwest::{Client, StatusCode};
use reqwest::header::ACCEPT;
use serde_json::Value;
use tracing::instrument;

use super::StravaEndpoints;
use super::credentials::StravaCredentials;
use super::token::RefreshTokenClient;
use crate::error::{Error, Result};
use crate::limits::ACTIVITY_LIMITS;

/// Read access to the Strava v3 API for one application.
pub struct StravaClient {
    client: Client,
    credentials: StravaCredentials,
    endpoints: StravaEndpoints,
    tokens: Arc<RefreshTokenClient>,
}

impl StravaClient {
    pub fn new(
        client: Client,
        credentials: StravaCredentials,
        endpoints: StravaEndpoints,
        tokens: Arc<RefreshTokenClient>,
    ) -> Self {
        Self {
            client,
            credentials,
            endpoints,
            tokens,
        }
    }

    /// Authenticated athlete.
    pub async fn profile(&self) -> Result<Value> {
        self.get("/athlete", &[]).await
    }

    /// Most recent activities; `limit` is clamped to `[1, 200]` (default 10).
    pub async fn activities(&self, limit: Option<i64>) -> Result<Value> {
        let per_page = ACTIVITY_LIMITS.resolve(limit).to_string();
        self.get("/athlete/activities", &[("per_page", per_page.as_str())])
            .await
    }

    /// Totals for the athlete; the profile is fetched when not supplied.
    pub async fn stats(&self, profile: Option<&Value>) -> Result<Value> {
        let fetched;
        let profile = match profile {
            Some(profile) => profile,
            None => {
                fetched = self.profile().await?;
                &fetched
            }
        };

        let id = athlete_id(profile)
            .ok_or_else(|| Error::bad_gateway("Strava athlete profile has no id."))?;
        self.get(&format!("/athletes/{}/stats", id), &[]).await
    }

    #[instrument(skip(self, query))]
    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let token = self.tokens.access_token(&self.credentials).await?;

        let response = self
            .client
            .get(format!("{}{}", self.endpoints.api, path))
            .query(query)
            .bearer_auth(&token)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status == StatusCode::UNAUTHORIZED {
            self.tokens
                .invalidate(self.credentials.client_id(), &token)
                .await;
        }
        if !status.is_success() {
            return Err(Error::new(
                status,
                format!("Strava error ({}): {}", status.as_u16(), body),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            Error::bad_gateway("Unreadable Strava response.").with_detail(e.to_string())
        })
    }
}

/// Athlete id as it appears in the profile, number or string.
fn athlete_id(profile: &Value) -> Option<String> {
    match profile.get("id")? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
