use std::fmt;

use crate::error::{Error, Result};

/// Trimmed value, `None` when absent or blank.
fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub const DEFAULT_SCOPES: &[&str] = &["read", "profile:read_all", "activity:read_all"];

/// Strava application credentials and the seed refresh token.
#[derive(Clone)]
pub struct StravaCredentials {
    client_id: u64,
    client_secret: String,
    refresh_token: String,
    scopes: Vec<String>,
}

impl StravaCredentials {
    /// Validate raw configuration values.
    ///
    /// Missing values are reported together, by their environment key.
    pub fn from_raw(
        client_id: Option<&str>,
        client_secret: Option<&str>,
        refresh_token: Option<&str>,
        scopes: Option<&str>,
    ) -> Result<Self> {
        let client_id = present(client_id);
        let client_secret = present(client_secret);
        let refresh_token = present(refresh_token);

        let (Some(client_id), Some(client_secret), Some(refresh_token)) =
            (client_id, client_secret, refresh_token)
        else {
            let missing: Vec<&str> = [
                ("STRAVA_CLIENT_ID", client_id),
                ("STRAVA_CLIENT_SECRET", client_secret),
                ("STRAVA_REFRESH_TOKEN", refresh_token),
            ]
            .into_iter()
            .filter(|(_, value)| value.is_none())
            .map(|(key, _)| key)
            .collect();

            return Err(Error::config(format!(
                "Missing Strava environment variables: {}",
                missing.join(", ")
            )));
        };

        let client_id = client_id
            .parse::<u64>()
            .map_err(|_| Error::config("STRAVA_CLIENT_ID must be a number."))?;

        Ok(Self {
            client_id,
            client_secret: client_secret.to_string(),
            refresh_token: refresh_token.to_string(),
            scopes: sanitize_scopes(scopes),
        })
    }

    pub fn client_id(&self) -> u64 {
        self.client_id
    }

    pub(crate) fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Refresh token from configuration, used until a rotated one is known.
    pub(crate) fn seed_refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }
}

impl fmt::Debug for StravaCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StravaCredentials")
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

/// Comma separated scopes, trimmed, empties dropped; defaults when none remain.
pub fn sanitize_scopes(raw: Option<&str>) -> Vec<String> {
    let scopes: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|scope| !scope.is_empty())
        .map(str::to_string)
        .collect();

    if scopes.is_empty() {
        DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
    } else {
        scopes
    }
}
