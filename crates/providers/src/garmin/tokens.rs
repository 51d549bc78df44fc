//! Garmin credential material.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default OAuth2 lifetime when the exchange omits `expires_in`.
pub const DEFAULT_ACCESS_TTL_SECS: i64 = 3600;
/// Default refresh lifetime when the exchange omits `refresh_token_expires_in`.
pub const DEFAULT_REFRESH_TTL_SECS: i64 = 86400;

/// Shared consumer key pair used to sign SSO OAuth1 requests.
#[derive(Clone, Deserialize)]
pub struct OAuthConsumer {
    pub consumer_key: String,
    pub consumer_secret: String,
}

impl std::fmt::Debug for OAuthConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConsumer")
            .field("consumer_key", &self.consumer_key)
            .finish_non_exhaustive()
    }
}

/// OAuth1 token pair issued for a login ticket.
#[derive(Clone)]
pub struct OAuth1Token {
    pub oauth_token: String,
    pub oauth_token_secret: String,
    pub mfa_token: Option<String>,
}

impl OAuth1Token {
    /// Parse the url-encoded body returned by the preauthorized endpoint.
    pub fn from_form(body: &str) -> Result<Self> {
        let mut token = None;
        let mut secret = None;
        let mut mfa_token = None;

        for (key, value) in url::form_urlencoded::parse(body.trim().as_bytes()) {
            match key.as_ref() {
                "oauth_token" => token = Some(value.into_owned()),
                "oauth_token_secret" => secret = Some(value.into_owned()),
                "mfa_token" => mfa_token = Some(value.into_owned()),
                _ => {}
            }
        }

        match (token, secret) {
            (Some(oauth_token), Some(oauth_token_secret))
                if !oauth_token.is_empty() && !oauth_token_secret.is_empty() =>
            {
                Ok(Self {
                    oauth_token,
                    oauth_token_secret,
                    mfa_token,
                })
            }
            _ => Err(Error::unauthorized("Invalid Garmin OAuth1 token.")),
        }
    }
}

impl std::fmt::Debug for OAuth1Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth1Token")
            .field("has_mfa_token", &self.mfa_token.is_some())
            .finish_non_exhaustive()
    }
}

/// Raw body of the OAuth2 exchange response.
#[derive(Debug, Deserialize)]
pub(crate) struct ExchangeResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub refresh_token_expires_in: Option<i64>,
}

/// Bearer token for the Garmin Connect API.
#[derive(Clone, Serialize)]
pub struct OAuth2Token {
    #[serde(skip_serializing)]
    pub access_token: String,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    /// Unix seconds.
    pub expires_at: i64,
    /// Unix seconds.
    pub refresh_token_expires_at: i64,
}

impl OAuth2Token {
    /// Build from an exchange response received at `now` (unix seconds).
    pub(crate) fn from_exchange(response: ExchangeResponse, now: i64) -> Result<Self> {
        let access_token = response
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::unauthorized("Invalid Garmin OAuth2 token."))?;

        Ok(Self {
            access_token,
            token_type: response.token_type,
            scope: response.scope,
            refresh_token: response.refresh_token,
            expires_at: now + response.expires_in.unwrap_or(DEFAULT_ACCESS_TTL_SECS),
            refresh_token_expires_at: now
                + response
                    .refresh_token_expires_in
                    .unwrap_or(DEFAULT_REFRESH_TTL_SECS),
        })
    }

    /// Usable for at least `headroom_secs` more seconds at `now`.
    #[inline]
    pub fn is_fresh(&self, now: i64, headroom_secs: i64) -> bool {
        self.expires_at > now + headroom_secs
    }
}

impl std::fmt::Debug for OAuth2Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth2Token")
            .field("expires_at", &self.expires_at)
            .field("refresh_token_expires_at", &self.refresh_token_expires_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oauth1_from_form() {
        let token = OAuth1Token::from_form("oauth_token=abc&oauth_token_secret=s%2Fx&mfa_token=m").unwrap();
        assert_eq!(token.oauth_token, "abc");
        assert_eq!(token.oauth_token_secret, "s/x");
        assert_eq!(token.mfa_token.as_deref(), Some("m"));
    }

    #[test]
    fn test_oauth1_incomplete() {
        let err = OAuth1Token::from_form("oauth_token=abc").unwrap_err();
        assert!(err.is_unauthorized());
        assert!(OAuth1Token::from_form("<html>error</html>").is_err());
        assert!(OAuth1Token::from_form("oauth_token=&oauth_token_secret=").is_err());
    }

    #[test]
    fn test_oauth2_default_ttls() {
        let response: ExchangeResponse =
            serde_json::from_str(r#"{"access_token":"tok","token_type":"Bearer"}"#).unwrap();
        let token = OAuth2Token::from_exchange(response, 1_000).unwrap();
        assert_eq!(token.expires_at, 1_000 + 3600);
        assert_eq!(token.refresh_token_expires_at, 1_000 + 86400);
    }

    #[test]
    fn test_oauth2_provider_ttls() {
        let response: ExchangeResponse = serde_json::from_str(
            r#"{"access_token":"tok","expires_in":120,"refresh_token_expires_in":7200}"#,
        )
        .unwrap();
        let token = OAuth2Token::from_exchange(response, 50).unwrap();
        assert_eq!(token.expires_at, 170);
        assert_eq!(token.refresh_token_expires_at, 7250);
        assert!(token.is_fresh(50, 60));
        assert!(!token.is_fresh(111, 60));
    }

    #[test]
    fn test_oauth2_missing_access_token() {
        let response: ExchangeResponse = serde_json::from_str(r#"{"expires_in":10}"#).unwrap();
        let err = OAuth2Token::from_exchange(response, 0).unwrap_err();
        assert!(err.is_unauthorized());
    }
}
