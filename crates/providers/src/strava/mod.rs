//! Strava v3 client with refresh-token rotation.

pub mod client;
pub mod credentials;
pub mod token;

pub use client::StravaClient;
pub use credentials::StravaCredentials;
pub use token::RefreshTokenClient;

pub const API_BASE_URL: &str = "https://www.strava.com/api/v3";
pub const TOKEN_URL: &str = "https://www.strava.com/oauth/token";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StravaEndpoints {
    pub api: String,
    pub token: String,
}

impl StravaEndpoints {
    /// Serve both the API and the token endpoint from `origin`.
    pub fn with_origin(origin: &str) -> Self {
        let origin = origin.trim_end_matches('/');
        Self {
            api: format!("{}/api/v3", origin),
            token: format!("{}/oauth/token", origin),
        }
    }
}

impl Default for StravaEndpoints {
    fn default() -> Self {
        Self {
            api: API_BASE_URL.to_string(),
            token: TOKEN_URL.to_string(),
        }
    }
}
