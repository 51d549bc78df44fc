//! Environment-driven configuration.
//!
//! Provider credentials are validated lazily: a missing Strava secret only
//! fails Strava calls, never startup.

use std::path::PathBuf;
use std::time::Duration;

use fitness_providers::Result;
use fitness_providers::garmin::GarminCredentials;
use fitness_providers::limits::parse_limit;
use fitness_providers::strava::StravaCredentials;

/// Hourly, at the top of the hour (`sec min hour day month weekday`).
pub const DEFAULT_OVERVIEW_CRON: &str = "0 0 * * * *";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Clone)]
pub struct HubConfig {
    pub garmin_email: Option<String>,
    pub garmin_password: Option<String>,
    pub garmin_domain: Option<String>,
    /// Serve every Garmin host from this origin instead (mirrors, tests).
    pub garmin_origin: Option<String>,

    pub strava_client_id: Option<String>,
    pub strava_client_secret: Option<String>,
    pub strava_refresh_token: Option<String>,
    pub strava_scopes: Option<String>,
    pub strava_origin: Option<String>,

    pub default_overview_limit: Option<i64>,
    pub cron_overview_limit: Option<i64>,
    pub overview_cron: String,
    pub cache_dir: Option<PathBuf>,
    pub http_timeout: Duration,
    /// Hide error detail from callers.
    pub production: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            garmin_email: None,
            garmin_password: None,
            garmin_domain: None,
            garmin_origin: None,
            strava_client_id: None,
            strava_client_secret: None,
            strava_refresh_token: None,
            strava_scopes: None,
            strava_origin: None,
            default_overview_limit: None,
            cron_overview_limit: None,
            overview_cron: DEFAULT_OVERVIEW_CRON.to_string(),
            cache_dir: None,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            production: false,
        }
    }
}

impl HubConfig {
    /// Load from the process environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        config.garmin_email = get("GARMIN_EMAIL");
        config.garmin_password = get("GARMIN_PASSWORD");
        config.garmin_domain = get("GARMIN_DOMAIN");
        config.garmin_origin = get("GARMIN_ORIGIN");

        config.strava_client_id = get("STRAVA_CLIENT_ID");
        config.strava_client_secret = get("STRAVA_CLIENT_SECRET");
        config.strava_refresh_token = get("STRAVA_REFRESH_TOKEN");
        config.strava_scopes = get("STRAVA_SCOPES");
        config.strava_origin = get("STRAVA_ORIGIN");

        config.default_overview_limit = get("DEFAULT_OVERVIEW_LIMIT").and_then(|v| parse_limit(&v));
        config.cron_overview_limit = get("CRON_OVERVIEW_LIMIT").and_then(|v| parse_limit(&v));

        if let Some(expression) = get("OVERVIEW_CRON") {
            config.overview_cron = expression.trim().to_string();
        }

        config.cache_dir = get("OVERVIEW_CACHE_DIR").map(PathBuf::from);

        if let Some(raw) = get("HTTP_TIMEOUT_SECS")
            && let Ok(secs) = raw.trim().parse::<u64>()
        {
            config.http_timeout = Duration::from_secs(secs);
        }

        config.production = get("APP_ENV").is_some_and(|env| env.trim().eq_ignore_ascii_case("production"));
        config
    }

    pub fn garmin_credentials(&self) -> Result<GarminCredentials> {
        GarminCredentials::new(
            self.garmin_email.clone().unwrap_or_default(),
            self.garmin_password.clone().unwrap_or_default(),
            self.garmin_domain.as_deref(),
        )
    }

    pub fn strava_credentials(&self) -> Result<StravaCredentials> {
        StravaCredentials::from_raw(
            self.strava_client_id.as_deref(),
            self.strava_client_secret.as_deref(),
            self.strava_refresh_token.as_deref(),
            self.strava_scopes.as_deref(),
        )
    }

    /// Limit used by scheduled refreshes; `None` means the overview default.
    pub fn cron_limit(&self) -> Option<i64> {
        self.cron_overview_limit.or(self.default_overview_limit)
    }
}

impl std::fmt::Debug for HubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubConfig")
            .field("garmin_email", &self.garmin_email)
            .field("garmin_domain", &self.garmin_domain)
            .field("garmin_origin", &self.garmin_origin)
            .field("strava_client_id", &self.strava_client_id)
            .field("strava_origin", &self.strava_origin)
            .field("default_overview_limit", &self.default_overview_limit)
            .field("cron_overview_limit", &self.cron_overview_limit)
            .field("overview_cron", &self.overview_cron)
            .field("cache_dir", &self.cache_dir)
            .field("http_timeout", &self.http_timeout)
            .field("production", &self.production)
            .finish_non_exhaustive()
    }
}
