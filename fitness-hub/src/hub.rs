//! Application context tying providers, sessions and the snapshot store together.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use fitness_providers::garmin::{GarminSession, SessionStatus};
use fitness_providers::http::build_client;
use fitness_providers::strava::{RefreshTokenClient, StravaClient, StravaEndpoints};
use fitness_providers::{Error, Result};
use reqwest::Client;
use serde_json::Value;
use tracing::info;

use crate::cache::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
use crate::config::HubConfig;
use crate::overview::{OverviewAggregator, OverviewSnapshot, OverviewSource};
use crate::registry::SessionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Provider {
    Garmin,
    Strava,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Garmin => "garmin",
            Self::Strava => "strava",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "garmin" => Ok(Self::Garmin),
            "strava" => Ok(Self::Strava),
            other => Err(Error::not_found(format!("Unknown provider: {}", other))),
        }
    }
}

/// Entry point for every read the application exposes.
pub struct FitnessHub {
    config: HubConfig,
    client: Client,
    registry: SessionRegistry,
    strava_endpoints: StravaEndpoints,
    strava_tokens: Arc<RefreshTokenClient>,
    store: Option<Arc<dyn SnapshotStore>>,
}

impl FitnessHub {
    /// Build from configuration; the store is file-backed when a cache
    /// directory is configured and in-memory otherwise.
    pub fn new(config: HubConfig) -> Result<Self> {
        let store: Arc<dyn SnapshotStore> = match &config.cache_dir {
            Some(dir) => {
                info!(dir = %dir.display(), "Using file snapshot store");
                Arc::new(FileSnapshotStore::new(dir.clone()))
            }
            None => Arc::new(MemorySnapshotStore::new()),
        };
        Self::with_store(config, Some(store))
    }

    /// Build with an explicit store; `None` disables snapshot caching.
    pub fn with_store(config: HubConfig, store: Option<Arc<dyn SnapshotStore>>) -> Result<Self> {
        let client = build_client(config.http_timeout)?;

        let strava_endpoints = match &config.strava_origin {
            Some(origin) => StravaEndpoints::with_origin(origin),
            None => StravaEndpoints::default(),
        };
        let strava_tokens = Arc::new(RefreshTokenClient::new(
            client.clone(),
            strava_endpoints.token.clone(),
        ));
        let registry = SessionRegistry::new(client.clone(), config.garmin_origin.clone());

        Ok(Self {
            config,
            client,
            registry,
            strava_endpoints,
            strava_tokens,
            store,
        })
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn store(&self) -> Option<&Arc<dyn SnapshotStore>> {
        self.store.as_ref()
    }

    fn strava(&self) -> Result<StravaClient> {
        Ok(StravaClient::new(
            self.client.clone(),
            self.config.strava_credentials()?,
            self.strava_endpoints.clone(),
            Arc::clone(&self.strava_tokens),
        ))
    }

    /// Session for the configured account; the read itself signs in when needed.
    fn garmin_session(&self) -> Result<Arc<GarminSession>> {
        Ok(self.registry.session_for(&self.config.garmin_credentials()?))
    }

    fn aggregator(&self) -> OverviewAggregator<'_> {
        OverviewAggregator::new(
            self,
            self.store.as_deref(),
            self.config.default_overview_limit,
        )
    }

    pub async fn profile(&self, provider: Provider) -> Result<Value> {
        match provider {
            Provider::Strava => self.strava()?.profile().await,
            Provider::Garmin => {
                let session = self.garmin_session()?;
                Ok(session.profile().await?.unwrap_or(Value::Null))
            }
        }
    }

    pub async fn activities(&self, provider: Provider, limit: Option<i64>) -> Result<Value> {
        match provider {
            Provider::Strava => self.strava()?.activities(limit).await,
            Provider::Garmin => {
                let session = self.garmin_session()?;
                Ok(session.activities(limit).await?.unwrap_or(Value::Null))
            }
        }
    }

    /// Athlete totals. Only Strava exposes them.
    pub async fn stats(&self, provider: Provider) -> Result<Value> {
        match provider {
            Provider::Strava => self.strava()?.stats(None).await,
            Provider::Garmin => Err(Error::bad_request("Stats are only available for Strava.")),
        }
    }

    pub async fn overview(&self, limit: Option<i64>, prefer_cache: bool) -> Result<OverviewSnapshot> {
        self.aggregator().get_overview(limit, prefer_cache).await
    }

    pub async fn refresh_overview_cache(&self, limit: Option<i64>) -> Result<OverviewSnapshot> {
        self.aggregator().refresh_overview_cache(limit).await
    }

    /// Scraped-session state without triggering a sign-in.
    pub async fn garmin_session_status(&self) -> Result<SessionStatus> {
        Ok(self.garmin_session()?.status().await)
    }

    pub fn resolve_overview_limit(&self, requested: Option<i64>) -> u32 {
        self.aggregator().resolve_limit(requested)
    }
}

#[async_trait]
impl OverviewSource for FitnessHub {
    async fn strava_profile(&self) -> Result<Value> {
        self.profile(Provider::Strava).await
    }

    async fn strava_activities(&self, limit: u32) -> Result<Value> {
        self.activities(Provider::Strava, Some(i64::from(limit))).await
    }

    async fn strava_stats(&self) -> Result<Value> {
        self.stats(Provider::Strava).await
    }

    async fn garmin_profile(&self) -> Result<Value> {
        self.profile(Provider::Garmin).await
    }

    async fn garmin_activities(&self, limit: u32) -> Result<Value> {
        self.activities(Provider::Garmin, Some(i64::from(limit))).await
    }
}
