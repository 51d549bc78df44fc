//! Combined Strava + Garmin overview with snapshot caching.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use fitness_providers::Result;
use fitness_providers::limits::LimitBounds;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::cache::{OVERVIEW_CACHE_KEY, SnapshotMetadata, SnapshotStore};

/// Overview default when none is configured.
pub const DEFAULT_OVERVIEW_LIMIT: u32 = 5;
pub const OVERVIEW_LIMITS: LimitBounds = LimitBounds::new(1, 50, DEFAULT_OVERVIEW_LIMIT);

/// The five reads an overview is built from.
#[async_trait]
pub trait OverviewSource: Send + Sync {
    async fn strava_profile(&self) -> Result<Value>;
    async fn strava_activities(&self, limit: u32) -> Result<Value>;
    async fn strava_stats(&self) -> Result<Value>;
    async fn garmin_profile(&self) -> Result<Value>;
    async fn garmin_activities(&self, limit: u32) -> Result<Value>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StravaOverview {
    pub profile: Value,
    pub activities: Value,
    pub stats: Value,
    /// Fields written by other producers, kept as stored.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GarminOverview {
    pub profile: Value,
    pub activities: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Immutable combined result; reused as a whole or rebuilt as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewSnapshot {
    /// ISO-8601, millisecond precision, UTC.
    pub generated_at: String,
    pub limit: u32,
    pub strava: StravaOverview,
    pub garmin: GarminOverview,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OverviewSnapshot {
    /// Whether this snapshot holds at least `limit` items per list.
    pub fn satisfies(&self, limit: u32) -> bool {
        self.limit > 0 && self.limit >= limit
    }
}

/// Builds overviews from a source and caches them in an optional store.
pub struct OverviewAggregator<'a> {
    source: &'a dyn OverviewSource,
    store: Option<&'a dyn SnapshotStore>,
    bounds: LimitBounds,
}

impl<'a> OverviewAggregator<'a> {
    /// `default_limit` replaces the built-in default of 5 when set.
    pub fn new(
        source: &'a dyn OverviewSource,
        store: Option<&'a dyn SnapshotStore>,
        default_limit: Option<i64>,
    ) -> Self {
        let fallback = default_limit
            .map(|limit| OVERVIEW_LIMITS.resolve(Some(limit)))
            .unwrap_or(DEFAULT_OVERVIEW_LIMIT);
        Self {
            source,
            store,
            bounds: OVERVIEW_LIMITS.with_fallback(fallback),
        }
    }

    /// Requested limit, else the configured default, clamped to `[1, 50]`.
    pub fn resolve_limit(&self, requested: Option<i64>) -> u32 {
        self.bounds.resolve(requested)
    }

    /// Fetch all five parts concurrently; any failure fails the build.
    #[instrument(skip(self))]
    pub async fn build_snapshot(&self, limit: u32) -> Result<OverviewSnapshot> {
        let source = self.source;
        let (strava_profile, strava_activities, strava_stats, garmin_profile, garmin_activities) = tokio::try_join!(
            source.strava_profile(),
            source.strava_activities(limit),
            source.strava_stats(),
            source.garmin_profile(),
            source.garmin_activities(limit),
        )?;

        Ok(OverviewSnapshot {
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            limit,
            strava: StravaOverview {
                profile: strava_profile,
                activities: strava_activities,
                stats: strava_stats,
                extra: Map::new(),
            },
            garmin: GarminOverview {
                profile: garmin_profile,
                activities: garmin_activities,
                extra: Map::new(),
            },
            extra: Map::new(),
        })
    }

    /// Cached snapshot when allowed and large enough, else a fresh one.
    pub async fn get_overview(&self, limit: Option<i64>, prefer_cache: bool) -> Result<OverviewSnapshot> {
        let limit = self.resolve_limit(limit);

        if prefer_cache
            && let Some(cached) = self.read_cached().await?
        {
            if cached.satisfies(limit) {
                debug!(cached_limit = cached.limit, limit, "Serving cached overview");
                return Ok(cached);
            }
            debug!(cached_limit = cached.limit, limit, "Cached overview too small");
        }

        self.refresh(limit).await
    }

    /// Always rebuild and store.
    pub async fn refresh_overview_cache(&self, limit: Option<i64>) -> Result<OverviewSnapshot> {
        let limit = self.resolve_limit(limit);
        self.refresh(limit).await
    }

    async fn refresh(&self, limit: u32) -> Result<OverviewSnapshot> {
        let snapshot = self.build_snapshot(limit).await?;
        self.write_cached(&snapshot).await?;
        info!(limit, generated_at = %snapshot.generated_at, "Overview refreshed");
        Ok(snapshot)
    }

    /// Stored snapshot, or `None` when absent, unreadable or no store is set.
    pub async fn read_cached(&self) -> Result<Option<OverviewSnapshot>> {
        let Some(store) = self.store else {
            return Ok(None);
        };
        let Some(raw) = store.get(OVERVIEW_CACHE_KEY).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!(error = %e, "Unreadable cached overview, ignoring it");
                Ok(None)
            }
        }
    }

    /// Returns whether anything was written.
    async fn write_cached(&self, snapshot: &OverviewSnapshot) -> Result<bool> {
        let Some(store) = self.store else {
            return Ok(false);
        };

        let value = serde_json::to_string(snapshot)?;
        let metadata = SnapshotMetadata {
            generated_at: snapshot.generated_at.clone(),
        };
        store.put(OVERVIEW_CACHE_KEY, value, metadata).await?;
        Ok(true)
    }
}
