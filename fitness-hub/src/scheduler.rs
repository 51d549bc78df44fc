//! Cron-driven overview refresh.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fitness_providers::{Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::hub::FitnessHub;
use crate::overview::OverviewSnapshot;

/// Rebuilds the cached overview on a cron schedule until cancelled.
pub struct OverviewScheduler {
    hub: Arc<FitnessHub>,
    schedule: cron::Schedule,
    expression: String,
    limit: Option<i64>,
}

impl OverviewScheduler {
    /// `expression` uses the six-field form with seconds (`0 0 * * * *`).
    pub fn new(hub: Arc<FitnessHub>, expression: &str, limit: Option<i64>) -> Result<Self> {
        let schedule = cron::Schedule::from_str(expression).map_err(|e| {
            Error::config(format!("Invalid OVERVIEW_CRON expression '{}'", expression))
                .with_detail(e.to_string())
        })?;

        Ok(Self {
            hub,
            schedule,
            expression: expression.to_string(),
            limit,
        })
    }

    /// Scheduler configured from the hub's own settings.
    pub fn from_hub(hub: Arc<FitnessHub>) -> Result<Self> {
        let expression = hub.config().overview_cron.clone();
        let limit = hub.config().cron_limit();
        Self::new(hub, &expression, limit)
    }

    pub fn next_run_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// One refresh; the caller decides what a failure means.
    #[instrument(skip(self), fields(cron = %self.expression))]
    pub async fn run_once(&self) -> Result<OverviewSnapshot> {
        self.hub.refresh_overview_cache(self.limit).await
    }

    /// Loop until `cancel` fires. Failed runs are logged and the loop goes on.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(cron = %self.expression, limit = ?self.limit, "Overview scheduler started");

        loop {
            let now = Utc::now();
            let Some(next) = self.next_run_after(now) else {
                info!("Cron schedule has no upcoming runs, stopping");
                break;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            debug!(next = %next, wait_secs = wait.as_secs(), "Waiting for next overview refresh");

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Overview scheduler shutting down");
                    break;
                }
                _ = tokio::time::sleep(wait) => {
                    match self.run_once().await {
                        Ok(snapshot) => info!(
                            limit = snapshot.limit,
                            generated_at = %snapshot.generated_at,
                            "Scheduled overview refresh complete"
                        ),
                        Err(e) => error!(
                            status = e.status().as_u16(),
                            error = %e,
                            "Scheduled overview refresh failed"
                        ),
                    }
                }
            }
        }
    }
}
