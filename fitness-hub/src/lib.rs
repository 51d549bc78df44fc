//! Combined Garmin Connect and Strava overview.
//!
//! [`FitnessHub`] owns the shared HTTP client, the Garmin session registry,
//! the Strava token cache and the snapshot store, and exposes the reads the
//! `fitness-hub` binary is built on.

pub mod cache;
pub mod cli;
pub mod config;
pub mod hub;
pub mod logging;
pub mod overview;
pub mod registry;
pub mod scheduler;

pub use config::HubConfig;
pub use hub::{FitnessHub, Provider};
pub use overview::{OverviewAggregator, OverviewSnapshot, OverviewSource};
pub use registry::SessionRegistry;

pub use fitness_providers::{Error, ErrorBody, Result};
