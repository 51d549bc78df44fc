use clap::{Parser, Subcommand};

use crate::hub::Provider;

#[derive(Debug, Parser)]
#[command(
    name = "fitness-hub",
    version,
    about = "Garmin Connect and Strava data with a cached combined overview"
)]
pub struct Args {
    /// Debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true, env = "LOG_JSON")]
    pub json_logs: bool,

    /// Single-line JSON output
    #[arg(long, global = true)]
    pub compact: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Profile of the signed-in athlete
    Profile {
        #[arg(value_enum)]
        provider: Provider,
    },

    /// Most recent activities
    Activities {
        #[arg(value_enum)]
        provider: Provider,

        /// Number of activities (1-200, default 10)
        #[arg(short, long, allow_negative_numbers = true)]
        limit: Option<i64>,
    },

    /// Athlete totals
    Stats {
        #[arg(value_enum, default_value_t = Provider::Strava)]
        provider: Provider,
    },

    /// Combined overview, served from the snapshot cache when possible
    Overview {
        /// Items per list (1-50)
        #[arg(short, long, allow_negative_numbers = true)]
        limit: Option<i64>,

        /// Skip the cache and rebuild
        #[arg(long)]
        live: bool,
    },

    /// Rebuild and store the combined overview
    Refresh {
        #[arg(short, long, allow_negative_numbers = true)]
        limit: Option<i64>,
    },

    /// Refresh the overview on the OVERVIEW_CRON schedule until Ctrl-C
    Schedule {
        /// Refresh once before waiting for the first tick
        #[arg(long)]
        now: bool,
    },

    /// Garmin session state (never signs in)
    Session,
}
