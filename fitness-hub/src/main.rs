use std::process;
use std::sync::Arc;

use clap::Parser;
use fitness_hub::cli::{Args, Commands};
use fitness_hub::logging::init_logging;
use fitness_hub::scheduler::OverviewScheduler;
use fitness_hub::{Error, FitnessHub, HubConfig, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(args.verbose, args.quiet, args.json_logs);

    let config = HubConfig::from_env();
    let production = config.production;
    let compact = args.compact;

    if let Err(e) = run(args, config).await {
        error!(status = e.status().as_u16(), error = %e, "Command failed");
        let body = e.to_body(!production);
        println!("{}", render(&body, compact).unwrap_or_default());
        process::exit(1);
    }
}

async fn run(args: Args, config: HubConfig) -> Result<()> {
    let hub = Arc::new(FitnessHub::new(config)?);

    let output = match args.command {
        Commands::Profile { provider } => render(&hub.profile(provider).await?, args.compact)?,
        Commands::Activities { provider, limit } => {
            render(&hub.activities(provider, limit).await?, args.compact)?
        }
        Commands::Stats { provider } => render(&hub.stats(provider).await?, args.compact)?,
        Commands::Overview { limit, live } => {
            render(&hub.overview(limit, !live).await?, args.compact)?
        }
        Commands::Refresh { limit } => {
            render(&hub.refresh_overview_cache(limit).await?, args.compact)?
        }
        Commands::Session => render(&hub.garmin_session_status().await?, args.compact)?,
        Commands::Schedule { now } => {
            schedule(hub, now).await?;
            return Ok(());
        }
    };

    println!("{}", output);
    Ok(())
}

async fn schedule(hub: Arc<FitnessHub>, now: bool) -> Result<()> {
    let scheduler = OverviewScheduler::from_hub(hub)?;

    if now && let Err(e) = scheduler.run_once().await {
        warn!(status = e.status().as_u16(), error = %e, "Initial overview refresh failed");
    }

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C, stopping scheduler");
                shutdown.cancel();
            }
            Err(e) => warn!(error = %e, "Unable to listen for Ctrl-C"),
        }
    });

    scheduler.run(cancel).await;
    Ok(())
}

fn render<T: Serialize>(value: &T, compact: bool) -> Result<String> {
    let rendered = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    rendered.map_err(|e| Error::internal("Unable to render output").with_detail(e.to_string()))
}
