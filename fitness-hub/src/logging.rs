use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "fitness_hub=info,fitness_providers=info";

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the default directive; `--quiet` and `--verbose`
/// override both. Logs go to stderr so stdout stays pure JSON.
pub fn init_logging(verbose: bool, quiet: bool, json: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("fitness_hub=debug,fitness_providers=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(verbose).with_writer(std::io::stderr))
            .init();
    }
}
