use std::sync::OnceLock;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};

/// Install the process-wide rustls crypto provider once.
pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Client builder shared by both providers. A zero timeout disables it.
pub fn create_client_builder(request_timeout: Duration) -> reqwest::ClientBuilder {
    install_rustls_provider();

    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .pool_idle_timeout(Duration::from_secs(90));

    if request_timeout > Duration::ZERO {
        builder = builder.timeout(request_timeout);
    }
    builder
}

pub fn build_client(request_timeout: Duration) -> Result<reqwest::Client> {
    create_client_builder(request_timeout)
        .build()
        .map_err(|e| Error::internal(format!("Unable to build HTTP client: {}", e)))
}
