//! Process-wide Garmin session registry.

use std::sync::Arc;

use dashmap::DashMap;
use fitness_providers::Result;
use fitness_providers::garmin::{GarminCredentials, GarminEndpoints, GarminSession};
use reqwest::Client;
use tracing::{debug, instrument};

/// One [`GarminSession`] per credential identity (`username@domain`).
///
/// Sessions are created on first use and live as long as the registry.
pub struct SessionRegistry {
    client: Client,
    /// Route all Garmin hosts through this origin.
    origin: Option<String>,
    sessions: DashMap<String, Arc<GarminSession>>,
}

impl SessionRegistry {
    pub fn new(client: Client, origin: Option<String>) -> Self {
        Self {
            client,
            origin,
            sessions: DashMap::new(),
        }
    }

    /// The session for `credentials`, created atomically when absent.
    ///
    /// No network traffic happens here.
    pub fn session_for(&self, credentials: &GarminCredentials) -> Arc<GarminSession> {
        let identity = credentials.identity();
        self.sessions
            .entry(identity)
            .or_insert_with(|| {
                debug!(identity = %credentials.identity(), "Creating Garmin session");
                let endpoints = match &self.origin {
                    Some(origin) => GarminEndpoints::with_origin(credentials.domain(), origin),
                    None => GarminEndpoints::for_domain(credentials.domain()),
                };
                Arc::new(GarminSession::with_endpoints(
                    self.client.clone(),
                    credentials.clone(),
                    endpoints,
                ))
            })
            .clone()
    }

    /// The session for `credentials`, signed in and holding a fresh bearer.
    #[instrument(skip_all, fields(identity = %credentials.identity()))]
    pub async fn get_session(&self, credentials: &GarminCredentials) -> Result<Arc<GarminSession>> {
        let session = self.session_for(credentials);
        session.ensure_ready().await?;
        Ok(session)
    }

    pub fn get(&self, identity: &str) -> Option<Arc<GarminSession>> {
        self.sessions.get(identity).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client() -> Client {
        fitness_providers::http::build_client(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_one_session_per_identity() {
        let registry = SessionRegistry::new(client(), None);
        let a = GarminCredentials::new("a@example.com", "pw", None).unwrap();
        let a_cn = GarminCredentials::new("a@example.com", "pw", Some("garmin.cn")).unwrap();

        let first = registry.session_for(&a);
        let second = registry.session_for(&a);
        assert!(Arc::ptr_eq(&first, &second));

        let other = registry.session_for(&a_cn);
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(registry.len(), 2);
        assert!(registry.get("a@example.com@garmin.cn").is_some());
    }

    #[test]
    fn test_origin_override() {
        let registry = SessionRegistry::new(client(), Some("http://127.0.0.1:1".to_string()));
        let creds = GarminCredentials::new("a@example.com", "pw", None).unwrap();
        let session = registry.session_for(&creds);
        assert_eq!(session.endpoints().api, "http://127.0.0.1:1");
    }
}
