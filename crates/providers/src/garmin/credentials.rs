use std::fmt;

use super::endpoints::DEFAULT_DOMAIN;
use crate::error::{Error, Result};

/// Garmin account credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct GarminCredentials {
    username: String,
    password: String,
    domain: String,
}

impl GarminCredentials {
    /// Both username and password must be non-empty.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        domain: Option<&str>,
    ) -> Result<Self> {
        let username = username.into();
        let password = password.into();
        if username.trim().is_empty() || password.is_empty() {
            return Err(Error::config("GARMIN_EMAIL and GARMIN_PASSWORD must be set."));
        }

        let domain = domain
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DOMAIN)
            .to_string();

        Ok(Self {
            username,
            password,
            domain,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Session cache key: `username@domain`.
    pub fn identity(&self) -> String {
        format!("{}@{}", self.username, self.domain)
    }
}

impl fmt::Debug for GarminCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GarminCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("domain", &self.domain)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_uses_default_domain() {
        let creds = GarminCredentials::new("me@example.com", "pw", None).unwrap();
        assert_eq!(creds.identity(), "me@example.com@garmin.com");

        let creds = GarminCredentials::new("me@example.com", "pw", Some("garmin.cn")).unwrap();
        assert_eq!(creds.identity(), "me@example.com@garmin.cn");
    }

    #[test]
    fn test_missing_credentials() {
        let err = GarminCredentials::new("", "pw", None).unwrap_err();
        assert_eq!(err.status().as_u16(), 500);
        assert!(GarminCredentials::new("user", "", None).is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = GarminCredentials::new("user", "hunter2", None).unwrap();
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
