//! Garmin host layout.

/// Shared consumer key document used by Garmin mobile clients.
pub const CONSUMER_URL: &str = "https://thegarth.s3.amazonaws.com/oauth_consumer.json";

pub const DEFAULT_DOMAIN: &str = "garmin.com";

/// Every URL the sign-in flow and the read API touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GarminEndpoints {
    pub domain: String,
    pub consumer_url: String,
    pub gc_modern: String,
    pub sso_origin: String,
    pub sso_embed: String,
    pub signin: String,
    pub oauth: String,
    pub api: String,
}

impl GarminEndpoints {
    /// Production hosts under `domain` (`garmin.com`, `garmin.cn`).
    pub fn for_domain(domain: &str) -> Self {
        let domain = domain.trim();
        let domain = if domain.is_empty() { DEFAULT_DOMAIN } else { domain };

        let sso_origin = format!("https://sso.{}", domain);
        Self {
            domain: domain.to_string(),
            consumer_url: CONSUMER_URL.to_string(),
            gc_modern: format!("https://connect.{}/modern", domain),
            sso_embed: format!("{}/sso/embed", sso_origin),
            signin: format!("{}/sso/signin", sso_origin),
            sso_origin,
            oauth: format!("https://connectapi.{}/oauth-service/oauth", domain),
            api: format!("https://connectapi.{}", domain),
        }
    }

    /// Route every host, the consumer document included, through one origin.
    ///
    /// Used for mirrors and local test servers; `domain` only feeds the
    /// session identity.
    pub fn with_origin(domain: &str, origin: &str) -> Self {
        let origin = origin.trim_end_matches('/');
        Self {
            domain: domain.to_string(),
            consumer_url: format!("{}/oauth_consumer.json", origin),
            gc_modern: format!("{}/modern", origin),
            sso_origin: origin.to_string(),
            sso_embed: format!("{}/sso/embed", origin),
            signin: format!("{}/sso/signin", origin),
            oauth: format!("{}/oauth-service/oauth", origin),
            api: origin.to_string(),
        }
    }

    pub fn preauthorized(&self) -> String {
        format!("{}/preauthorized", self.oauth)
    }

    pub fn exchange(&self) -> String {
        format!("{}/exchange/user/2.0", self.oauth)
    }

    pub fn social_profile(&self) -> String {
        format!("{}/userprofile-service/socialProfile", self.api)
    }

    pub fn activities(&self, limit: u32) -> String {
        format!(
            "{}/activitylist-service/activities/search/activities?start=0&limit={}",
            self.api, limit
        )
    }
}

impl Default for GarminEndpoints {
    fn default() -> Self {
        Self::for_domain(DEFAULT_DOMAIN)
    }
}
