//! Garmin Connect client.
//!
//! Garmin has no public API credentials for personal use, so the session signs
//! in through the SSO web widget, then trades the issued ticket for an OAuth1
//! token and finally an OAuth2 bearer usable against `connectapi`.

pub mod credentials;
pub mod endpoints;
pub mod login;
pub mod oauth1;
pub mod page;
pub mod session;
pub mod tokens;

pub use credentials::GarminCredentials;
pub use endpoints::GarminEndpoints;
pub use login::{LoginOutcome, LoginStage};
pub use session::{GarminSession, SessionStatus};
pub use tokens::{OAuth1Token, OAuth2Token, OAuthConsumer};

pub const USER_AGENT_MOBILE: &str = "com.garmin.android.apps.connectmobile";
pub const USER_AGENT_BROWSER: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
