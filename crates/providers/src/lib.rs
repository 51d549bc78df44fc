//! Session and API clients for Garmin Connect and Strava.

pub mod cookies;
pub mod error;
pub mod garmin;
pub mod http;
pub mod limits;
pub mod strava;

pub use error::{Error, ErrorBody, Result};
