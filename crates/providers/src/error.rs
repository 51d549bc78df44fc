//! Provider error type.
//!
//! Every failure path (missing configuration, scraping failures, upstream
//! rejections, locked accounts, verification prompts) is reported as one
//! [`Error`] carrying an HTTP-style status and a human-readable message.

use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Result type used across the provider clients.
pub type Result<T> = std::result::Result<T, Error>;

/// A failure with an HTTP-style status code.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct Error {
    status: StatusCode,
    message: String,
    detail: Option<String>,
}

impl Error {
    /// Create a new error from a status and message.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            detail: None,
        }
    }

    /// Attach diagnostic detail (hidden from production responses).
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// 400 Bad Request.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 401 Unauthorized.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    /// 404 Not Found.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// 500 for missing or invalid configuration.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// 500 Internal Server Error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// 502 for unreadable or malformed upstream responses.
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Whether the upstream rejected our credentials.
    #[inline]
    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    /// Boundary representation of this error.
    pub fn to_body(&self, include_detail: bool) -> ErrorBody {
        ErrorBody {
            status: self.status.as_u16(),
            message: self.message.clone(),
            detail: if include_detail {
                self.detail.clone()
            } else {
                None
            },
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let status = if err.is_timeout() {
            StatusCode::GATEWAY_TIMEOUT
        } else {
            err.status().unwrap_or(StatusCode::BAD_GATEWAY)
        };
        Self::new(status, "Upstream request failed").with_detail(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::bad_gateway("Unreadable upstream response").with_detail(err.to_string())
    }
}

/// Serializable error body handed to whatever renders responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
