//! Error taxonomy shared by the chat, search and extract adapters.
//!
//! Configuration and validation errors are raised before any network
//! attempt. Transport errors (`Connection`, `Timeout`) are kept apart from
//! vendor-reported `Api` errors so callers can decide whether to retry.

use std::time::Duration;

use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Adapter errors
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Missing or invalid credential/settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed request parameters
    #[error("Validation error: {0}")]
    Validation(String),

    /// Connection, DNS or socket failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Whole-request deadline expired
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Non-2xx response from the vendor
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Successful response whose body does not match the vendor schema
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl Error {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Connection failure or timeout
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }

    /// Whether a fresh attempt of the same request may succeed.
    ///
    /// Transport failures and 5xx responses qualify; 4xx, validation and
    /// configuration failures never do.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status for API errors
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
