//! Error types for TabRefresh Core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure before an upstream response arrived
    #[error("Connection error: {0}")]
    Connection(String),

    /// The upstream did not answer within the configured bound
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// The upstream answered with a non-success status
    #[error("Upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The upstream answered but the body was not what we expected
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// HTTP status the service answers with when this error ends a request
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Upstream { status, .. } => *status,
            Error::Protocol(_) => 502,
            Error::InvalidRequest(_) => 400,
            Error::Connection(_)
            | Error::Timeout(_)
            | Error::Config(_)
            | Error::Serialization(_) => 500,
        }
    }

    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Connection(_) => "connection",
            Error::Timeout(_) => "timeout",
            Error::Upstream { .. } => "upstream",
            Error::Protocol(_) => "protocol",
            Error::InvalidRequest(_) => "invalid_request",
            Error::Config(_) => "config",
            Error::Serialization(_) => "serialization",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
