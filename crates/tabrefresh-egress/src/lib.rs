//! TabRefresh Egress Connectors
//!
//! This crate provides the connector to the analytics-platform REST API:
//! - Shared HTTP client construction
//! - Tableau connector (sign-in, paginated listing, refresh, job status)

pub mod client;
pub mod tableau;

use thiserror::Error;

/// Egress error types
#[derive(Debug, Error)]
pub enum EgressError {
    /// Transport-level failure reported by reqwest
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Upstream answered with an unexpected status
    #[error("Upstream error ({status_code}): {body}")]
    UpstreamError { status_code: u16, body: String },

    /// Upstream body did not match the expected shape
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Server URL supplied by the caller is unusable
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, EgressError>;

impl From<EgressError> for tabrefresh_core::Error {
    fn from(err: EgressError) -> Self {
        match err {
            EgressError::HttpError(e) if e.is_timeout() => {
                tabrefresh_core::Error::Timeout(e.to_string())
            }
            EgressError::HttpError(e) => tabrefresh_core::Error::Connection(e.to_string()),
            EgressError::UpstreamError { status_code, body } => tabrefresh_core::Error::Upstream {
                status: status_code,
                body,
            },
            EgressError::ParseError(msg) => tabrefresh_core::Error::Protocol(msg),
            EgressError::InvalidUrl(msg) => tabrefresh_core::Error::InvalidRequest(msg),
            EgressError::ConfigError(msg) => tabrefresh_core::Error::Config(msg),
        }
    }
}
