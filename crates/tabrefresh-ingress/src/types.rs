//! Shared ingress types and utilities

use axum::extract::rejection::{JsonRejection, QueryRejection};
use serde::{Deserialize, Serialize};
use tabrefresh_core::Error as CoreError;
use thiserror::Error;

/// Request ID for tracing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a new request ID
    pub fn generate() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let count = COUNTER.fetch_add(1, Ordering::Relaxed);
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros();

        Self(format!("req_{:x}_{:x}", timestamp, count))
    }

    /// Accept a caller-supplied id if it is short printable ASCII
    pub fn from_header(value: &str) -> Option<Self> {
        let valid = !value.is_empty()
            && value.len() <= 64
            && value.bytes().all(|b| b.is_ascii_graphic());
        valid.then(|| Self(value.to_string()))
    }

    /// Get the string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical operation served by an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    SignIn,
    ListWorkbooks,
    Refresh,
    JobStatus,
}

impl Operation {
    /// Label used in metrics and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::SignIn => "signin",
            Operation::ListWorkbooks => "list_workbooks",
            Operation::Refresh => "refresh",
            Operation::JobStatus => "job_status",
        }
    }

    /// Prefix of the error message returned when the upstream rejects the call
    pub fn failure_label(&self) -> &'static str {
        match self {
            Operation::SignIn => "Sign-in failed",
            Operation::ListWorkbooks => "Fetch workbooks failed",
            Operation::Refresh => "Refresh failed",
            Operation::JobStatus => "Failed to get job status",
        }
    }
}

/// Ingress error types
#[derive(Debug, Error)]
pub enum IngressError {
    /// Missing field, malformed JSON or unusable query string
    #[error("{0}")]
    InvalidRequest(String),

    /// An upstream call failed
    #[error("{}", describe_upstream_failure(.operation, .source))]
    Upstream {
        operation: Operation,
        #[source]
        source: CoreError,
    },
}

impl IngressError {
    pub fn upstream(operation: Operation, source: CoreError) -> Self {
        IngressError::Upstream { operation, source }
    }

    /// HTTP status of the error response
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;

        match self {
            IngressError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            IngressError::Upstream { source, .. } => {
                StatusCode::from_u16(source.status_code()).unwrap_or(StatusCode::BAD_GATEWAY)
            }
        }
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            IngressError::InvalidRequest(_) => "invalid_request",
            IngressError::Upstream { source, .. } => source.kind(),
        }
    }
}

fn describe_upstream_failure(operation: &Operation, source: &CoreError) -> String {
    match source {
        CoreError::Upstream { status, body } => {
            format!("{} ({}): {}", operation.failure_label(), status, body)
        }
        CoreError::Connection(msg) | CoreError::Timeout(msg) => {
            format!("Connection failed: {}", msg)
        }
        CoreError::Protocol(msg) | CoreError::InvalidRequest(msg) => msg.clone(),
        other => format!("{}: {}", operation.failure_label(), other),
    }
}

/// Deserializer messages quote the rejected value, which may be a secret,
/// so callers only get a fixed description.
impl From<JsonRejection> for IngressError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match rejection {
            JsonRejection::JsonDataError(_) => {
                "Invalid request body: a field has the wrong type"
            }
            JsonRejection::JsonSyntaxError(_) => "Invalid request body: malformed JSON",
            JsonRejection::MissingJsonContentType(_) => {
                "Invalid request body: expected Content-Type: application/json"
            }
            _ => "Invalid request body",
        };
        IngressError::InvalidRequest(message.to_string())
    }
}

impl From<QueryRejection> for IngressError {
    fn from(_: QueryRejection) -> Self {
        IngressError::InvalidRequest("Invalid query string".to_string())
    }
}

impl axum::response::IntoResponse for IngressError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = serde_json::json!({ "error": self.to_string() });

        (status, axum::Json(body)).into_response()
    }
}

/// Ingress result type
pub type IngressResult<T> = Result<T, IngressError>;

/// Reject the request if any required field is blank
pub fn require_fields(fields: &[(&str, &str)]) -> IngressResult<()> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(IngressError::InvalidRequest(format!(
            "Missing required field(s): {}",
            missing.join(", ")
        )))
    }
}
