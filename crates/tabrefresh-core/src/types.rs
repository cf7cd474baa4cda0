//! Request-scoped DTOs shared by the egress connector and the HTTP handlers
//!
//! Nothing in here is persisted. Every value is built for one request and
//! dropped with its response.

use crate::error::Error;
use serde::{Deserialize, Serialize};

/// Maximum number of characters of a raw upstream body quoted in a refresh failure
pub const MAX_ERROR_BODY_CHARS: usize = 200;

/// Message reported when a refresh trigger times out on our side
pub const REFRESH_TIMEOUT_MESSAGE: &str = "Request timeout - refresh may still be processing";

/// Strip trailing slashes so path segments can be appended safely
pub fn normalize_server_url(server_url: &str) -> String {
    server_url.trim().trim_end_matches('/').to_string()
}

/// Raw upstream job representation, relayed without interpretation
pub type JobStatus = serde_json::Value;

/// Personal access token credentials used for sign-in
#[derive(Clone)]
pub struct PatCredentials {
    pub token_name: String,
    pub token_secret: String,
    /// Site content URL; empty selects the default site
    pub site_content_url: String,
}

impl PatCredentials {
    pub fn new(
        token_name: impl Into<String>,
        token_secret: impl Into<String>,
        site_content_url: impl Into<String>,
    ) -> Self {
        Self {
            token_name: token_name.into(),
            token_secret: token_secret.into(),
            site_content_url: site_content_url.into(),
        }
    }
}

impl std::fmt::Debug for PatCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatCredentials")
            .field("token_name", &self.token_name)
            .field("token_secret", &"<redacted>")
            .field("site_content_url", &self.site_content_url)
            .finish()
    }
}

/// Per-call session values supplied by the browser
///
/// The service never stores a session; the caller sends it with every request.
#[derive(Clone)]
pub struct Session {
    server_url: String,
    pub site_id: String,
    pub auth_token: String,
}

impl Session {
    pub fn new(
        server_url: &str,
        site_id: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Self {
        Self {
            server_url: normalize_server_url(server_url),
            site_id: site_id.into(),
            auth_token: auth_token.into(),
        }
    }

    /// Server URL without trailing slashes
    pub fn server_url(&self) -> &str {
        &self.server_url
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("server_url", &self.server_url)
            .field("site_id", &self.site_id)
            .field("auth_token", &"<redacted>")
            .finish()
    }
}

/// Result of a successful sign-in
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInOutcome {
    pub token: String,
    pub site_id: String,
}

impl std::fmt::Debug for SignInOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignInOutcome")
            .field("token", &"<redacted>")
            .field("site_id", &self.site_id)
            .finish()
    }
}

/// Flattened view of one upstream workbook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkbookSummary {
    pub id: String,
    pub name: String,
    pub project: String,
    pub owner: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub size: Option<serde_json::Value>,
    pub content_url: Option<String>,
    pub show_tabs: bool,
    pub tags: Vec<String>,
}

impl WorkbookSummary {
    pub const DEFAULT_NAME: &'static str = "Unknown";
    pub const DEFAULT_PROJECT: &'static str = "Default";
    pub const DEFAULT_OWNER: &'static str = "Unknown";
}

/// All workbooks fetched for a site, plus pagination bookkeeping
#[derive(Debug, Clone, Default)]
pub struct WorkbookListing {
    pub workbooks: Vec<WorkbookSummary>,
    /// Last `totalAvailable` reported by the upstream
    pub total_available: u64,
    /// False when the upstream returned an empty page before `total_available` was reached
    pub complete: bool,
}

impl WorkbookListing {
    /// Sort workbooks by name, case-insensitively; ties keep upstream order
    pub fn sort_by_name(&mut self) {
        self.workbooks.sort_by_cached_key(|w| w.name.to_lowercase());
    }

    /// Human-readable note when pagination ended early
    pub fn warning(&self) -> Option<String> {
        if self.complete {
            return None;
        }
        Some(format!(
            "Upstream reported {} workbooks but only {} were returned before an empty page",
            self.total_available,
            self.workbooks.len()
        ))
    }
}

/// Upstream accepted a refresh trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshAccepted {
    pub job_id: Option<String>,
    pub message: String,
}

impl RefreshAccepted {
    /// Response body parsed as JSON; the job id may still be absent
    pub fn started(job_id: Option<String>) -> Self {
        Self {
            job_id,
            message: "Refresh job started successfully".to_string(),
        }
    }

    /// Response body could not be parsed
    pub fn initiated() -> Self {
        Self {
            job_id: None,
            message: "Refresh initiated successfully".to_string(),
        }
    }
}

/// Outcome of triggering one workbook refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResult {
    /// Workbook id; serialized as `id`, which is what the browser matches on
    #[serde(rename = "id")]
    pub workbook_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RefreshResult {
    pub fn accepted(workbook_id: impl Into<String>, accepted: RefreshAccepted) -> Self {
        Self {
            workbook_id: workbook_id.into(),
            success: true,
            job_id: accepted.job_id,
            message: Some(accepted.message),
            error: None,
        }
    }

    pub fn failed(workbook_id: impl Into<String>, error: &Error) -> Self {
        Self {
            workbook_id: workbook_id.into(),
            success: false,
            job_id: None,
            message: None,
            error: Some(refresh_failure_message(error)),
        }
    }

    /// The request was refused before any upstream call was made
    pub fn rejected(workbook_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            workbook_id: workbook_id.into(),
            success: false,
            job_id: None,
            message: None,
            error: Some(reason.into()),
        }
    }

    pub fn from_outcome(
        workbook_id: impl Into<String>,
        outcome: crate::Result<RefreshAccepted>,
    ) -> Self {
        match outcome {
            Ok(accepted) => Self::accepted(workbook_id, accepted),
            Err(e) => Self::failed(workbook_id, &e),
        }
    }
}

/// Caller-facing message for a failed refresh trigger
pub fn refresh_failure_message(error: &Error) -> String {
    match error {
        Error::Timeout(_) => REFRESH_TIMEOUT_MESSAGE.to_string(),
        Error::Connection(msg) => format!("Connection error: {}", msg),
        Error::Upstream { status, body } => upstream_failure_message(*status, body),
        other => format!("Unexpected error: {}", other),
    }
}

/// Prefer the upstream's `error.summary`, then the raw body, then the status
pub fn upstream_failure_message(status: u16, body: &str) -> String {
    let fallback = format!("HTTP {}", status);

    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => value
            .get("error")
            .and_then(|e| e.get("summary"))
            .and_then(|s| s.as_str())
            .map(str::to_string)
            .unwrap_or(fallback),
        Err(_) if body.is_empty() => fallback,
        Err(_) => body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    }
}
