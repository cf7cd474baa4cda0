//! Tableau REST API egress connector

use crate::{
    EgressError, Result,
    client::{HttpClientConfig, create_client},
};
use async_trait::async_trait;
use reqwest::{Client, Url, header::ACCEPT};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tabrefresh_core::{
    SiteApi,
    types::{
        JobStatus, PatCredentials, RefreshAccepted, Session, SignInOutcome, WorkbookListing,
        WorkbookSummary, normalize_server_url,
    },
};
use tracing::{debug, instrument, warn};

/// REST API version segment used when none is configured
pub const DEFAULT_API_VERSION: &str = "3.17";

/// Workbooks requested per page
pub const PAGE_SIZE: u32 = 100;

/// Fields requested when listing workbooks
pub const WORKBOOK_FIELDS: &str = "id,name,createdAt,updatedAt,project,owner";

/// Header carrying the session token
pub const AUTH_HEADER: &str = "X-Tableau-Auth";

/// Tableau connector configuration
#[derive(Debug, Clone)]
pub struct TableauConfig {
    /// REST API version, e.g. "3.17"
    pub api_version: String,

    /// Timeout for refresh triggers, which the upstream can be slow to accept
    pub refresh_timeout_secs: u64,

    /// HTTP client configuration (its timeout bounds every other call)
    pub client_config: HttpClientConfig,
}

impl Default for TableauConfig {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            refresh_timeout_secs: 60,
            client_config: HttpClientConfig::default(),
        }
    }
}

impl TableauConfig {
    /// Set the REST API version
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Set the refresh trigger timeout
    pub fn with_refresh_timeout_secs(mut self, secs: u64) -> Self {
        self.refresh_timeout_secs = secs;
        self
    }

    /// Set the timeout for sign-in, listing and job status calls
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.client_config.timeout_secs = secs;
        self
    }

    pub fn with_connect_timeout_secs(mut self, secs: u64) -> Self {
        self.client_config.connect_timeout_secs = secs;
        self
    }
}

/// Tableau connector
pub struct TableauConnector {
    config: TableauConfig,
    client: Client,
}

impl TableauConnector {
    /// Create a new Tableau connector
    pub fn new(config: TableauConfig) -> Result<Self> {
        if config.refresh_timeout_secs == 0 {
            return Err(EgressError::ConfigError(
                "refresh_timeout_secs must be greater than zero".to_string(),
            ));
        }
        let client = create_client(&config.client_config)?;
        Ok(Self { config, client })
    }

    /// Build `{server}/api/{version}/{segments...}`, encoding each segment
    fn api_url(&self, server_url: &str, segments: &[&str]) -> Result<Url> {
        let server_url = normalize_server_url(server_url);
        let mut url = Url::parse(&server_url)
            .map_err(|e| EgressError::InvalidUrl(format!("{}: {}", server_url, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(EgressError::InvalidUrl(format!(
                "{}: scheme must be http or https",
                server_url
            )));
        }

        url.path_segments_mut()
            .map_err(|_| EgressError::InvalidUrl(format!("{}: cannot be a base URL", server_url)))?
            .pop_if_empty()
            .push("api")
            .push(&self.config.api_version)
            .extend(segments);

        Ok(url)
    }

    /// Fetch one page of workbooks
    async fn fetch_workbook_page(&self, session: &Session, page_number: u32) -> Result<RawWorkbookPage> {
        let mut url = self.api_url(session.server_url(), &["sites", &session.site_id, "workbooks"])?;
        url.query_pairs_mut()
            .append_pair("pageSize", &PAGE_SIZE.to_string())
            .append_pair("pageNumber", &page_number.to_string())
            .append_pair("fields", WORKBOOK_FIELDS);

        debug!(page_number, "Requesting workbook page");

        let response = self
            .client
            .get(url)
            .header(AUTH_HEADER, &session.auth_token)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let (status, body) = read_body(response).await?;
        if status != 200 {
            return Err(EgressError::UpstreamError {
                status_code: status,
                body,
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| EgressError::ParseError(format!("Invalid JSON response: {} ({})", body, e)))
    }

    async fn sign_in_inner(
        &self,
        server_url: &str,
        credentials: &PatCredentials,
    ) -> Result<SignInOutcome> {
        let url = self.api_url(server_url, &["auth", "signin"])?;
        let request = SignInRequest {
            credentials: SignInCredentials {
                personal_access_token_name: &credentials.token_name,
                personal_access_token_secret: &credentials.token_secret,
                site: SiteContentRef {
                    content_url: &credentials.site_content_url,
                },
            },
        };

        let response = self
            .client
            .post(url)
            .header(ACCEPT, "application/json")
            .json(&request)
            .send()
            .await?;

        let (status, body) = read_body(response).await?;
        if status != 200 {
            return Err(EgressError::UpstreamError {
                status_code: status,
                body,
            });
        }

        let parsed: SignInResponse = serde_json::from_str(&body)
            .map_err(|e| EgressError::ParseError(format!("Invalid sign-in response: {}", e)))?;

        let credentials = parsed.credentials.unwrap_or_default();
        let token = credentials
            .token
            .ok_or_else(|| EgressError::ParseError("Sign-in response missing credentials.token".to_string()))?;
        let site_id = credentials
            .site
            .and_then(|s| s.id)
            .ok_or_else(|| EgressError::ParseError("Sign-in response missing credentials.site.id".to_string()))?;

        Ok(SignInOutcome { token, site_id })
    }

    async fn list_workbooks_inner(&self, session: &Session) -> Result<WorkbookListing> {
        let mut listing = WorkbookListing {
            complete: true,
            ..Default::default()
        };
        let mut page_number = 1;

        // Stop on an empty page or once the running count reaches the reported total
        loop {
            let page = self.fetch_workbook_page(session, page_number).await?;
            let total_available = page.pagination.map(|p| p.total_available).unwrap_or(0);
            let items = page.workbooks.map(|w| w.workbook).unwrap_or_default();
            listing.total_available = total_available;

            if items.is_empty() {
                if (listing.workbooks.len() as u64) < total_available {
                    warn!(
                        page_number,
                        fetched = listing.workbooks.len(),
                        total_available,
                        "Upstream returned an empty page before all workbooks were listed"
                    );
                    listing.complete = false;
                }
                break;
            }

            listing
                .workbooks
                .extend(items.into_iter().map(RawWorkbook::into_summary));

            if listing.workbooks.len() as u64 >= total_available {
                break;
            }
            page_number += 1;
        }

        debug!(
            count = listing.workbooks.len(),
            pages = page_number,
            "Fetched workbooks"
        );
        Ok(listing)
    }

    async fn trigger_refresh_inner(
        &self,
        session: &Session,
        workbook_id: &str,
    ) -> Result<RefreshAccepted> {
        let url = self.api_url(
            session.server_url(),
            &["sites", &session.site_id, "workbooks", workbook_id, "refresh"],
        )?;

        let response = self
            .client
            .post(url)
            .header(AUTH_HEADER, &session.auth_token)
            .header(ACCEPT, "application/json")
            .timeout(Duration::from_secs(self.config.refresh_timeout_secs))
            .json(&RefreshRequest::full())
            .send()
            .await?;

        let (status, body) = read_body(response).await?;
        if !matches!(status, 200 | 201 | 202) {
            return Err(EgressError::UpstreamError {
                status_code: status,
                body,
            });
        }

        // A body without job info still counts as accepted
        Ok(match serde_json::from_str::<RefreshResponse>(&body) {
            Ok(parsed) => RefreshAccepted::started(parsed.job.and_then(|j| j.id)),
            Err(_) => RefreshAccepted::initiated(),
        })
    }

    async fn job_status_inner(&self, session: &Session, job_id: &str) -> Result<JobStatus> {
        let url = self.api_url(
            session.server_url(),
            &["sites", &session.site_id, "jobs", job_id],
        )?;

        let response = self
            .client
            .get(url)
            .header(AUTH_HEADER, &session.auth_token)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let (status, body) = read_body(response).await?;
        if status != 200 {
            return Err(EgressError::UpstreamError {
                status_code: status,
                body,
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| EgressError::ParseError(format!("Invalid job status response: {}", e)))
    }
}

#[async_trait]
impl SiteApi for TableauConnector {
    #[instrument(skip(self, credentials), fields(site = %credentials.site_content_url))]
    async fn sign_in(
        &self,
        server_url: &str,
        credentials: &PatCredentials,
    ) -> tabrefresh_core::Result<SignInOutcome> {
        Ok(self.sign_in_inner(server_url, credentials).await?)
    }

    #[instrument(skip(self, session), fields(site_id = %session.site_id))]
    async fn list_workbooks(&self, session: &Session) -> tabrefresh_core::Result<WorkbookListing> {
        Ok(self.list_workbooks_inner(session).await?)
    }

    #[instrument(skip(self, session), fields(site_id = %session.site_id))]
    async fn trigger_refresh(
        &self,
        session: &Session,
        workbook_id: &str,
    ) -> tabrefresh_core::Result<RefreshAccepted> {
        Ok(self.trigger_refresh_inner(session, workbook_id).await?)
    }

    #[instrument(skip(self, session), fields(site_id = %session.site_id))]
    async fn job_status(&self, session: &Session, job_id: &str) -> tabrefresh_core::Result<JobStatus> {
        Ok(self.job_status_inner(session, job_id).await?)
    }
}

/// Read status and body text; body read failures are transport errors
async fn read_body(response: reqwest::Response) -> Result<(u16, String)> {
    let status = response.status().as_u16();
    let body = response.text().await?;
    Ok((status, body))
}

// Tableau REST API wire types

// No Debug: carries the token secret
#[derive(Serialize)]
struct SignInRequest<'a> {
    credentials: SignInCredentials<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInCredentials<'a> {
    personal_access_token_name: &'a str,
    personal_access_token_secret: &'a str,
    site: SiteContentRef<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SiteContentRef<'a> {
    content_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct SignInResponse {
    credentials: Option<SignInResponseCredentials>,
}

#[derive(Debug, Default, Deserialize)]
struct SignInResponseCredentials {
    token: Option<String>,
    site: Option<SiteIdRef>,
}

#[derive(Debug, Deserialize)]
struct SiteIdRef {
    id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    task: RefreshTask,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTask {
    extract_refresh: ExtractRefresh,
}

#[derive(Debug, Serialize)]
struct ExtractRefresh {
    #[serde(rename = "type")]
    refresh_type: &'static str,
}

impl RefreshRequest {
    fn full() -> Self {
        Self {
            task: RefreshTask {
                extract_refresh: ExtractRefresh {
                    refresh_type: "FullRefresh",
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    job: Option<RawJobRef>,
}

#[derive(Debug, Deserialize)]
struct RawJobRef {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawWorkbookPage {
    workbooks: Option<RawWorkbookCollection>,
    pagination: Option<RawPagination>,
}

#[derive(Debug, Deserialize)]
struct RawWorkbookCollection {
    #[serde(default)]
    workbook: Vec<RawWorkbook>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPagination {
    #[serde(default, deserialize_with = "lenient_u64")]
    total_available: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWorkbook {
    id: Option<String>,
    name: Option<String>,
    project: Option<NamedRef>,
    owner: Option<NamedRef>,
    created_at: Option<String>,
    updated_at: Option<String>,
    size: Option<serde_json::Value>,
    content_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    show_tabs: bool,
    tags: Option<RawTags>,
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTags {
    #[serde(default)]
    tag: Vec<RawTag>,
}

#[derive(Debug, Deserialize)]
struct RawTag {
    #[serde(default)]
    label: String,
}

impl RawWorkbook {
    fn into_summary(self) -> WorkbookSummary {
        WorkbookSummary {
            id: self.id.unwrap_or_default(),
            name: self
                .name
                .unwrap_or_else(|| WorkbookSummary::DEFAULT_NAME.to_string()),
            project: self
                .project
                .and_then(|p| p.name)
                .unwrap_or_else(|| WorkbookSummary::DEFAULT_PROJECT.to_string()),
            owner: self
                .owner
                .and_then(|o| o.name)
                .unwrap_or_else(|| WorkbookSummary::DEFAULT_OWNER.to_string()),
            created_at: self.created_at,
            updated_at: self.updated_at,
            size: self.size,
            content_url: self.content_url,
            show_tabs: self.show_tabs,
            tags: self
                .tags
                .map(|t| t.tag.into_iter().map(|tag| tag.label).collect())
                .unwrap_or_default(),
        }
    }
}

/// Tableau encodes counts as strings; accept numbers too
fn lenient_u64<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(0),
        serde_json::Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| D::Error::custom(format!("expected a non-negative integer, got {}", n))),
        serde_json::Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("expected an integer string, got {:?}", s))),
        other => Err(D::Error::custom(format!("expected an integer, got {}", other))),
    }
}

/// Accept `true`, `"true"` (any case); everything else is false
fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    })
}
