//! Browser-facing JSON endpoints
//!
//! Every handler is independent: the caller sends the server URL, site id and
//! session token with each request and nothing is remembered between calls.

use crate::{
    bulk::{DEFAULT_REFRESH_CONCURRENCY, dispatch_refreshes},
    types::{IngressError, IngressResult, Operation, require_fields},
};
use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Instant};
use tabrefresh_core::{
    SiteApi,
    types::{JobStatus, PatCredentials, RefreshResult, Session, SignInOutcome, WorkbookSummary},
};
use tabrefresh_observability::Metrics;
use tracing::{info, warn};

/// Shared handler state: the upstream client and telemetry, nothing per-session
#[derive(Clone)]
pub struct ApiState {
    pub api: Arc<dyn SiteApi>,
    pub metrics: Arc<Metrics>,
    /// Maximum refresh triggers in flight per bulk request
    pub refresh_concurrency: usize,
}

impl ApiState {
    pub fn new(api: Arc<dyn SiteApi>, metrics: Arc<Metrics>) -> Self {
        Self {
            api,
            metrics,
            refresh_concurrency: DEFAULT_REFRESH_CONCURRENCY,
        }
    }

    pub fn with_refresh_concurrency(mut self, concurrency: usize) -> Self {
        self.refresh_concurrency = concurrency.max(1);
        self
    }

    /// Count the request and, on failure, the error kind
    fn track<T>(&self, operation: Operation, result: IngressResult<T>) -> IngressResult<T> {
        self.metrics.record_request(operation.as_str());
        if let Err(ref e) = result {
            self.metrics.record_failure(operation.as_str(), e.kind());
        }
        result
    }

    fn observe_upstream(&self, operation: Operation, started: Instant) {
        self.metrics
            .record_upstream_duration(operation.as_str(), started.elapsed().as_secs_f64());
    }
}

/// Sign-in request body
///
/// No Debug derive: it carries the token secret.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    #[serde(default)]
    pub server: String,
    /// Site content URL; empty selects the default site
    #[serde(default)]
    pub site: String,
    #[serde(default)]
    pub token_name: String,
    #[serde(default)]
    pub token_secret: String,
}

/// Session fields sent with every authenticated call
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionParams {
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub site_id: String,
    #[serde(default)]
    pub token: String,
}

impl SessionParams {
    fn into_session(self) -> IngressResult<Session> {
        require_fields(&[
            ("server", self.server.as_str()),
            ("siteId", self.site_id.as_str()),
            ("token", self.token.as_str()),
        ])?;
        Ok(Session::new(&self.server, self.site_id, self.token))
    }
}

/// Bulk refresh request body
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRefreshRequest {
    #[serde(flatten)]
    pub session: SessionParams,
    #[serde(default)]
    pub workbook_ids: Vec<String>,
}

/// Workbook list response
#[derive(Debug, Serialize, Deserialize)]
pub struct WorkbooksResponse {
    pub workbooks: Vec<WorkbookSummary>,
    /// Present when pagination ended on an empty page before the reported total
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// POST /api/signin
pub async fn sign_in(
    State(state): State<ApiState>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> IngressResult<Json<SignInOutcome>> {
    let result = sign_in_inner(&state, payload).await;
    state.track(Operation::SignIn, result)
}

async fn sign_in_inner(
    state: &ApiState,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> IngressResult<Json<SignInOutcome>> {
    let Json(req) = payload?;
    require_fields(&[
        ("server", req.server.as_str()),
        ("tokenName", req.token_name.as_str()),
        ("tokenSecret", req.token_secret.as_str()),
    ])?;

    let credentials = PatCredentials::new(req.token_name, req.token_secret, req.site);
    let started = Instant::now();
    let outcome = state.api.sign_in(&req.server, &credentials).await;
    state.observe_upstream(Operation::SignIn, started);

    match outcome {
        Ok(outcome) => {
            info!(site_id = %outcome.site_id, "Signed in");
            Ok(Json(outcome))
        }
        Err(e) => {
            warn!(site = %credentials.site_content_url, error = %e, "Sign-in failed");
            Err(IngressError::upstream(Operation::SignIn, e))
        }
    }
}

/// POST /api/workbooks
pub async fn list_workbooks(
    State(state): State<ApiState>,
    payload: Result<Json<SessionParams>, JsonRejection>,
) -> IngressResult<Json<WorkbooksResponse>> {
    let result = list_workbooks_inner(&state, payload).await;
    state.track(Operation::ListWorkbooks, result)
}

async fn list_workbooks_inner(
    state: &ApiState,
    payload: Result<Json<SessionParams>, JsonRejection>,
) -> IngressResult<Json<WorkbooksResponse>> {
    let Json(params) = payload?;
    let session = params.into_session()?;

    let started = Instant::now();
    let listing = state.api.list_workbooks(&session).await;
    state.observe_upstream(Operation::ListWorkbooks, started);

    let mut listing = listing.map_err(|e| {
        warn!(site_id = %session.site_id, error = %e, "Fetching workbooks failed");
        IngressError::upstream(Operation::ListWorkbooks, e)
    })?;

    // Name order is guaranteed here, whatever order the upstream used
    listing.sort_by_name();
    let warning = listing.warning();
    if let Some(ref w) = warning {
        warn!(site_id = %session.site_id, "{}", w);
    }

    info!(site_id = %session.site_id, count = listing.workbooks.len(), "Listed workbooks");
    Ok(Json(WorkbooksResponse {
        workbooks: listing.workbooks,
        warning,
    }))
}

/// POST /api/refresh
///
/// Answers 200 for any JSON body; failures, including missing session
/// fields, are reported per item.
pub async fn bulk_refresh(
    State(state): State<ApiState>,
    payload: Result<Json<BulkRefreshRequest>, JsonRejection>,
) -> IngressResult<Json<Vec<RefreshResult>>> {
    let result = bulk_refresh_inner(&state, payload).await;
    state.track(Operation::Refresh, result)
}

async fn bulk_refresh_inner(
    state: &ApiState,
    payload: Result<Json<BulkRefreshRequest>, JsonRejection>,
) -> IngressResult<Json<Vec<RefreshResult>>> {
    let Json(req) = payload?;
    let workbook_ids = req.workbook_ids;
    let requested = workbook_ids.len();

    let session = match req.session.into_session() {
        Ok(session) => session,
        Err(e) => {
            warn!(requested, error = %e, "Bulk refresh rejected before dispatch");
            let reason = e.to_string();
            let results: Vec<_> = workbook_ids
                .into_iter()
                .map(|id| RefreshResult::rejected(id, reason.as_str()))
                .collect();
            for _ in &results {
                state.metrics.record_refresh(false);
            }
            return Ok(Json(results));
        }
    };

    let started = Instant::now();
    let results = dispatch_refreshes(
        state.api.as_ref(),
        &session,
        workbook_ids,
        state.refresh_concurrency,
    )
    .await;
    state.observe_upstream(Operation::Refresh, started);

    let succeeded = results.iter().filter(|r| r.success).count();
    for result in &results {
        state.metrics.record_refresh(result.success);
    }

    info!(
        site_id = %session.site_id,
        requested,
        succeeded,
        failed = results.len() - succeeded,
        "Bulk refresh finished"
    );
    Ok(Json(results))
}

/// GET /api/jobs/{job_id}?server=&siteId=&token=
pub async fn job_status(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
    query: Result<Query<SessionParams>, QueryRejection>,
) -> IngressResult<Json<JobStatus>> {
    let result = job_status_inner(&state, job_id, query).await;
    state.track(Operation::JobStatus, result)
}

async fn job_status_inner(
    state: &ApiState,
    job_id: String,
    query: Result<Query<SessionParams>, QueryRejection>,
) -> IngressResult<Json<JobStatus>> {
    let Query(params) = query?;
    let session = params.into_session()?;

    let started = Instant::now();
    let status = state.api.job_status(&session, &job_id).await;
    state.observe_upstream(Operation::JobStatus, started);

    status.map(Json).map_err(|e| {
        warn!(job_id = %job_id, error = %e, "Job status request failed");
        IngressError::upstream(Operation::JobStatus, e)
    })
}

/// Create the API router
///
/// Request ids are attached by the application-wide layer, see
/// [`request_context_middleware`](crate::middleware::request_context_middleware).
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/signin", post(sign_in))
        .route("/api/workbooks", post(list_workbooks))
        .route("/api/refresh", post(bulk_refresh))
        .route("/api/jobs/{job_id}", get(job_status))
        .with_state(state)
}
