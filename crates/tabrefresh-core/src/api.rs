//! Upstream API trait definitions

use crate::{
    Result,
    types::{
        JobStatus, PatCredentials, RefreshAccepted, RefreshResult, Session, SignInOutcome,
        WorkbookListing,
    },
};

/// The four logical operations against the analytics-platform REST API
///
/// Implementations attempt each upstream call exactly once.
#[async_trait::async_trait]
pub trait SiteApi: Send + Sync {
    /// Exchange a personal access token for a session token and site id
    async fn sign_in(&self, server_url: &str, credentials: &PatCredentials)
    -> Result<SignInOutcome>;

    /// Fetch every workbook on the site, following pagination
    async fn list_workbooks(&self, session: &Session) -> Result<WorkbookListing>;

    /// Ask the upstream to start a full extract refresh of one workbook
    async fn trigger_refresh(&self, session: &Session, workbook_id: &str)
    -> Result<RefreshAccepted>;

    /// Fetch the raw job representation
    async fn job_status(&self, session: &Session, job_id: &str) -> Result<JobStatus>;

    /// Trigger a refresh and fold any failure into the per-workbook result
    async fn refresh_workbook(&self, session: &Session, workbook_id: &str) -> RefreshResult {
        let outcome = self.trigger_refresh(session, workbook_id).await;
        if let Err(ref e) = outcome {
            tracing::warn!(workbook_id, error = %e, kind = e.kind(), "Workbook refresh failed");
        }
        RefreshResult::from_outcome(workbook_id, outcome)
    }
}
