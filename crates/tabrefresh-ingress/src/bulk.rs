//! Bulk refresh dispatch
//!
//! Refresh triggers run with bounded concurrency. Results come back in input
//! order and every id is attempted regardless of earlier failures.

use futures::{StreamExt, stream};
use tabrefresh_core::{
    SiteApi,
    types::{RefreshResult, Session},
};

/// Refresh triggers in flight per bulk request unless configured otherwise
pub const DEFAULT_REFRESH_CONCURRENCY: usize = 4;

/// Trigger a refresh for every id, at most `concurrency` in flight
///
/// A concurrency of 1 issues the calls strictly one after another.
pub async fn dispatch_refreshes(
    api: &dyn SiteApi,
    session: &Session,
    workbook_ids: Vec<String>,
    concurrency: usize,
) -> Vec<RefreshResult> {
    stream::iter(workbook_ids)
        .map(|workbook_id| async move { api.refresh_workbook(session, &workbook_id).await })
        .buffered(concurrency.max(1))
        .collect()
        .await
}
