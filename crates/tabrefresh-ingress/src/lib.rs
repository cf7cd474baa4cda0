//! TabRefresh Ingress
//!
//! This crate provides the HTTP surface consumed by the browser:
//! - Sign-in, workbook listing, bulk refresh and job status endpoints
//! - Request-context middleware
//! - The embedded single-page UI

pub mod api;
pub mod bulk;
pub mod middleware;
pub mod types;
pub mod ui;

pub use api::{ApiState, router};
pub use ui::ui_router;
pub use types::{IngressError, IngressResult, Operation, RequestId};
