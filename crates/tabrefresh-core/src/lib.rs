//! TabRefresh Core Types and Traits
//!
//! This crate provides the fundamental types and traits used throughout TabRefresh:
//! - Session and workbook DTOs exchanged with the browser
//! - The `SiteApi` abstraction over the analytics-platform REST API
//! - Core error types

pub mod api;
pub mod error;
pub mod types;

pub use api::SiteApi;
pub use error::{Error, Result};
