//! TabRefresh Observability
//!
//! This crate provides observability features:
//! - Metrics collection (Prometheus)
//! - Health endpoint

pub mod health;
pub mod metrics;

pub use health::{HealthResponse, HealthState, health_router};
pub use metrics::Metrics;
