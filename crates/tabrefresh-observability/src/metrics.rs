//! Metrics collection with Prometheus
//!
//! This module provides Prometheus metrics for TabRefresh:
//! - Request counts per operation
//! - Upstream failure counts by error kind
//! - Per-workbook refresh outcomes
//! - Upstream latency histograms

use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector for TabRefresh
///
/// Write-only telemetry: handlers record into it but never read it back.
#[derive(Clone)]
pub struct Metrics {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Requests received, by operation
    pub requests_total: CounterVec,
    /// Requests that ended in an error response, by operation and error kind
    pub requests_failure: CounterVec,
    /// Refresh results, by outcome (success/failure)
    pub refresh_results_total: CounterVec,
    /// Time spent waiting on the upstream, by operation
    pub upstream_duration_seconds: HistogramVec,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = CounterVec::new(
            Opts::new("tabrefresh_requests_total", "Total number of requests"),
            &["operation"],
        )?;

        let requests_failure = CounterVec::new(
            Opts::new(
                "tabrefresh_requests_failure_total",
                "Total number of failed requests",
            ),
            &["operation", "error_type"],
        )?;

        let refresh_results_total = CounterVec::new(
            Opts::new(
                "tabrefresh_refresh_results_total",
                "Workbook refresh triggers by outcome",
            ),
            &["outcome"],
        )?;

        let upstream_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "tabrefresh_upstream_duration_seconds",
                "Upstream call duration in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
            &["operation"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(requests_failure.clone()))?;
        registry.register(Box::new(refresh_results_total.clone()))?;
        registry.register(Box::new(upstream_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            requests_total,
            requests_failure,
            refresh_results_total,
            upstream_duration_seconds,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record an incoming request
    pub fn record_request(&self, operation: &str) {
        self.requests_total.with_label_values(&[operation]).inc();
    }

    /// Record a request that ended in an error response
    pub fn record_failure(&self, operation: &str, error_type: &str) {
        self.requests_failure
            .with_label_values(&[operation, error_type])
            .inc();
    }

    /// Record the outcome of one workbook refresh trigger
    pub fn record_refresh(&self, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.refresh_results_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Record how long an upstream operation took
    pub fn record_upstream_duration(&self, operation: &str, duration_secs: f64) {
        self.upstream_duration_seconds
            .with_label_values(&[operation])
            .observe(duration_secs);
    }
}
