//! Router assembly
//!
//! Combines the API, health/metrics and UI routers and applies the
//! application-wide layers. Kept separate from `main` so tests can drive the
//! exact router the binary serves.

use std::sync::Arc;

use axum::{Router, extract::Request, middleware};
use tabrefresh_core::SiteApi;
use tabrefresh_egress::tableau::TableauConfig;
use tabrefresh_ingress::{
    ApiState, middleware::request_context_middleware, router as api_router, ui_router,
};
use tabrefresh_observability::{HealthState, Metrics, health_router};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info_span;

use crate::config::{ServerConfig, UpstreamConfig};

/// Connector settings derived from the upstream section
pub fn connector_config(upstream: &UpstreamConfig) -> TableauConfig {
    TableauConfig::default()
        .with_api_version(upstream.api_version.clone())
        .with_request_timeout_secs(upstream.request_timeout_secs)
        .with_refresh_timeout_secs(upstream.refresh_timeout_secs)
        .with_connect_timeout_secs(upstream.connect_timeout_secs)
}

/// Build the full application router
pub fn build_app(config: &ServerConfig, api: Arc<dyn SiteApi>, metrics: Arc<Metrics>) -> Router {
    let api_state =
        ApiState::new(api, metrics.clone()).with_refresh_concurrency(config.refresh.concurrency);

    let mut app = api_router(api_state).merge(health_router(HealthState::new(metrics)));

    if config.ui.enabled {
        app = app.merge(ui_router());
    }

    if config.logging.log_requests {
        // Path only: the job status query string carries the session token
        app = app.layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            info_span!(
                "http_request",
                method = %request.method(),
                path = %request.uri().path(),
            )
        }));
    }

    if config.cors.allow_any_origin {
        app = app.layer(CorsLayer::permissive());
    }

    app.layer(middleware::from_fn(request_context_middleware))
}

/// Bind the configured listen address
///
/// The host may be a name such as `localhost`; it is resolved and the first
/// address that binds wins.
pub async fn bind_listener(config: &ServerConfig) -> std::io::Result<TcpListener> {
    TcpListener::bind((config.host.as_str(), config.port)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use tabrefresh_core::{
        Result,
        types::{
            JobStatus, PatCredentials, RefreshAccepted, Session, SignInOutcome, WorkbookListing,
        },
    };
    use tower::ServiceExt;

    /// Upstream that must never be reached
    struct UnreachableApi;

    #[async_trait::async_trait]
    impl SiteApi for UnreachableApi {
        async fn sign_in(&self, _: &str, _: &PatCredentials) -> Result<SignInOutcome> {
            panic!("unexpected upstream call")
        }

        async fn list_workbooks(&self, _: &Session) -> Result<WorkbookListing> {
            panic!("unexpected upstream call")
        }

        async fn trigger_refresh(&self, _: &Session, _: &str) -> Result<RefreshAccepted> {
            panic!("unexpected upstream call")
        }

        async fn job_status(&self, _: &Session, _: &str) -> Result<JobStatus> {
            panic!("unexpected upstream call")
        }
    }

    fn app(config: &ServerConfig) -> Router {
        build_app(
            config,
            Arc::new(UnreachableApi),
            Arc::new(Metrics::new().unwrap()),
        )
    }

    #[test]
    fn test_connector_config_from_upstream() {
        let upstream = UpstreamConfig {
            api_version: "3.21".to_string(),
            request_timeout_secs: 15,
            refresh_timeout_secs: 120,
            connect_timeout_secs: 5,
        };
        let config = connector_config(&upstream);

        assert_eq!(config.api_version, "3.21");
        assert_eq!(config.refresh_timeout_secs, 120);
        assert_eq!(config.client_config.timeout_secs, 15);
        assert_eq!(config.client_config.connect_timeout_secs, 5);
    }

    #[tokio::test]
    async fn test_health_has_request_id_and_cors() {
        let response = app(&ServerConfig::default())
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-request-id").is_some());
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn test_ui_can_be_disabled() {
        let mut config = ServerConfig::default();
        let response = app(&config)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        config.ui.enabled = false;
        let response = app(&config)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bind_listener_resolves_host_names() {
        let mut config = ServerConfig::default();
        config.host = "localhost".to_string();
        config.port = 0;

        let listener = bind_listener(&config).await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_missing_session_never_reaches_upstream() {
        let mut config = ServerConfig::default();
        config.logging.log_requests = true;

        let response = app(&config)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/refresh")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"workbookIds":["a"]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(
            &bytes[..],
            br#"[{"id":"a","success":false,"error":"Missing required field(s): server, siteId, token"}]"#
        );
    }
}
