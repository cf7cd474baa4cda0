//! Shared helpers for the end-to-end tests
//!
//! The tests drive the exact router the server binary builds, backed by the
//! real upstream connector pointed at a wiremock server.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use std::sync::Arc;
use tabrefresh_egress::tableau::TableauConnector;
use tabrefresh_observability::Metrics;
use tabrefresh_server::{ServerConfig, build_app, connector_config};
use tower::ServiceExt;

/// Build the application for `config` with a real connector
pub fn app_with_config(config: &ServerConfig) -> Router {
    let connector = TableauConnector::new(connector_config(&config.upstream))
        .expect("connector config should be valid");
    let metrics = Arc::new(Metrics::new().expect("metrics registry"));
    build_app(config, Arc::new(connector), metrics)
}

/// Build the application with default configuration
pub fn app() -> Router {
    app_with_config(&ServerConfig::default())
}

/// Send a JSON POST and return status plus decoded body
pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request");
    send(app, request).await
}

/// Send a GET and return status plus decoded body
pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).expect("request");
    send(app, request).await
}

/// Send a GET and return status plus raw body text
pub async fn get_text(app: &Router, uri: &str) -> (StatusCode, String) {
    let request = Request::builder().uri(uri).body(Body::empty()).expect("request");
    let response = app.clone().oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

/// Raw upstream workbook entry
pub fn upstream_workbook(id: &str, name: &str, project: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "project": {"id": format!("p-{}", project), "name": project},
        "owner": {"id": "u1", "name": "analyst"},
        "createdAt": "2024-01-01T00:00:00Z",
        "updatedAt": "2024-03-01T00:00:00Z"
    })
}

/// Raw upstream listing page; the upstream reports pagination values as strings
pub fn upstream_page(items: Vec<serde_json::Value>, page_number: u32, total: u64) -> serde_json::Value {
    serde_json::json!({
        "pagination": {
            "pageNumber": page_number.to_string(),
            "pageSize": "100",
            "totalAvailable": total.to_string()
        },
        "workbooks": {"workbook": items}
    })
}
