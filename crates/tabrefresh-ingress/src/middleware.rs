//! Shared ingress middleware

use crate::types::RequestId;
use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, debug, info_span};

/// Header used to propagate the request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Middleware to attach a request id to the request, its span and the response
///
/// Only the path is recorded: the job status endpoint carries the session
/// token in its query string.
pub async fn request_context_middleware(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(RequestId::from_header)
        .unwrap_or_else(RequestId::generate);

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).instrument(span.clone()).await;

    span.in_scope(|| debug!(status = response.status().as_u16(), "Request completed"));

    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}
