// SPDX-License-Identifier: MIT OR Apache-2.0
//! Request correlation and trace ID propagation.
//!
//! Every request runs inside a span carrying its trace ID. The ID is taken
//! from the `x-request-id` header when present and generated otherwise, then
//! echoed on the response.

use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{Instrument, Span};
use uuid::Uuid;

/// Header name for trace ID in requests and responses.
pub const TRACE_ID_HEADER: &str = "x-request-id";

/// Trace ID of the current request, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceId(pub String);

/// Extract trace ID from request headers or generate a new one.
pub fn extract_or_generate(headers: &HeaderMap) -> String {
    headers
        .get(TRACE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), ToString::to_string)
}

/// Create a tracing span with trace ID and request metadata.
pub fn request_span(trace_id: &str, method: &str, path: &str) -> Span {
    tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %method,
        path = %path,
    )
}

/// Add trace ID to response headers.
pub fn add_trace_id_to_response(response: &mut Response, trace_id: &str) {
    if let Ok(value) = HeaderValue::from_str(trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
}

/// Middleware running each request inside its trace span.
pub async fn propagate_trace_id(mut request: Request, next: Next) -> Response {
    let trace_id = extract_or_generate(request.headers());
    let span = request_span(&trace_id, request.method().as_str(), request.uri().path());
    request.extensions_mut().insert(TraceId(trace_id.clone()));

    let mut response = next.run(request).instrument(span.clone()).await;

    span.in_scope(|| {
        tracing::debug!(status = response.status().as_u16(), "Request finished");
    });
    add_trace_id_to_response(&mut response, &trace_id);
    response
}
