//! Axum Middleware for HTTP Request Tracing and Metrics
//!
//! Provides automatic instrumentation of all HTTP requests with:
//! - A tracing span per request
//! - Prometheus metrics collection

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{info_span, Instrument};

use super::metrics::metrics;

const OBJECTS_PREFIX: &str = "/api/objects/";

/// Route label for metrics and spans.
///
/// Uses the matched route template when axum provides one. Otherwise object
/// keys are collapsed so arbitrary keys do not explode label cardinality.
fn route_label(matched: Option<&str>, path: &str) -> String {
    if let Some(template) = matched {
        return template.to_string();
    }
    match path.strip_prefix(OBJECTS_PREFIX) {
        Some("batch") => path.to_string(),
        Some(rest) if !rest.is_empty() => format!("{}{{key}}", OBJECTS_PREFIX),
        _ => path.to_string(),
    }
}

/// Observability middleware for Axum.
///
/// Wraps every request in an `http_request` span, records Prometheus
/// counters and latency, and logs completion.
pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route = route_label(
        request
            .extensions()
            .get::<MatchedPath>()
            .map(MatchedPath::as_str),
        &path,
    );

    let span = info_span!(
        "http_request",
        http.method = %method,
        http.route = %route,
    );

    let response = next.run(request).instrument(span).await;

    let duration = start.elapsed();
    let status = response.status();

    if let Some(m) = metrics() {
        m.record_http_request(method.as_str(), &route, status.as_u16(), duration.as_secs_f64());
    }

    if status.is_server_error() {
        tracing::warn!(
            method = %method,
            route = %route,
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64,
            "Request failed"
        );
    } else {
        tracing::info!(
            method = %method,
            route = %route,
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64,
            "Request completed"
        );
    }

    response
}
