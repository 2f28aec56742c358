//! Prometheus Metrics Definitions
//!
//! Defines all KEYSTASH metrics with appropriate labels and types.
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec, Encoder,
    HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<KeystashMetrics>> = Lazy::new(KeystashMetrics::new);

/// The registered metrics, if registration succeeded.
pub fn metrics() -> Option<&'static KeystashMetrics> {
    METRICS.as_ref().ok()
}

/// Container for all KEYSTASH metrics.
#[derive(Clone)]
pub struct KeystashMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Object operations - labels: operation, outcome
    pub object_operations_total: CounterVec,

    /// Cache lookups - labels: result (hit/miss/error)
    pub cache_lookups_total: CounterVec,

    /// Records removed by lazy expiry on read
    pub lazy_expirations_total: Counter,

    /// Records removed by the expiry sweeper
    pub swept_records_total: Counter,

    /// Expired cache entries reclaimed by the purge job
    pub purged_cache_entries_total: Counter,
}

fn registration_error(name: &str, e: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, e))
}

impl KeystashMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "keystash_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| registration_error("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "keystash_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("http_request_duration_seconds", e))?,

            object_operations_total: register_counter_vec!(
                "keystash_object_operations_total",
                "Total object operations by outcome",
                &["operation", "outcome"]
            )
            .map_err(|e| registration_error("object_operations_total", e))?,

            cache_lookups_total: register_counter_vec!(
                "keystash_cache_lookups_total",
                "Cache lookups by result",
                &["result"]
            )
            .map_err(|e| registration_error("cache_lookups_total", e))?,

            lazy_expirations_total: register_counter!(
                "keystash_lazy_expirations_total",
                "Expired records removed on read"
            )
            .map_err(|e| registration_error("lazy_expirations_total", e))?,

            swept_records_total: register_counter!(
                "keystash_swept_records_total",
                "Expired records removed by the sweeper"
            )
            .map_err(|e| registration_error("swept_records_total", e))?,

            purged_cache_entries_total: register_counter!(
                "keystash_purged_cache_entries_total",
                "Expired cache entries reclaimed by the purge job"
            )
            .map_err(|e| registration_error("purged_cache_entries_total", e))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record an object operation outcome.
    pub fn record_operation(&self, operation: &str, outcome: &str) {
        self.object_operations_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn record_cache_lookup(&self, result: &str) {
        self.cache_lookups_total.with_label_values(&[result]).inc();
    }

    pub fn record_lazy_expiration(&self) {
        self.lazy_expirations_total.inc();
    }

    pub fn record_swept(&self, count: u64) {
        self.swept_records_total.inc_by(count as f64);
    }

    pub fn record_cache_purged(&self, count: u64) {
        self.purged_cache_entries_total.inc_by(count as f64);
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
pub async fn metrics_handler() -> impl IntoResponse {
    // Touch the registry so metrics exist before the first scrape.
    let _ = metrics();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
