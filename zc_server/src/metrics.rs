//! Prometheus metrics for monitoring the tournament server.
//!
//! Metrics are exposed in Prometheus text format on a separate listener.
//! Recording is a no-op until [`init_metrics`] installs the exporter.
//!
//! # Metrics Categories
//!
//! - **HTTP Metrics**: Request counts and durations by route and status
//! - **Tournament Metrics**: Registrations, results, brackets, champions
//! - **Error Metrics**: Engine errors by kind
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use zc_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr = SocketAddr::from(([127, 0, 0, 1], 9090));
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::http_requests_total("POST", "/api/v1/tournaments", 201);
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Increment the HTTP request counter with method, route and status labels.
pub fn http_requests_total(method: &str, route: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record HTTP request duration in milliseconds.
pub fn http_request_duration_ms(method: &str, route: &str, duration_ms: f64) {
    metrics::histogram!("http_request_duration_ms",
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// Tournament Metrics
// ============================================================================

pub fn registrations_total() {
    metrics::counter!("registrations_total").increment(1);
}

/// Count a recorded match result, `stage` being `zone` or `bracket`.
pub fn results_recorded_total(stage: &'static str) {
    metrics::counter!("results_recorded_total", "stage" => stage).increment(1);
}

pub fn brackets_built_total() {
    metrics::counter!("brackets_built_total").increment(1);
}

/// Count a bracket final decided.
pub fn champions_crowned_total() {
    metrics::counter!("champions_crowned_total").increment(1);
}

// ============================================================================
// Error Metrics
// ============================================================================

/// Count an engine error by kind (`conflict`, `not_found`, ...).
pub fn engine_errors_total(kind: &str) {
    metrics::counter!("engine_errors_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}
