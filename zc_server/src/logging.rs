//! Structured logging configuration.
//!
//! Engine events are emitted through the `log` facade and picked up by the
//! tracing subscriber, so one filter controls both.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Log levels come from `RUST_LOG`, defaulting to `info,sqlx=warn,hyper=warn`.
///
/// # Example
///
/// ```no_run
/// use zc_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log a tournament domain event with structured data
///
/// # Arguments
///
/// * `event_type` - Kind of event, e.g. `bracket_built`
/// * `tournament_id` - Tournament the event belongs to
/// * `message` - Event message
pub fn log_domain_event(event_type: &str, tournament_id: i64, message: &str) {
    tracing::info!(
        event_type = event_type,
        tournament_id = tournament_id,
        "EVENT: {}",
        message
    );
}

/// Log a store operation and flag slow ones
///
/// # Arguments
///
/// * `operation` - Store operation name
/// * `duration_ms` - Duration in milliseconds
pub fn log_database_operation(operation: &str, duration_ms: u64) {
    tracing::debug!(
        operation = operation,
        duration_ms = duration_ms,
        "Database operation"
    );

    if duration_ms > 100 {
        tracing::warn!(
            operation = operation,
            duration_ms = duration_ms,
            "Slow database operation detected"
        );
    }
}

/// Log API request/response
///
/// # Arguments
///
/// * `method` - HTTP method
/// * `path` - Request path
/// * `status_code` - Response status code
/// * `duration_ms` - Request duration in milliseconds
/// * `request_id` - Correlation id of the request
pub fn log_api_request(
    method: &str,
    path: &str,
    status_code: u16,
    duration_ms: u64,
    request_id: &str,
) {
    tracing::info!(
        http_method = method,
        http_path = path,
        http_status = status_code,
        duration_ms = duration_ms,
        request_id = request_id,
        "API request completed"
    );
}
