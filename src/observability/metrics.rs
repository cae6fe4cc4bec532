//! Metrics collection and exposition.
//!
//! # Metrics
//! - `func_requests_total` (counter): requests by method, status
//! - `func_request_duration_seconds` (histogram): latency by method
//! - `func_dispatch_outcomes_total` (counter): how the dispatcher answered
//! - `func_lifecycle_hooks_total` (counter): hook invocations by hook, result
//!
//! Recording is a no-op until a recorder is installed, so library users who
//! never call [`init_metrics`] pay nothing.

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &Method, status: StatusCode, elapsed: Duration) {
    metrics::counter!(
        "func_requests_total",
        "method" => method.to_string(),
        "status" => status.as_u16().to_string()
    )
    .increment(1);
    metrics::histogram!("func_request_duration_seconds", "method" => method.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_dispatch(outcome: &'static str) {
    metrics::counter!("func_dispatch_outcomes_total", "outcome" => outcome).increment(1);
}

pub fn record_hook(hook: &'static str, ok: bool) {
    let result = if ok { "ok" } else { "error" };
    metrics::counter!("func_lifecycle_hooks_total", "hook" => hook, "result" => result)
        .increment(1);
}
