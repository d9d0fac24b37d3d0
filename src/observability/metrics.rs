//! Metrics collection and exposition.
//!
//! # Metrics
//! - `webfront_requests_total` (counter): requests by method, status, stage
//! - `webfront_request_duration_seconds` (histogram): latency distribution
//! - `webfront_component_requests_total` (counter): requests per component
//! - `webfront_upstream_forwards_total` (counter): forwards by outcome
//! - `webfront_upstream_ready` (gauge): 1=ready, 0=not ready
//!
//! `stage` names the tier that produced the response: `component` or
//! `router` (which covers upstream forwards and the fixed 404). `error`
//! marks a component failure turned into a 500.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, stage: &'static str, start: Instant) {
    metrics::counter!(
        "webfront_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "stage" => stage,
    )
    .increment(1);
    metrics::histogram!("webfront_request_duration_seconds", "stage" => stage)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_component_request(component: &str) {
    metrics::counter!("webfront_component_requests_total", "component" => component.to_string())
        .increment(1);
}

pub fn record_upstream_forward(outcome: &'static str) {
    metrics::counter!("webfront_upstream_forwards_total", "outcome" => outcome).increment(1);
}

pub fn record_upstream_ready(ready: bool) {
    metrics::gauge!("webfront_upstream_ready").set(if ready { 1.0 } else { 0.0 });
}
