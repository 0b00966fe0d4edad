//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guard_requests_total` (counter): requests by method, status
//! - `guard_request_duration_seconds` (histogram): latency distribution
//! - `guard_cookies_rejected_total` (counter): protected cookies dropped, by mode
//! - `guard_external_redirects_total` (counter): external redirects, by action
//! - `guard_csp_reports_total` (counter): violation reports, by directive
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = [("method", method.to_string()), ("status", status.to_string())];
    counter!("guard_requests_total", &labels).increment(1);
    histogram!("guard_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_cookie_rejected(mode: &'static str) {
    counter!("guard_cookies_rejected_total", "mode" => mode).increment(1);
}

pub fn record_redirect(action: &'static str) {
    counter!("guard_external_redirects_total", "action" => action).increment(1);
}

pub fn record_csp_report(directive: &str) {
    counter!("guard_csp_reports_total", "directive" => directive.to_string()).increment(1);
}
