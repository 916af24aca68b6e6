//! Metrics collection and exposition.
//!
//! # Metrics
//! - `server_timing_reports_total` (counter): trace outcomes by `outcome`
//!   (`attached`, `suppressed`, `empty`, `failed`)
//! - `server_timing_clock_faults_total` (counter): spans ending before they
//!   began, by `stage`
//!
//! Durations themselves are never aggregated here.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::trace::Stage;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_report(outcome: &'static str) {
    metrics::counter!("server_timing_reports_total", "outcome" => outcome).increment(1);
}

pub fn record_clock_fault(stage: Stage) {
    metrics::counter!("server_timing_clock_faults_total", "stage" => stage.as_str()).increment(1);
}
