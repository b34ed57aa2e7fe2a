//! Metrics collection and exposition.
//!
//! # Metrics
//! - `faucet_admission_decisions_total` (counter): by decision
//! - `faucet_store_errors_total` (counter): by kind (connection, command, corrupt, timeout)
//! - `faucet_relay_outcomes_total` (counter): by outcome
//! - `faucet_relay_duration_seconds` (histogram): full relay latency
//! - `faucet_http_requests_total` (counter): by route, status
//! - `faucet_ledger_health` (gauge): 1=reachable, 0=unreachable
//!
//! Recording is a no-op until a recorder is installed, so tests and
//! metrics-disabled deployments pay nothing.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::admission::Decision;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_admission(decision: &Decision) {
    counter!("faucet_admission_decisions_total", "decision" => decision.label()).increment(1);
}

pub fn record_store_error(kind: &'static str) {
    counter!("faucet_store_errors_total", "kind" => kind).increment(1);
}

pub fn record_relay_outcome(outcome: &'static str, started: Instant) {
    counter!("faucet_relay_outcomes_total", "outcome" => outcome).increment(1);
    histogram!("faucet_relay_duration_seconds").record(started.elapsed().as_secs_f64());
}

pub fn record_request(route: &'static str, status: u16) {
    counter!(
        "faucet_http_requests_total",
        "route" => route,
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_ledger_health(healthy: bool) {
    gauge!("faucet_ledger_health").set(if healthy { 1.0 } else { 0.0 });
}
