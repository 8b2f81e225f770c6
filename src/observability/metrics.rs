//! Metrics collection and exposition.
//!
//! # Metrics
//! - `db_failover_switches_total` (counter): host switches by database, reason
//! - `db_failover_exhausted_total` (counter): acquires that ran out of retries
//! - `db_failover_primary_recoveries_total` (counter): switch-backs to the primary
//! - `db_failover_active_host` (gauge): index of the active host, 0 = primary
//!
//! # Design Decisions
//! - Labels are the database name and switch reason only; hosts live in logs

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::failover::selector::SwitchReason;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn set_active_host(database: &str, index: usize) {
    gauge!("db_failover_active_host", "database" => database.to_string()).set(index as f64);
}

pub fn record_switch(database: &str, reason: SwitchReason) {
    counter!(
        "db_failover_switches_total",
        "database" => database.to_string(),
        "reason" => reason.as_str()
    )
    .increment(1);
}

pub fn record_exhausted(database: &str) {
    counter!("db_failover_exhausted_total", "database" => database.to_string()).increment(1);
}

pub fn record_primary_recovered(database: &str) {
    counter!("db_failover_primary_recoveries_total", "database" => database.to_string())
        .increment(1);
}
