//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! failover + health subsystems produce:
//!     → logging.rs (structured log events: switches, retries, recoveries)
//!     → metrics.rs (switch counters, active-host gauges)
//!
//! Consumers:
//!     → Log aggregation (stderr, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, opt-in)
//! ```
//!
//! # Design Decisions
//! - Every switch log carries database, old_host, new_host and reason
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
