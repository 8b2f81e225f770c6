//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer (health_check_interval)
//!     → skip while the primary is active
//!     → trial pool + liveness probe against the primary
//!     → selector switch_to(0) on success
//!     → trial pool closed either way
//! ```
//!
//! # Design Decisions
//! - Failure detection on the request path lives in the failover source;
//!   this loop only restores the primary
//! - Probes use a trial pool, never the active one
//! - Failures are logged at debug and retried next tick, never surfaced

pub mod active;

pub use active::{PrimaryMonitor, ProbeOutcome};
