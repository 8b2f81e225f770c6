//! Failover subsystem.
//!
//! # Data Flow
//! ```text
//! Caller → source.rs acquire()
//!     → selector.rs current() (lock-free snapshot: index + pool)
//!     → pool get_connection + liveness probe
//!     → on error: classify.rs
//!         - Connectivity: selector advance_from(failed), sleep, retry
//!         - NonConnectivity: return immediately
//!     → after max_retries + 1 attempts: Exhausted
//!
//! health::active (background):
//!     → probe primary while active index != 0
//!     → selector switch_to(0) on success
//! ```
//!
//! # Design Decisions
//! - hosts.rs is fixed at startup; index 0 is always the primary
//! - All switches go through one mutex in selector.rs; reads never lock
//! - Superseded pools are closed off the hot path, exactly once
//! - Errors keep the driver's error verbatim (error.rs)

pub mod classify;
pub mod error;
pub mod hosts;
pub mod selector;
pub mod source;

pub use classify::{Classify, ErrorClass};
pub use error::{ConfigurationError, FailoverError};
pub use hosts::{HostDescriptor, HostTable};
pub use selector::{ActiveHost, HostSelector, SwitchOutcome, SwitchReason};
pub use source::{FailoverPolicy, FailoverSource, SourceStatus};

use crate::pool::{MySqlPoolFactory, PgPoolFactory};

/// Failover source for the MySQL database.
pub type MySqlFailoverSource = FailoverSource<MySqlPoolFactory>;

/// Failover source for the Postgres database.
pub type PgFailoverSource = FailoverSource<PgPoolFactory>;
