//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build failover sources → Spawn health monitors
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop health monitors → Close active pools → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then pools, then monitors
//! - Ordered shutdown: monitors stop before their pools close
//! - Pools connect lazily, so startup succeeds with every host down

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{Databases, StartupError};
