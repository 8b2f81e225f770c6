//! Failover-aware database connection layer.
//!
//! # Architecture Overview
//!
//! ```text
//!     Data-access code
//!     ──────────────────────────┐
//!                               ▼
//!                     ┌───────────────────┐
//!                     │ failover::source  │  acquire / release
//!                     │  retry + classify │
//!                     └─────────┬─────────┘
//!                               │ current()
//!                               ▼
//!                     ┌───────────────────┐        ┌─────────────────┐
//!                     │ failover::selector│◀───────│ health::active  │
//!                     │  active host+pool │switch  │ primary monitor │
//!                     └─────────┬─────────┘        └─────────────────┘
//!                               │ build_pool()
//!                               ▼
//!                     ┌───────────────────┐
//!                     │  pool (sqlx)      │──────▶ primary / standby hosts
//!                     └───────────────────┘
//!
//!     Cross-cutting: config, observability, lifecycle
//! ```
//!
//! Each database (MySQL, Postgres) gets its own ordered host list. Index 0
//! is the primary. Connectivity failures move the active pool to the next
//! host; a background monitor moves it back once the primary answers again.

// Core subsystems
pub mod config;
pub mod failover;
pub mod pool;

// Background checks
pub mod health;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::AppConfig;
pub use failover::{FailoverError, FailoverSource, MySqlFailoverSource, PgFailoverSource};
pub use lifecycle::Shutdown;
