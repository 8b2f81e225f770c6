//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, env password overrides)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → one DatabaseConfig per failover source
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the host table never changes at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Secrets can come from the environment instead of the file

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::AppConfig;
pub use schema::DatabaseConfig;
pub use schema::FailoverConfig;
pub use schema::ObservabilityConfig;
pub use schema::PoolConfig;
