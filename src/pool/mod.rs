//! Connection pool subsystem.
//!
//! # Data Flow
//! ```text
//! HostDescriptor + PoolConfig + credentials
//!     → PoolFactory::build_pool (driver.rs for sqlx)
//!     → ConnectionPool bound to exactly one host
//!     → get_connection / validate / release
//!     → close() once the pool is superseded
//! ```
//!
//! # Design Decisions
//! - Pools are built lazily; building never waits for the host
//! - The failover layer only sees these two traits, so the same generic
//!   source drives MySQL, Postgres and the in-memory test cluster
//! - Releasing a connection hands it back to whatever pool created it,
//!   even if that pool has since been superseded

pub mod driver;

use async_trait::async_trait;

use crate::failover::classify::Classify;
use crate::failover::hosts::HostDescriptor;

pub use driver::{
    Credentials, MySqlPoolFactory, PgPoolFactory, SqlxBackend, SqlxPool, SqlxPoolFactory,
};

/// A bounded pool of connections to one host.
#[async_trait]
pub trait ConnectionPool: Send + Sync + 'static {
    /// Connection handed out to callers. Dropping it returns it to the pool.
    type Connection: Send + 'static;
    /// Driver error type.
    type Error: std::error::Error + Classify + Send + Sync + 'static;

    /// The host this pool connects to.
    fn host(&self) -> &HostDescriptor;

    /// Check out a connection, waiting at most the configured connection timeout.
    async fn get_connection(&self) -> Result<Self::Connection, Self::Error>;

    /// Run the liveness probe on a checked-out connection.
    async fn validate(&self, conn: &mut Self::Connection) -> Result<(), Self::Error>;

    /// Drop a connection that failed validation instead of returning it.
    async fn discard(&self, conn: Self::Connection) {
        drop(conn);
    }

    /// Return a healthy connection to the pool that created it.
    fn release(conn: Self::Connection) {
        drop(conn);
    }

    /// Drain and close the pool.
    async fn close(&self);
}

/// Builds pools for hosts of one database.
pub trait PoolFactory: Send + Sync + 'static {
    type Pool: ConnectionPool;

    /// Build a pool for `host`. Fails only when the driver rejects the
    /// configuration; never because the host is down.
    fn build_pool(
        &self,
        host: &HostDescriptor,
    ) -> Result<Self::Pool, <Self::Pool as ConnectionPool>::Error>;

    /// Build a single-connection pool for a one-off health check.
    /// Keeps no idle connections open against `host`.
    fn build_trial_pool(
        &self,
        host: &HostDescriptor,
    ) -> Result<Self::Pool, <Self::Pool as ConnectionPool>::Error> {
        self.build_pool(host)
    }
}

/// Connection type produced by a factory's pools.
pub type PoolConnection<F> = <<F as PoolFactory>::Pool as ConnectionPool>::Connection;

/// Driver error type of a factory's pools.
pub type PoolError<F> = <<F as PoolFactory>::Pool as ConnectionPool>::Error;
