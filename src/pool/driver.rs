//! sqlx-backed pools for MySQL and Postgres.
//!
//! # Responsibilities
//! - Turn a host + credentials into driver connect options
//! - Apply pool sizing and timeouts from `PoolConfig`
//! - Run the validation query as the liveness probe
//!
//! # Design Decisions
//! - `connect_lazy_with`: building a pool never touches the host; a dead
//!   standby fails on first acquire
//! - Credentials go through `Url` setters and are percent-encoded
//! - One generic factory; the two databases differ only in `SqlxBackend`

use std::io;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use sqlx::pool::PoolOptions;
use sqlx::{ConnectOptions, Database, MySql, Pool, Postgres};
use url::Url;

use crate::config::schema::{DatabaseConfig, PoolConfig};
use crate::failover::hosts::HostDescriptor;
use crate::pool::{ConnectionPool, PoolFactory};

/// Per-database glue for the generic sqlx pool.
pub trait SqlxBackend: Database {
    /// URL scheme understood by the driver.
    const SCHEME: &'static str;

    /// Execute `query` on `conn`, discarding any rows.
    fn probe<'c>(
        conn: &'c mut Self::Connection,
        query: &'c str,
    ) -> BoxFuture<'c, Result<(), sqlx::Error>>;
}

impl SqlxBackend for MySql {
    const SCHEME: &'static str = "mysql";

    fn probe<'c>(
        conn: &'c mut Self::Connection,
        query: &'c str,
    ) -> BoxFuture<'c, Result<(), sqlx::Error>> {
        Box::pin(async move { sqlx::query(query).execute(conn).await.map(|_| ()) })
    }
}

impl SqlxBackend for Postgres {
    const SCHEME: &'static str = "postgres";

    fn probe<'c>(
        conn: &'c mut Self::Connection,
        query: &'c str,
    ) -> BoxFuture<'c, Result<(), sqlx::Error>> {
        Box::pin(async move { sqlx::query(query).execute(conn).await.map(|_| ()) })
    }
}

/// Credentials shared by every host of one database.
#[derive(Clone)]
pub struct Credentials {
    pub database: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Builds lazily-connecting sqlx pools.
#[derive(Debug)]
pub struct SqlxPoolFactory<DB> {
    credentials: Credentials,
    pool: PoolConfig,
    validation_query: Arc<str>,
    _db: PhantomData<fn() -> DB>,
}

pub type MySqlPoolFactory = SqlxPoolFactory<MySql>;
pub type PgPoolFactory = SqlxPoolFactory<Postgres>;

impl<DB: SqlxBackend> SqlxPoolFactory<DB> {
    pub fn new(credentials: Credentials, pool: PoolConfig) -> Self {
        let validation_query = Arc::from(pool.validation_query.as_str());
        Self {
            credentials,
            pool,
            validation_query,
            _db: PhantomData,
        }
    }

    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self::new(
            Credentials {
                database: config.database.clone(),
                username: config.username.clone(),
                password: config.password.clone(),
            },
            config.pool.clone(),
        )
    }

    /// Connection URL for `host`, with credentials percent-encoded.
    pub fn connect_url(&self, host: &HostDescriptor) -> Result<Url, sqlx::Error> {
        let raw = format!(
            "{}://{}/{}",
            DB::SCHEME,
            host,
            self.credentials.database
        );
        let mut url = Url::parse(&raw).map_err(|e| sqlx::Error::Configuration(Box::new(e)))?;

        url.set_username(&self.credentials.username)
            .map_err(|()| sqlx::Error::Configuration(format!("cannot set username on {}", raw).into()))?;
        if !self.credentials.password.is_empty() {
            url.set_password(Some(&self.credentials.password))
                .map_err(|()| sqlx::Error::Configuration(format!("cannot set password on {}", raw).into()))?;
        }
        Ok(url)
    }
}

impl<DB: SqlxBackend> SqlxPoolFactory<DB> {
    fn build_sized(
        &self,
        host: &HostDescriptor,
        min_connections: u32,
        max_connections: u32,
    ) -> Result<SqlxPool<DB>, sqlx::Error> {
        let url = self.connect_url(host)?;
        let options = <<DB::Connection as sqlx::Connection>::Options as ConnectOptions>::from_url(&url)?;

        let pool = PoolOptions::<DB>::new()
            .min_connections(min_connections)
            .max_connections(max_connections)
            .idle_timeout(self.pool.idle_timeout())
            .max_lifetime(self.pool.max_lifetime())
            .acquire_timeout(self.pool.connection_timeout())
            .test_before_acquire(true)
            .connect_lazy_with(options);

        tracing::debug!(
            host = %host,
            scheme = DB::SCHEME,
            min_idle = min_connections,
            max_size = max_connections,
            "Built connection pool"
        );

        Ok(SqlxPool {
            host: host.clone(),
            pool,
            validation_query: self.validation_query.clone(),
            validation_timeout: self.pool.validation_timeout(),
        })
    }
}

impl<DB: SqlxBackend> PoolFactory for SqlxPoolFactory<DB> {
    type Pool = SqlxPool<DB>;

    fn build_pool(&self, host: &HostDescriptor) -> Result<SqlxPool<DB>, sqlx::Error> {
        self.build_sized(host, self.pool.min_idle, self.pool.max_size)
    }

    fn build_trial_pool(&self, host: &HostDescriptor) -> Result<SqlxPool<DB>, sqlx::Error> {
        self.build_sized(host, 0, 1)
    }
}

/// A sqlx pool bound to one host.
#[derive(Debug)]
pub struct SqlxPool<DB: Database> {
    host: HostDescriptor,
    pool: Pool<DB>,
    validation_query: Arc<str>,
    validation_timeout: Duration,
}

impl<DB: Database> SqlxPool<DB> {
    /// The underlying sqlx pool, for callers that execute queries directly.
    pub fn inner(&self) -> &Pool<DB> {
        &self.pool
    }
}

#[async_trait]
impl<DB: SqlxBackend> ConnectionPool for SqlxPool<DB> {
    type Connection = sqlx::pool::PoolConnection<DB>;
    type Error = sqlx::Error;

    fn host(&self) -> &HostDescriptor {
        &self.host
    }

    async fn get_connection(&self) -> Result<Self::Connection, sqlx::Error> {
        self.pool.acquire().await
    }

    async fn validate(&self, conn: &mut Self::Connection) -> Result<(), sqlx::Error> {
        let probe = DB::probe(&mut **conn, &self.validation_query);
        match tokio::time::timeout(self.validation_timeout, probe).await {
            Ok(result) => result,
            Err(_) => Err(sqlx::Error::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("liveness probe timed out after {:?}", self.validation_timeout),
            ))),
        }
    }

    async fn discard(&self, conn: Self::Connection) {
        if let Err(e) = conn.close().await {
            tracing::debug!(host = %self.host, error = %e, "Error closing discarded connection");
        }
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
