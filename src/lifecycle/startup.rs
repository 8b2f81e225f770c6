//! Startup orchestration.
//!
//! # Responsibilities
//! - Build one failover source per configured database
//! - Start their health monitors
//! - Close everything on the way out
//!
//! # Design Decisions
//! - Fail fast: a pool the driver refuses to build is fatal
//! - Config is assumed validated by the loader

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::failover::{FailoverError, FailoverSource, MySqlFailoverSource, PgFailoverSource};
use crate::lifecycle::Shutdown;
use crate::pool::{MySqlPoolFactory, PgPoolFactory};

pub const MYSQL: &str = "mysql";
pub const POSTGRES: &str = "postgres";

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("MySQL failover source: {0}")]
    MySql(#[source] FailoverError<sqlx::Error>),

    #[error("Postgres failover source: {0}")]
    Postgres(#[source] FailoverError<sqlx::Error>),
}

/// The two failover sources the process serves.
pub struct Databases {
    pub mysql: MySqlFailoverSource,
    pub postgres: PgFailoverSource,
}

impl Databases {
    pub fn connect(config: &AppConfig) -> Result<Self, StartupError> {
        let mysql = FailoverSource::from_config(
            MYSQL,
            &config.mysql,
            MySqlPoolFactory::from_config(&config.mysql),
        )
        .map_err(StartupError::MySql)?;

        let postgres = FailoverSource::from_config(
            POSTGRES,
            &config.postgres,
            PgPoolFactory::from_config(&config.postgres),
        )
        .map_err(StartupError::Postgres)?;

        tracing::info!(
            mysql_primary = %mysql.selector().hosts().primary(),
            postgres_primary = %postgres.selector().hosts().primary(),
            "Failover sources ready"
        );

        Ok(Self { mysql, postgres })
    }

    /// Spawn a health monitor for each source with failover active.
    pub fn spawn_monitors(&self, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        [
            self.mysql.spawn_monitor(shutdown),
            self.postgres.spawn_monitor(shutdown),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    pub async fn close(&self) {
        self.mysql.close().await;
        self.postgres.close().await;
        tracing::info!("Database pools closed");
    }
}
