//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! failover layer. All types derive Serde traits for deserialization from
//! config files. Durations are milliseconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::failover::hosts::HostDescriptor;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// MySQL-compatible database.
    pub mysql: DatabaseConfig,

    /// Postgres-compatible database.
    pub postgres: DatabaseConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mysql: DatabaseConfig::mysql_defaults(),
            postgres: DatabaseConfig::postgres_defaults(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// One database subsystem: its hosts, credentials and tuning.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Ordered host list. The first entry is the primary.
    pub hosts: Vec<HostDescriptor>,

    /// Database (schema) name.
    pub database: String,

    pub username: String,

    /// Password. Prefer the environment override over the config file.
    #[serde(skip_serializing)]
    pub password: String,

    /// Pool sizing and timeouts.
    pub pool: PoolConfig,

    /// Failover policy.
    pub failover: FailoverConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            database: String::new(),
            username: String::new(),
            password: String::new(),
            pool: PoolConfig::default(),
            failover: FailoverConfig::default(),
        }
    }
}

impl DatabaseConfig {
    fn mysql_defaults() -> Self {
        Self {
            hosts: vec![HostDescriptor::new("localhost", 3306)],
            database: "dual_db".to_string(),
            username: "root".to_string(),
            ..Self::default()
        }
    }

    fn postgres_defaults() -> Self {
        Self {
            hosts: vec![HostDescriptor::new("localhost", 5432)],
            database: "dual_db".to_string(),
            username: "postgres".to_string(),
            ..Self::default()
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("hosts", &self.hosts)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("pool", &self.pool)
            .field("failover", &self.failover)
            .finish()
    }
}

/// Connection pool configuration, shared by every host of a database.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Connections kept open while idle.
    pub min_idle: u32,

    /// Maximum open connections.
    pub max_size: u32,

    /// Idle connection timeout. 0 disables it.
    pub idle_timeout_ms: u64,

    /// Maximum connection lifetime. 0 disables it.
    pub max_lifetime_ms: u64,

    /// How long an acquire may wait for a connection.
    pub connection_timeout_ms: u64,

    /// Bound on the liveness probe.
    pub validation_timeout_ms: u64,

    /// Liveness probe query.
    pub validation_query: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_idle: 5,
            max_size: 20,
            idle_timeout_ms: 30_000,
            max_lifetime_ms: 1_800_000,
            connection_timeout_ms: 30_000,
            validation_timeout_ms: 5_000,
            validation_query: "SELECT 1".to_string(),
        }
    }
}

impl PoolConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.idle_timeout_ms)
    }

    pub fn max_lifetime(&self) -> Option<Duration> {
        non_zero_millis(self.max_lifetime_ms)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn validation_timeout(&self) -> Duration {
        Duration::from_millis(self.validation_timeout_ms)
    }
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Failover configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FailoverConfig {
    /// Enable failover across the host list.
    pub enabled: bool,

    /// Retries after the first attempt.
    pub max_retries: u32,

    /// Fixed delay between attempts.
    pub retry_delay_ms: u64,

    /// Period of the primary health check while on a standby.
    pub health_check_interval_ms: u64,

    /// Bound on one primary probe.
    pub probe_timeout_ms: u64,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_retries: 3,
            retry_delay_ms: 1_000,
            health_check_interval_ms: 30_000,
            probe_timeout_ms: 5_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins if set.
    pub log_level: String,

    /// `pretty` or `json`.
    pub log_format: String,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Prometheus endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [mysql]
            hosts = [{ host = "mysql-primary", port = 3306 }, { host = "mysql-secondary", port = 3307 }]
            database = "dual_db"
            username = "app"

            [mysql.failover]
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.mysql.hosts.len(), 2);
        assert_eq!(config.mysql.hosts[1].port, 3307);
        assert!(config.mysql.failover.enabled);
        assert_eq!(config.mysql.failover.max_retries, 3);
        assert_eq!(config.mysql.pool.validation_query, "SELECT 1");
        // Untouched section keeps its defaults.
        assert_eq!(config.postgres.hosts[0].port, 5432);
        assert!(!config.postgres.failover.enabled);
    }

    #[test]
    fn test_address_alias() {
        let host: HostDescriptor = toml::from_str(r#"address = "10.0.0.5"
port = 5433"#).unwrap();
        assert_eq!(host, HostDescriptor::new("10.0.0.5", 5433));
    }

    #[test]
    fn test_zero_timeouts_disable() {
        let pool = PoolConfig {
            idle_timeout_ms: 0,
            max_lifetime_ms: 0,
            ..PoolConfig::default()
        };
        assert_eq!(pool.idle_timeout(), None);
        assert_eq!(pool.max_lifetime(), None);
        assert_eq!(pool.connection_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_password_not_in_debug_or_serialized() {
        let mut db = DatabaseConfig::default();
        db.password = "hunter2".into();

        assert!(!format!("{:?}", db).contains("hunter2"));
        assert!(!toml::to_string(&db).unwrap().contains("hunter2"));
    }
}
