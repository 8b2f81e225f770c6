//! Failover connection source.
//!
//! # Responsibilities
//! - Public `acquire` / `release` used by the data-access layer
//! - Retry with host advance on connectivity errors
//! - Propagate non-connectivity errors untouched
//! - Start the primary health monitor
//!
//! # Design Decisions
//! - One generic type, instantiated per database
//! - Failover off, or a single host: exactly one attempt, no switching
//! - A failed attempt advances past the host it observed, so callers racing
//!   on the same dead host produce a single switch

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config::schema::{DatabaseConfig, FailoverConfig};
use crate::failover::classify::{Classify, ErrorClass};
use crate::failover::error::FailoverError;
use crate::failover::hosts::{HostDescriptor, HostTable};
use crate::failover::selector::{ActiveHost, HostSelector, SwitchOutcome, SwitchReason};
use crate::health::active::PrimaryMonitor;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::pool::{ConnectionPool, PoolConnection, PoolError, PoolFactory};

/// Failover tuning for one database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailoverPolicy {
    pub enabled: bool,
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub health_check_interval: Duration,
    pub probe_timeout: Duration,
}

impl FailoverPolicy {
    /// Total attempts an acquire may make.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for FailoverPolicy {
    fn default() -> Self {
        Self::from(&FailoverConfig::default())
    }
}

impl From<&FailoverConfig> for FailoverPolicy {
    fn from(config: &FailoverConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            health_check_interval: Duration::from_millis(config.health_check_interval_ms),
            probe_timeout: Duration::from_millis(config.probe_timeout_ms),
        }
    }
}

/// Point-in-time view of a source, for status output.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub database: String,
    pub failover_enabled: bool,
    pub active_index: usize,
    pub active_host: HostDescriptor,
    pub primary: HostDescriptor,
    pub hosts: Vec<HostDescriptor>,
}

/// Hands out connections for one database, failing over between its hosts.
pub struct FailoverSource<F: PoolFactory> {
    selector: Arc<HostSelector<F>>,
    policy: FailoverPolicy,
}

impl<F: PoolFactory> FailoverSource<F> {
    /// Create a source pointing at the primary.
    pub fn new(
        database: &str,
        hosts: Vec<HostDescriptor>,
        policy: FailoverPolicy,
        factory: F,
    ) -> Result<Self, FailoverError<PoolError<F>>> {
        let table = HostTable::new(database, hosts)?;
        let selector = HostSelector::new(database, table, factory)?;
        let source = Self {
            selector: Arc::new(selector),
            policy,
        };

        let hosts = source.selector.hosts();
        if source.failover_active() {
            tracing::info!(
                database = %database,
                host_count = hosts.len(),
                max_retries = source.policy.max_retries,
                retry_delay_ms = source.policy.retry_delay.as_millis() as u64,
                "Failover enabled"
            );
            for (i, host) in hosts.hosts().iter().enumerate() {
                tracing::info!(database = %database, index = i, host = %host, "Configured host");
            }
        } else {
            tracing::info!(
                database = %database,
                host = %hosts.primary(),
                "Failover disabled or single host configured"
            );
        }

        Ok(source)
    }

    /// Create a source from its configuration section.
    pub fn from_config(
        database: &str,
        config: &DatabaseConfig,
        factory: F,
    ) -> Result<Self, FailoverError<PoolError<F>>> {
        Self::new(
            database,
            config.hosts.clone(),
            FailoverPolicy::from(&config.failover),
            factory,
        )
    }

    pub fn database(&self) -> &str {
        self.selector.database()
    }

    pub fn policy(&self) -> &FailoverPolicy {
        &self.policy
    }

    pub fn selector(&self) -> &Arc<HostSelector<F>> {
        &self.selector
    }

    /// Whether acquire retries across hosts.
    pub fn failover_active(&self) -> bool {
        self.policy.enabled && self.selector.hosts().len() > 1
    }

    pub fn active_index(&self) -> usize {
        self.selector.active_index()
    }

    /// Acquire a usable connection.
    pub async fn acquire(&self) -> Result<PoolConnection<F>, FailoverError<PoolError<F>>> {
        if !self.failover_active() {
            let active = self.selector.current();
            return active.pool().get_connection().await.map_err(|source| {
                let host = active.host().clone();
                match source.classify() {
                    ErrorClass::Connectivity => FailoverError::Connectivity { host, source },
                    ErrorClass::NonConnectivity => FailoverError::NonConnectivity { host, source },
                }
            });
        }

        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let active = self.selector.current();

            let source = match self.try_acquire(&active).await {
                Ok(conn) => {
                    if attempt > 1 {
                        tracing::info!(
                            database = %self.database(),
                            host = %active.host(),
                            attempt,
                            "Acquired connection after failover"
                        );
                    }
                    return Ok(conn);
                }
                Err(source) => source,
            };

            let host = active.host().clone();
            if source.classify() == ErrorClass::NonConnectivity {
                tracing::warn!(
                    database = %self.database(),
                    host = %host,
                    attempt,
                    error = %source,
                    "Connection failed with non-connectivity error, not failing over"
                );
                return Err(FailoverError::NonConnectivity { host, source });
            }

            tracing::warn!(
                database = %self.database(),
                host = %host,
                attempt,
                max_attempts,
                error = %source,
                "Connection failed, attempting failover"
            );

            let outcome = self
                .selector
                .advance_from(active.index(), SwitchReason::ConnectivityFailure)
                .await?;
            if outcome == SwitchOutcome::Unchanged {
                tracing::debug!(database = %self.database(), host = %host, "No host switch performed");
            }

            if attempt >= max_attempts {
                tracing::error!(
                    database = %self.database(),
                    last_host = %host,
                    new_host = %self.selector.current().host(),
                    attempts = attempt,
                    reason = "retries_exhausted",
                    error = %source,
                    "Connection failed after all retries"
                );
                metrics::record_exhausted(self.database());
                return Err(FailoverError::Exhausted {
                    attempts: attempt,
                    host,
                    source,
                });
            }

            tokio::time::sleep(self.policy.retry_delay).await;
        }
    }

    /// Return a connection to the pool it came from.
    pub fn release(&self, conn: PoolConnection<F>) {
        <F::Pool as ConnectionPool>::release(conn);
    }

    /// Snapshot for status reporting.
    pub fn status(&self) -> SourceStatus {
        let active = self.selector.current();
        let hosts = self.selector.hosts();
        SourceStatus {
            database: self.database().to_string(),
            failover_enabled: self.failover_active(),
            active_index: active.index(),
            active_host: active.host().clone(),
            primary: hosts.primary().clone(),
            hosts: hosts.hosts().to_vec(),
        }
    }

    /// Health monitor for this source, if failover is active.
    pub fn monitor(&self) -> Option<PrimaryMonitor<F>> {
        self.failover_active().then(|| {
            PrimaryMonitor::new(
                self.selector.clone(),
                self.policy.health_check_interval,
                self.policy.probe_timeout,
            )
        })
    }

    /// Spawn the health monitor; it exits when `shutdown` fires.
    pub fn spawn_monitor(&self, shutdown: &Shutdown) -> Option<JoinHandle<()>> {
        let monitor = self.monitor()?;
        let rx = shutdown.subscribe();
        Some(tokio::spawn(monitor.run(rx)))
    }

    /// Close the active pool.
    pub async fn close(&self) {
        self.selector.shutdown().await;
    }

    // One attempt: checkout plus liveness probe.
    async fn try_acquire(
        &self,
        active: &ActiveHost<F::Pool>,
    ) -> Result<PoolConnection<F>, PoolError<F>> {
        let pool = active.pool();
        let mut conn = pool.get_connection().await?;
        match pool.validate(&mut conn).await {
            Ok(()) => Ok(conn),
            Err(e) => {
                pool.discard(conn).await;
                Err(e)
            }
        }
    }
}
