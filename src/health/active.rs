//! Active health checking of the primary.
//!
//! # Responsibilities
//! - Periodically probe the primary while a standby is active
//! - Switch back to the primary once it validates
//! - Always close the trial connection and pool

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::failover::selector::{HostSelector, SwitchOutcome, SwitchReason};
use crate::observability::metrics;
use crate::pool::{ConnectionPool, PoolFactory};

/// Result of a single health check tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Already on the primary; nothing probed.
    Skipped,
    /// Primary validated and is active again.
    Recovered,
    /// Primary validated but the switch was a no-op (raced with another switch).
    AlreadyActive,
    /// Primary still unusable.
    Unavailable,
}

pub struct PrimaryMonitor<F: PoolFactory> {
    selector: Arc<HostSelector<F>>,
    interval: Duration,
    probe_timeout: Duration,
}

impl<F: PoolFactory> PrimaryMonitor<F> {
    pub fn new(selector: Arc<HostSelector<F>>, interval: Duration, probe_timeout: Duration) -> Self {
        Self {
            selector,
            interval,
            probe_timeout,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            database = %self.selector.database(),
            interval_ms = self.interval.as_millis() as u64,
            primary = %self.selector.hosts().primary(),
            "Primary health monitor starting"
        );

        // Fixed delay between checks; the first one waits a full period.
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Handler body: shutdown cannot interrupt a probe in flight.
                    self.check_primary().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!(
                        database = %self.selector.database(),
                        "Health monitor received shutdown signal, exiting loop"
                    );
                    break;
                }
            }
        }
    }

    /// One health check tick.
    pub async fn check_primary(&self) -> ProbeOutcome {
        if self.selector.active_index() == 0 {
            return ProbeOutcome::Skipped;
        }

        let database = self.selector.database();
        let primary = self.selector.hosts().primary().clone();

        if let Err(e) = self.probe().await {
            tracing::debug!(
                database = %database,
                host = %primary,
                error = %e,
                "Primary host still unavailable"
            );
            return ProbeOutcome::Unavailable;
        }

        match self.selector.switch_to(0, SwitchReason::PrimaryRecovered).await {
            Ok(SwitchOutcome::Switched { from, .. }) => {
                tracing::info!(
                    database = %database,
                    old_host = %self.selector.hosts().get(from).unwrap_or(&primary),
                    new_host = %primary,
                    reason = %SwitchReason::PrimaryRecovered,
                    "Primary host is back online"
                );
                metrics::record_primary_recovered(database);
                ProbeOutcome::Recovered
            }
            Ok(SwitchOutcome::Unchanged) => ProbeOutcome::AlreadyActive,
            Err(e) => {
                tracing::warn!(
                    database = %database,
                    host = %primary,
                    error = %e,
                    "Failed to switch back to primary"
                );
                ProbeOutcome::Unavailable
            }
        }
    }

    // Trial pool against the primary, closed whatever the outcome.
    async fn probe(&self) -> Result<(), ProbeError> {
        let primary = self.selector.hosts().primary();
        let pool = self
            .selector
            .factory()
            .build_trial_pool(primary)
            .map_err(|e| ProbeError::Driver(e.to_string()))?;

        let result = match time::timeout(self.probe_timeout, probe_once(&pool)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ProbeError::Driver(e.to_string())),
            Err(_) => Err(ProbeError::Timeout(self.probe_timeout)),
        };

        pool.close().await;
        result
    }
}

async fn probe_once<P: ConnectionPool>(pool: &P) -> Result<(), P::Error> {
    let mut conn = pool.get_connection().await?;
    let result = pool.validate(&mut conn).await;
    P::release(conn);
    result
}

#[derive(Debug, thiserror::Error)]
enum ProbeError {
    #[error("{0}")]
    Driver(String),
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
}
