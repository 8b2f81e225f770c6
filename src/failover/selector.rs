//! Active-host selection.
//!
//! # Responsibilities
//! - Hold the active (index, host, pool) snapshot
//! - Serialize switches so index and pool never disagree
//! - Dispose of superseded pools exactly once
//!
//! # Design Decisions
//! - The snapshot is immutable and swapped whole through `ArcSwap`, so
//!   readers never see an index without its pool
//! - Writers take a mutex; readers never do
//! - Pools are closed in a spawned task after the swap, outside the lock

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;

use crate::failover::error::{ConfigurationError, FailoverError};
use crate::failover::hosts::{HostDescriptor, HostTable};
use crate::observability::metrics;
use crate::pool::{ConnectionPool, PoolError, PoolFactory};

/// Why a switch was requested. Logged with every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchReason {
    /// An acquire attempt failed with a connectivity error.
    ConnectivityFailure,
    /// The health check found the primary usable again.
    PrimaryRecovered,
    /// Requested explicitly by an operator or caller.
    Manual,
}

impl SwitchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwitchReason::ConnectivityFailure => "connectivity_failure",
            SwitchReason::PrimaryRecovered => "primary_recovered",
            SwitchReason::Manual => "manual",
        }
    }
}

impl fmt::Display for SwitchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a switch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// Target already active, or another caller switched first.
    Unchanged,
    /// A new pool was built and swapped in.
    Switched { from: usize, to: usize },
}

/// Immutable view of the active host.
pub struct ActiveHost<P> {
    index: usize,
    pool: Arc<P>,
}

impl<P: ConnectionPool> ActiveHost<P> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn host(&self) -> &HostDescriptor {
        self.pool.host()
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    pub fn is_primary(&self) -> bool {
        self.index == 0
    }
}

/// Tracks which host of a database is active and owns its pool.
pub struct HostSelector<F: PoolFactory> {
    database: Arc<str>,
    hosts: HostTable,
    factory: F,
    active: ArcSwap<ActiveHost<F::Pool>>,
    switch_lock: Mutex<()>,
}

impl<F: PoolFactory> HostSelector<F> {
    /// Build the selector with a pool for the primary.
    pub fn new(
        database: impl Into<Arc<str>>,
        hosts: HostTable,
        factory: F,
    ) -> Result<Self, FailoverError<PoolError<F>>> {
        let database = database.into();
        let primary = hosts.primary().clone();
        let pool = factory
            .build_pool(&primary)
            .map_err(|source| FailoverError::PoolCreation {
                host: primary.clone(),
                source,
            })?;

        metrics::set_active_host(&database, 0);

        Ok(Self {
            database,
            hosts,
            factory,
            active: ArcSwap::from_pointee(ActiveHost {
                index: 0,
                pool: Arc::new(pool),
            }),
            switch_lock: Mutex::new(()),
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn hosts(&self) -> &HostTable {
        &self.hosts
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Current snapshot. Lock-free.
    pub fn current(&self) -> Arc<ActiveHost<F::Pool>> {
        self.active.load_full()
    }

    pub fn active_index(&self) -> usize {
        self.active.load().index
    }

    /// Make `index` the active host. No-op if it already is.
    pub async fn switch_to(
        &self,
        index: usize,
        reason: SwitchReason,
    ) -> Result<SwitchOutcome, FailoverError<PoolError<F>>> {
        let _guard = self.switch_lock.lock().await;
        let previous = self.active.load_full();
        if previous.index == index {
            return Ok(SwitchOutcome::Unchanged);
        }
        self.replace(previous, index, reason)
    }

    /// Move to the host after the active one.
    pub async fn advance(
        &self,
        reason: SwitchReason,
    ) -> Result<SwitchOutcome, FailoverError<PoolError<F>>> {
        let _guard = self.switch_lock.lock().await;
        let previous = self.active.load_full();
        let next = self.hosts.next_index(previous.index);
        if next == previous.index {
            return Ok(SwitchOutcome::Unchanged);
        }
        self.replace(previous, next, reason)
    }

    /// Move past `failed`, unless another caller already did.
    ///
    /// Callers that failed on the same pool all pass the same index; only
    /// the first one switches, the rest observe the new index and return.
    pub async fn advance_from(
        &self,
        failed: usize,
        reason: SwitchReason,
    ) -> Result<SwitchOutcome, FailoverError<PoolError<F>>> {
        let _guard = self.switch_lock.lock().await;
        let previous = self.active.load_full();
        if previous.index != failed {
            tracing::debug!(
                database = %self.database,
                failed_index = failed,
                active_index = previous.index,
                "Switch already performed by another caller"
            );
            return Ok(SwitchOutcome::Unchanged);
        }
        let next = self.hosts.next_index(failed);
        if next == failed {
            return Ok(SwitchOutcome::Unchanged);
        }
        self.replace(previous, next, reason)
    }

    /// Close the active pool. Called once at process shutdown.
    pub async fn shutdown(&self) {
        let _guard = self.switch_lock.lock().await;
        let active = self.active.load_full();
        active.pool.close().await;
        tracing::info!(
            database = %self.database,
            host = %active.host(),
            "Closed active connection pool"
        );
    }

    // Must be called with `switch_lock` held.
    fn replace(
        &self,
        previous: Arc<ActiveHost<F::Pool>>,
        index: usize,
        reason: SwitchReason,
    ) -> Result<SwitchOutcome, FailoverError<PoolError<F>>> {
        let host = self
            .hosts
            .get(index)
            .ok_or_else(|| ConfigurationError::HostIndexOutOfRange {
                database: self.database.to_string(),
                index,
                len: self.hosts.len(),
            })?;

        let pool = self
            .factory
            .build_pool(host)
            .map_err(|source| FailoverError::PoolCreation {
                host: host.clone(),
                source,
            })?;

        self.active.store(Arc::new(ActiveHost {
            index,
            pool: Arc::new(pool),
        }));

        tracing::info!(
            database = %self.database,
            old_host = %previous.host(),
            new_host = %host,
            old_index = previous.index,
            new_index = index,
            reason = %reason,
            "Switched active database host"
        );
        metrics::record_switch(&self.database, reason);
        metrics::set_active_host(&self.database, index);

        let from = previous.index;
        self.dispose(previous);

        Ok(SwitchOutcome::Switched { from, to: index })
    }

    fn dispose(&self, previous: Arc<ActiveHost<F::Pool>>) {
        let database = self.database.clone();
        tokio::spawn(async move {
            previous.pool.close().await;
            tracing::debug!(
                database = %database,
                host = %previous.host(),
                "Disposed superseded connection pool"
            );
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Counters {
        built: [AtomicUsize; 3],
        closed: [AtomicUsize; 3],
    }

    struct CountingPool {
        host: HostDescriptor,
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl ConnectionPool for CountingPool {
        type Connection = ();
        type Error = io::Error;

        fn host(&self) -> &HostDescriptor {
            &self.host
        }

        async fn get_connection(&self) -> Result<(), io::Error> {
            Ok(())
        }

        async fn validate(&self, _conn: &mut ()) -> Result<(), io::Error> {
            Ok(())
        }

        async fn close(&self) {
            self.counters.closed[self.host.port as usize].fetch_add(1, Ordering::SeqCst);
        }
    }

    struct CountingFactory {
        counters: Arc<Counters>,
    }

    impl PoolFactory for CountingFactory {
        type Pool = CountingPool;

        fn build_pool(&self, host: &HostDescriptor) -> Result<CountingPool, io::Error> {
            self.counters.built[host.port as usize].fetch_add(1, Ordering::SeqCst);
            Ok(CountingPool {
                host: host.clone(),
                counters: self.counters.clone(),
            })
        }
    }

    // Ports double as host indexes.
    fn selector(n: u16) -> (HostSelector<CountingFactory>, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let hosts = (0..n).map(|i| HostDescriptor::new("127.0.0.1", i)).collect();
        let table = HostTable::new("test", hosts).unwrap();
        let selector = HostSelector::new(
            "test",
            table,
            CountingFactory {
                counters: counters.clone(),
            },
        )
        .unwrap();
        (selector, counters)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_switch_to_active_index_is_noop() {
        let (selector, counters) = selector(2);

        let outcome = selector.switch_to(0, SwitchReason::Manual).await.unwrap();
        settle().await;

        assert_eq!(outcome, SwitchOutcome::Unchanged);
        assert_eq!(counters.built[0].load(Ordering::SeqCst), 1);
        assert_eq!(counters.closed[0].load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_switch_disposes_previous_once() {
        let (selector, counters) = selector(3);

        let outcome = selector.switch_to(2, SwitchReason::Manual).await.unwrap();
        settle().await;

        assert_eq!(outcome, SwitchOutcome::Switched { from: 0, to: 2 });
        assert_eq!(selector.active_index(), 2);
        assert_eq!(selector.current().host().port, 2);
        assert_eq!(counters.closed[0].load(Ordering::SeqCst), 1);
        assert_eq!(counters.built[2].load(Ordering::SeqCst), 1);
        assert_eq!(counters.built[1].load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_advance_wraps_to_primary() {
        let (selector, _) = selector(2);

        selector.advance(SwitchReason::ConnectivityFailure).await.unwrap();
        assert_eq!(selector.active_index(), 1);
        selector.advance(SwitchReason::ConnectivityFailure).await.unwrap();
        assert_eq!(selector.active_index(), 0);
    }

    #[tokio::test]
    async fn test_advance_single_host_is_noop() {
        let (selector, counters) = selector(1);

        let outcome = selector.advance(SwitchReason::ConnectivityFailure).await.unwrap();
        assert_eq!(outcome, SwitchOutcome::Unchanged);
        assert_eq!(counters.built[0].load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_advance_from_coalesces() {
        let (selector, counters) = selector(3);

        let first = selector.advance_from(0, SwitchReason::ConnectivityFailure).await.unwrap();
        let second = selector.advance_from(0, SwitchReason::ConnectivityFailure).await.unwrap();
        settle().await;

        assert_eq!(first, SwitchOutcome::Switched { from: 0, to: 1 });
        assert_eq!(second, SwitchOutcome::Unchanged);
        assert_eq!(selector.active_index(), 1);
        assert_eq!(counters.built[1].load(Ordering::SeqCst), 1);
        assert_eq!(counters.closed[0].load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_index() {
        let (selector, _) = selector(2);

        let err = selector.switch_to(5, SwitchReason::Manual).await.unwrap_err();
        assert!(matches!(
            err,
            FailoverError::Configuration(ConfigurationError::HostIndexOutOfRange { index: 5, len: 2, .. })
        ));
        assert_eq!(selector.active_index(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_switches_stay_consistent() {
        let (selector, counters) = selector(3);
        let selector = Arc::new(selector);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let selector = selector.clone();
                tokio::spawn(async move {
                    selector.switch_to(i % 3, SwitchReason::Manual).await.unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        settle().await;

        let active = selector.current();
        assert_eq!(active.index(), active.host().port as usize);

        // Every pool except the active one was disposed exactly once.
        let built: usize = counters.built.iter().map(|c| c.load(Ordering::SeqCst)).sum();
        let closed: usize = counters.closed.iter().map(|c| c.load(Ordering::SeqCst)).sum();
        assert_eq!(built, closed + 1);
    }

    #[tokio::test]
    async fn test_shutdown_closes_active_pool() {
        let (selector, counters) = selector(2);
        selector.shutdown().await;
        assert_eq!(counters.closed[0].load(Ordering::SeqCst), 1);
    }
}
