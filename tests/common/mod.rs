//! Shared utilities for integration testing.
//!
//! `MockCluster` stands in for a set of database hosts. A host's port is
//! its index in the cluster, so `host(i)` and the failover host table
//! line up one to one.

#![allow(dead_code)]

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use db_failover::failover::{Classify, ErrorClass, HostDescriptor};
use db_failover::pool::{ConnectionPool, PoolFactory};

/// Behaviour of one mock host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMode {
    Up,
    /// Refuses connections.
    Down,
    /// Accepts the socket, rejects the credentials.
    RejectAuth,
    /// Never answers.
    Hang,
    /// Hands out connections that then fail the liveness check as unreachable.
    FailValidation,
    /// Hands out connections whose liveness check is refused on permissions.
    RejectValidation,
}

#[derive(Debug)]
pub enum MockError {
    Refused(HostDescriptor),
    InvalidCredentials(HostDescriptor),
    BadConfig(HostDescriptor),
}

impl fmt::Display for MockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MockError::Refused(h) => write!(f, "Connection refused: {h}"),
            MockError::InvalidCredentials(h) => write!(f, "Access denied for user on {h}"),
            MockError::BadConfig(h) => write!(f, "invalid pool configuration for {h}"),
        }
    }
}

impl std::error::Error for MockError {}

impl Classify for MockError {
    fn classify(&self) -> ErrorClass {
        match self {
            MockError::Refused(_) => ErrorClass::Connectivity,
            MockError::InvalidCredentials(_) | MockError::BadConfig(_) => {
                ErrorClass::NonConnectivity
            }
        }
    }
}

struct HostState {
    mode: Mutex<HostMode>,
    attempts: AtomicUsize,
    pools_built: AtomicUsize,
    pools_closed: AtomicUsize,
    live: AtomicUsize,
    discarded: AtomicUsize,
}

pub struct MockCluster {
    hosts: Vec<HostState>,
    fail_builds: AtomicBool,
}

impl MockCluster {
    /// A cluster with `modes.len()` hosts in the given states.
    pub fn new(modes: &[HostMode]) -> Arc<Self> {
        Arc::new(Self {
            hosts: modes
                .iter()
                .map(|&mode| HostState {
                    mode: Mutex::new(mode),
                    attempts: AtomicUsize::new(0),
                    pools_built: AtomicUsize::new(0),
                    pools_closed: AtomicUsize::new(0),
                    live: AtomicUsize::new(0),
                    discarded: AtomicUsize::new(0),
                })
                .collect(),
            fail_builds: AtomicBool::new(false),
        })
    }

    pub fn host(index: usize) -> HostDescriptor {
        HostDescriptor::new("mock", index as u16)
    }

    /// Host descriptors for every member, primary first.
    pub fn descriptors(&self) -> Vec<HostDescriptor> {
        (0..self.hosts.len()).map(Self::host).collect()
    }

    pub fn factory(self: &Arc<Self>) -> MockFactory {
        MockFactory {
            cluster: self.clone(),
        }
    }

    pub fn set_mode(&self, index: usize, mode: HostMode) {
        *self.hosts[index].mode.lock().unwrap() = mode;
    }

    pub fn mode(&self, index: usize) -> HostMode {
        *self.hosts[index].mode.lock().unwrap()
    }

    /// Make every subsequent `build_pool` fail.
    pub fn fail_builds(&self) {
        self.fail_builds.store(true, Ordering::SeqCst);
    }

    pub fn attempts(&self, index: usize) -> usize {
        self.hosts[index].attempts.load(Ordering::SeqCst)
    }

    pub fn total_attempts(&self) -> usize {
        (0..self.hosts.len()).map(|i| self.attempts(i)).sum()
    }

    pub fn pools_built(&self, index: usize) -> usize {
        self.hosts[index].pools_built.load(Ordering::SeqCst)
    }

    pub fn pools_closed(&self, index: usize) -> usize {
        self.hosts[index].pools_closed.load(Ordering::SeqCst)
    }

    pub fn live_connections(&self, index: usize) -> usize {
        self.hosts[index].live.load(Ordering::SeqCst)
    }

    /// Connections closed by the pool instead of being handed out.
    pub fn discarded(&self, index: usize) -> usize {
        self.hosts[index].discarded.load(Ordering::SeqCst)
    }

    /// Wait for background pool disposal to reach `expected` closes.
    pub async fn wait_for_closed(&self, index: usize, expected: usize) {
        let wait = async {
            while self.pools_closed(index) < expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .unwrap_or_else(|_| {
                panic!(
                    "host {index}: expected {expected} closed pools, saw {}",
                    self.pools_closed(index)
                )
            });
    }
}

pub struct MockFactory {
    cluster: Arc<MockCluster>,
}

impl PoolFactory for MockFactory {
    type Pool = MockPool;

    fn build_pool(&self, host: &HostDescriptor) -> Result<MockPool, MockError> {
        if self.cluster.fail_builds.load(Ordering::SeqCst) {
            return Err(MockError::BadConfig(host.clone()));
        }
        let index = host.port as usize;
        self.cluster.hosts[index]
            .pools_built
            .fetch_add(1, Ordering::SeqCst);
        Ok(MockPool {
            cluster: self.cluster.clone(),
            host: host.clone(),
            index,
        })
    }
}

pub struct MockPool {
    cluster: Arc<MockCluster>,
    host: HostDescriptor,
    index: usize,
}

pub struct MockConnection {
    cluster: Arc<MockCluster>,
    pub index: usize,
}

impl fmt::Debug for MockConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockConnection").field("index", &self.index).finish()
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.cluster.hosts[self.index]
            .live
            .fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectionPool for MockPool {
    type Connection = MockConnection;
    type Error = MockError;

    fn host(&self) -> &HostDescriptor {
        &self.host
    }

    async fn get_connection(&self) -> Result<MockConnection, MockError> {
        let state = &self.cluster.hosts[self.index];
        state.attempts.fetch_add(1, Ordering::SeqCst);
        match self.cluster.mode(self.index) {
            HostMode::Up | HostMode::FailValidation | HostMode::RejectValidation => {
                state.live.fetch_add(1, Ordering::SeqCst);
                Ok(MockConnection {
                    cluster: self.cluster.clone(),
                    index: self.index,
                })
            }
            HostMode::Down => Err(MockError::Refused(self.host.clone())),
            HostMode::RejectAuth => Err(MockError::InvalidCredentials(self.host.clone())),
            HostMode::Hang => std::future::pending().await,
        }
    }

    async fn validate(&self, _conn: &mut MockConnection) -> Result<(), MockError> {
        match self.cluster.mode(self.index) {
            HostMode::Down | HostMode::FailValidation => {
                Err(MockError::Refused(self.host.clone()))
            }
            HostMode::RejectValidation => Err(MockError::InvalidCredentials(self.host.clone())),
            _ => Ok(()),
        }
    }

    async fn discard(&self, conn: MockConnection) {
        self.cluster.hosts[self.index]
            .discarded
            .fetch_add(1, Ordering::SeqCst);
        drop(conn);
    }

    async fn close(&self) {
        self.cluster.hosts[self.index]
            .pools_closed
            .fetch_add(1, Ordering::SeqCst);
    }
}

/// Collects formatted log output for assertions.
///
/// The subscriber is thread-local, so it sees events from tasks on a
/// current-thread runtime.
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::INFO)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn lines(&self) -> Vec<String> {
        let buf = self.buf.lock().unwrap();
        String::from_utf8_lossy(&buf)
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Lines containing every one of `needles`.
    pub fn matching(&self, needles: &[&str]) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| needles.iter().all(|n| line.contains(n)))
            .collect()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
