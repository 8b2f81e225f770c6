//! Host descriptors and the ordered host table.
//!
//! # Responsibilities
//! - Represent a single database endpoint (host, port)
//! - Hold the ordered, immutable list of endpoints for one database
//! - Designate index 0 as the primary
//!
//! # Design Decisions
//! - Built once at startup, never mutated afterwards
//! - An empty table is a startup error, never a runtime state

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::failover::error::ConfigurationError;

/// A single database endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct HostDescriptor {
    /// Hostname or IP address.
    #[serde(alias = "address")]
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl HostDescriptor {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for HostDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Bare IPv6 literals need brackets to stay unambiguous.
        if self.host.contains(':') && !self.host.starts_with('[') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Ordered, fixed list of hosts. Index 0 is the primary.
///
/// Cloning is cheap; all clones share the same backing slice.
#[derive(Debug, Clone)]
pub struct HostTable {
    hosts: Arc<[HostDescriptor]>,
}

impl HostTable {
    /// Build a table for the named database.
    pub fn new(database: &str, hosts: Vec<HostDescriptor>) -> Result<Self, ConfigurationError> {
        if hosts.is_empty() {
            return Err(ConfigurationError::NoHosts {
                database: database.to_string(),
            });
        }
        Ok(Self {
            hosts: hosts.into(),
        })
    }

    pub fn hosts(&self) -> &[HostDescriptor] {
        &self.hosts
    }

    pub fn primary(&self) -> &HostDescriptor {
        &self.hosts[0]
    }

    pub fn get(&self, index: usize) -> Option<&HostDescriptor> {
        self.hosts.get(index)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Index of the host after `index`, wrapping around to the primary.
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.hosts.len()
    }
}
