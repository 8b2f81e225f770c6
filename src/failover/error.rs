//! Failover error taxonomy.

use thiserror::Error;

use crate::failover::hosts::HostDescriptor;

/// Misconfiguration detected while wiring a failover source.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The host list for a database is empty.
    #[error("No hosts configured for database '{database}'")]
    NoHosts { database: String },

    /// A switch targeted an index outside the host table.
    #[error("Host index {index} out of range for database '{database}' ({len} hosts)")]
    HostIndexOutOfRange {
        database: String,
        index: usize,
        len: usize,
    },
}

/// Errors surfaced by a failover source.
///
/// `E` is the driver error type of the underlying pool, kept verbatim as
/// the source so callers can inspect what the driver reported.
#[derive(Debug, Error)]
pub enum FailoverError<E> {
    /// Fatal misconfiguration.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The driver rejected the pool configuration for a host. Never retried.
    #[error("Failed to build pool for {host}: {source}")]
    PoolCreation {
        host: HostDescriptor,
        #[source]
        source: E,
    },

    /// The host was unreachable and no retry was attempted.
    #[error("Connection to {host} failed: {source}")]
    Connectivity {
        host: HostDescriptor,
        #[source]
        source: E,
    },

    /// Auth, syntax or constraint failure. Never triggers a host switch.
    #[error("Non-connectivity error from {host}: {source}")]
    NonConnectivity {
        host: HostDescriptor,
        #[source]
        source: E,
    },

    /// Every attempt failed with a connectivity error.
    #[error("Failover exhausted after {attempts} attempts, last host {host}: {source}")]
    Exhausted {
        attempts: u32,
        host: HostDescriptor,
        #[source]
        source: E,
    },
}

impl<E> FailoverError<E> {
    /// The underlying driver error, if this error carries one.
    pub fn driver_error(&self) -> Option<&E> {
        match self {
            FailoverError::Configuration(_) => None,
            FailoverError::PoolCreation { source, .. }
            | FailoverError::Connectivity { source, .. }
            | FailoverError::NonConnectivity { source, .. }
            | FailoverError::Exhausted { source, .. } => Some(source),
        }
    }

    /// Consume the error and return the underlying driver error.
    pub fn into_driver_error(self) -> Option<E> {
        match self {
            FailoverError::Configuration(_) => None,
            FailoverError::PoolCreation { source, .. }
            | FailoverError::Connectivity { source, .. }
            | FailoverError::NonConnectivity { source, .. }
            | FailoverError::Exhausted { source, .. } => Some(source),
        }
    }

    /// True for errors that indicate the configured hosts were unreachable.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            FailoverError::Connectivity { .. } | FailoverError::Exhausted { .. }
        )
    }
}
