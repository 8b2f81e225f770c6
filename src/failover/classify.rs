//! Error classification.
//!
//! # Responsibilities
//! - Decide whether a driver error means "host unreachable" (failover-worthy)
//! - Keep everything else (auth, syntax, constraints) on the fatal path
//!
//! # Design Decisions
//! - Classification happens once, where the error is observed
//! - Structured signals (io kind, SQLSTATE) are checked before message text
//! - Unknown errors are non-connectivity

use std::io;

/// Outcome of classifying a driver error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Host unreachable or unhealthy. Retry on another host.
    Connectivity,
    /// Anything else. Propagate without switching.
    NonConnectivity,
}

impl ErrorClass {
    pub fn is_connectivity(self) -> bool {
        self == ErrorClass::Connectivity
    }
}

/// Implemented by driver error types so the failover source can classify them.
pub trait Classify {
    fn classify(&self) -> ErrorClass;
}

const CONNECTIVITY_MESSAGES: &[&str] = &[
    "connection refused",
    "unable to connect",
    "connection timed out",
    "communications link failure",
    "failed to lookup address",
    "name or service not known",
    "no route to host",
    "network is unreachable",
];

/// Classify an io error raised while talking to a host.
pub fn classify_io(err: &io::Error) -> ErrorClass {
    match err.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::AddrNotAvailable
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::TimedOut
        | io::ErrorKind::UnexpectedEof => ErrorClass::Connectivity,
        _ => classify_message(&err.to_string()),
    }
}

/// Classify a SQLSTATE code reported by the server.
///
/// Class 08 is "connection exception", class 53 "insufficient resources".
/// 57P01..57P03 are the postgres shutdown / not-yet-accepting states.
pub fn classify_sqlstate(code: &str) -> ErrorClass {
    if code.starts_with("08") || code.starts_with("53") {
        return ErrorClass::Connectivity;
    }
    match code {
        "57P01" | "57P02" | "57P03" => ErrorClass::Connectivity,
        _ => ErrorClass::NonConnectivity,
    }
}

/// Last-resort classification on the error message.
pub fn classify_message(message: &str) -> ErrorClass {
    let lower = message.to_ascii_lowercase();
    if CONNECTIVITY_MESSAGES.iter().any(|needle| lower.contains(needle)) {
        ErrorClass::Connectivity
    } else {
        ErrorClass::NonConnectivity
    }
}

impl Classify for io::Error {
    fn classify(&self) -> ErrorClass {
        classify_io(self)
    }
}

impl Classify for sqlx::Error {
    fn classify(&self) -> ErrorClass {
        match self {
            sqlx::Error::Io(e) => classify_io(e),
            // Acquire timed out: the host never produced a usable connection.
            sqlx::Error::PoolTimedOut => ErrorClass::Connectivity,
            // A superseded pool was closed under us; the next attempt uses the new one.
            sqlx::Error::PoolClosed => ErrorClass::Connectivity,
            sqlx::Error::WorkerCrashed => ErrorClass::Connectivity,
            sqlx::Error::Database(db) => match db.code() {
                Some(code) if classify_sqlstate(&code).is_connectivity() => {
                    ErrorClass::Connectivity
                }
                Some(_) => ErrorClass::NonConnectivity,
                None => classify_message(db.message()),
            },
            sqlx::Error::Configuration(_) | sqlx::Error::Tls(_) => ErrorClass::NonConnectivity,
            other => classify_message(&other.to_string()),
        }
    }
}
