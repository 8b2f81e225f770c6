//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject empty host lists, zero ports, impossible pool sizes
//! - Validate timing values the failover layer divides or sleeps on
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::{AppConfig, DatabaseConfig};

/// A single semantic problem, located by its dotted config path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate the whole configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    validate_database("mysql", &config.mysql, &mut errors);
    validate_database("postgres", &config.postgres, &mut errors);

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    match config.observability.log_format.as_str() {
        "pretty" | "json" => {}
        other => errors.push(ValidationError::new(
            "observability.log_format",
            format!("unknown format '{}', expected 'pretty' or 'json'", other),
        )),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_database(name: &str, db: &DatabaseConfig, errors: &mut Vec<ValidationError>) {
    if db.hosts.is_empty() {
        errors.push(ValidationError::new(
            format!("{}.hosts", name),
            "No hosts configured",
        ));
    }
    for (i, host) in db.hosts.iter().enumerate() {
        if host.host.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("{}.hosts[{}].host", name, i),
                "must not be empty",
            ));
        }
        if host.port == 0 {
            errors.push(ValidationError::new(
                format!("{}.hosts[{}].port", name, i),
                "must be greater than 0",
            ));
        }
    }

    if db.database.trim().is_empty() {
        errors.push(ValidationError::new(format!("{}.database", name), "must not be empty"));
    }
    if db.username.trim().is_empty() {
        errors.push(ValidationError::new(format!("{}.username", name), "must not be empty"));
    }

    let pool = &db.pool;
    if pool.max_size == 0 {
        errors.push(ValidationError::new(
            format!("{}.pool.max_size", name),
            "must be greater than 0",
        ));
    }
    if pool.min_idle > pool.max_size {
        errors.push(ValidationError::new(
            format!("{}.pool.min_idle", name),
            format!("{} exceeds max_size {}", pool.min_idle, pool.max_size),
        ));
    }
    if pool.connection_timeout_ms == 0 {
        errors.push(ValidationError::new(
            format!("{}.pool.connection_timeout_ms", name),
            "must be greater than 0",
        ));
    }
    if pool.validation_timeout_ms == 0 {
        errors.push(ValidationError::new(
            format!("{}.pool.validation_timeout_ms", name),
            "must be greater than 0",
        ));
    }
    if pool.validation_query.trim().is_empty() {
        errors.push(ValidationError::new(
            format!("{}.pool.validation_query", name),
            "must not be empty",
        ));
    }

    // Timing only matters when the failover path is live.
    let failover = &db.failover;
    if failover.enabled && db.hosts.len() > 1 {
        if failover.health_check_interval_ms == 0 {
            errors.push(ValidationError::new(
                format!("{}.failover.health_check_interval_ms", name),
                "must be greater than 0",
            ));
        }
        if failover.probe_timeout_ms == 0 {
            errors.push(ValidationError::new(
                format!("{}.failover.probe_timeout_ms", name),
                "must be greater than 0",
            ));
        }
    }
}
