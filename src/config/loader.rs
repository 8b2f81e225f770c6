//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding the MySQL password.
pub const MYSQL_PASSWORD_ENV: &str = "DB_FAILOVER_MYSQL_PASSWORD";
/// Environment variable overriding the Postgres password.
pub const POSTGRES_PASSWORD_ENV: &str = "DB_FAILOVER_POSTGRES_PASSWORD";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content, |key| std::env::var(key).ok())
}

/// Parse, apply environment overrides and validate.
///
/// `env` looks up environment variables.
pub fn parse_config<F>(content: &str, env: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config: AppConfig = toml::from_str(content)?;

    if let Some(password) = env(MYSQL_PASSWORD_ENV) {
        config.mysql.password = password;
    }
    if let Some(password) = env(POSTGRES_PASSWORD_ENV) {
        config.postgres.password = password;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
