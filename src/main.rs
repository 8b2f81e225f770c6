use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use db_failover::config::{load_config, AppConfig};
use db_failover::failover::{FailoverSource, SourceStatus};
use db_failover::lifecycle::{signals, Databases, Shutdown};
use db_failover::observability::{logging, metrics};
use db_failover::pool::PoolFactory;

#[derive(Parser)]
#[command(name = "db-failover")]
#[command(about = "Failover-aware connection pools for MySQL and Postgres", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "config/db-failover.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Hold the pools open and run health monitors until signalled
    Serve,
    /// Acquire one connection per database and report the active hosts
    Check {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct CheckReport {
    #[serde(flatten)]
    status: SourceStatus,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", cli.config.display());
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.observability);
    tracing::info!(config = %cli.config.display(), "db-failover v{} starting", env!("CARGO_PKG_VERSION"));

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&config).await,
        Commands::Check { json } => check(&config, json).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn serve(config: &AppConfig) -> Result<ExitCode, Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let databases = Databases::connect(config)?;
    let shutdown = Shutdown::new();
    let monitors = databases.spawn_monitors(&shutdown);
    tracing::info!(monitors = monitors.len(), "Serving, waiting for shutdown signal");

    signals::wait_for_signal().await;
    shutdown.trigger();
    for handle in monitors {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Health monitor task ended abnormally");
        }
    }

    databases.close().await;
    tracing::info!("Shutdown complete");
    Ok(ExitCode::SUCCESS)
}

async fn check(config: &AppConfig, json: bool) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let databases = Databases::connect(config)?;

    let reports = vec![
        check_source(&databases.mysql).await,
        check_source(&databases.postgres).await,
    ];
    databases.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            let state = if report.ok { "ok" } else { "FAILED" };
            println!(
                "{:<10} {:<7} active={} (index {}) primary={} failover={}",
                report.status.database,
                state,
                report.status.active_host,
                report.status.active_index,
                report.status.primary,
                report.status.failover_enabled,
            );
            if let Some(error) = &report.error {
                println!("           error: {error}");
            }
        }
    }

    Ok(if reports.iter().all(|r| r.ok) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn check_source<F: PoolFactory>(source: &FailoverSource<F>) -> CheckReport {
    let error = match source.acquire().await {
        Ok(conn) => {
            source.release(conn);
            None
        }
        Err(e) => Some(e.to_string()),
    };

    CheckReport {
        status: source.status(),
        ok: error.is_none(),
        error,
    }
}
