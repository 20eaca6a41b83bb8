//! Market Dashboard - multi-timeframe bar store and screening pipeline
//!
//! Keeps a local DuckDB store of OHLCV bars in sync with an upstream feed,
//! derives indicators and trend phases from it, and funnels the results
//! through a broad scan (which maintains an expiring watchlist) and a
//! detailed scan (which alerts).

pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod indicators;
pub mod jobs;
pub mod notify;
pub mod scheduler;
pub mod services;
pub mod state;
pub mod timeframe;

use chrono::Utc;
use config::Settings;
use error::Result;
use jobs::ScanReport;
use scheduler::ScanScheduler;
use state::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// What the binary was asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Broad,
    Detailed,
    Recalc,
    Repair,
    Daemon,
}

impl std::str::FromStr for Command {
    type Err = error::AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "broad" => Ok(Command::Broad),
            "detailed" => Ok(Command::Detailed),
            "recalc" => Ok(Command::Recalc),
            "repair" => Ok(Command::Repair),
            "daemon" => Ok(Command::Daemon),
            other => Err(error::AppError::Validation(format!("Unknown command: {}", other))),
        }
    }
}

/// Resolve the config path: explicit flag, then environment, then default.
pub fn config_path(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| std::env::var_os("MARKET_DASHBOARD_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(config::DEFAULT_CONFIG_PATH))
}

/// Load settings, initialize logging and run one command
pub async fn run(command: Command, config: PathBuf) -> Result<()> {
    let settings = Settings::load(&config)?;

    // Initialize tracing/logging
    let default_filter = format!("market_dashboard={}", settings.system.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Market Dashboard ({:?}) with {}", command, config.display());

    let state = Arc::new(AppState::new(settings)?);

    let report = match command {
        Command::Broad => jobs::broad_scan::run(&state, Utc::now()).await?,
        Command::Detailed => jobs::detailed_scan::run(&state, Utc::now()).await?,
        Command::Recalc => jobs::maintenance::recalc(&state, Utc::now())?,
        Command::Repair => jobs::maintenance::repair(&state, Utc::now()).await?,
        Command::Daemon => {
            ScanScheduler::new(state)?.run().await?;
            return Ok(());
        }
    };

    log_report(&report);
    Ok(())
}

fn log_report(report: &ScanReport) {
    match serde_json::to_string(report) {
        Ok(json) => tracing::debug!("Report: {}", json),
        Err(e) => tracing::warn!("Could not serialize report: {}", e),
    }
    for (tf, err) in &report.failed_timeframes {
        tracing::error!("Timeframe {} failed [{}]: {}", tf, err.code, err.message);
    }
}
