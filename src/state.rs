//! Application state management

use crate::config::Settings;
use crate::db::duckdb::DuckDb;
use crate::error::Result;
use crate::feed::{MarketFeed, YahooFeed};
use crate::notify::{AlertSink, DiscordWebhook, LogSink};
use std::sync::Arc;
use std::time::Duration;

/// Application state shared by every job and service call
pub struct AppState {
    /// Validated settings
    pub settings: Settings,

    /// DuckDB store for bars, indicators and screener state
    pub duckdb: Arc<DuckDb>,

    /// Upstream market data feed
    pub feed: Arc<dyn MarketFeed>,

    /// Alert destination used by the notification gate
    pub alerts: Arc<dyn AlertSink>,
}

impl AppState {
    /// Create application state from settings, opening the store file
    pub fn new(settings: Settings) -> Result<Self> {
        if let Some(dir) = settings.system.db_path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }

        tracing::info!("Store: {:?}", settings.system.db_path);
        let duckdb = Arc::new(DuckDb::new(&settings.system.db_path)?);

        let feed: Arc<dyn MarketFeed> = Arc::new(YahooFeed::new(
            settings.sync.requests_per_second,
            Duration::from_secs(settings.sync.request_timeout_secs),
        )?);

        let alerts: Arc<dyn AlertSink> = match (&settings.alerts.discord_webhook_url, settings.alerts.enabled) {
            (Some(url), true) => Arc::new(DiscordWebhook::new(url.clone())?),
            _ => {
                tracing::info!("Alerts disabled, notifications go to the log");
                Arc::new(LogSink)
            }
        };

        Ok(Self::with_parts(settings, duckdb, feed, alerts))
    }

    /// Assemble state from explicit parts
    pub fn with_parts(
        settings: Settings,
        duckdb: Arc<DuckDb>,
        feed: Arc<dyn MarketFeed>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            settings,
            duckdb,
            feed,
            alerts,
        }
    }
}
