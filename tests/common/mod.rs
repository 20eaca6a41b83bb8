//! Shared fixtures: scripted feed, recording alert sink and bar generators.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use market_dashboard::config::Settings;
use market_dashboard::db::duckdb::DuckDb;
use market_dashboard::error::{AppError, Result};
use market_dashboard::feed::types::{FeedFrame, FeedRequest, FeedRow};
use market_dashboard::feed::MarketFeed;
use market_dashboard::notify::AlertSink;
use market_dashboard::state::AppState;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Feed serving canned rows per (interval, ticker)
#[derive(Default)]
pub struct ScriptedFeed {
    rows: Mutex<HashMap<(String, String), Vec<FeedRow>>>,
    /// Multi-ticker requests fail, forcing per-ticker failover
    pub fail_multi: bool,
    /// Tickers whose requests always fail
    pub broken: BTreeSet<String>,
    requests: Mutex<Vec<FeedRequest>>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rows(&self, interval: &str, ticker: &str, rows: Vec<FeedRow>) {
        self.rows
            .lock()
            .entry((interval.to_string(), ticker.to_string()))
            .or_default()
            .extend(rows);
    }

    pub fn requests(&self) -> Vec<FeedRequest> {
        self.requests.lock().clone()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }
}

#[async_trait]
impl MarketFeed for ScriptedFeed {
    fn id(&self) -> &'static str {
        "scripted"
    }

    async fn fetch(&self, request: &FeedRequest) -> Result<FeedFrame> {
        self.requests.lock().push(request.clone());

        if self.fail_multi && request.tickers.len() > 1 {
            return Err(AppError::Feed("batch rejected".to_string()));
        }
        if let Some(bad) = request.tickers.iter().find(|t| self.broken.contains(*t)) {
            return Err(AppError::Feed(format!("{}: not found", bad)));
        }

        let rows = self.rows.lock();
        let mut frame = FeedFrame::default();
        for ticker in &request.tickers {
            if let Some(series) = rows.get(&(request.interval.clone(), ticker.clone())) {
                frame.rows.extend(
                    series
                        .iter()
                        .filter(|r| r.timestamp.date_naive() >= request.start)
                        .cloned(),
                );
            }
        }
        Ok(frame)
    }
}

/// Sink that keeps every delivered message
#[derive(Default)]
pub struct RecordingSink {
    pub fail: bool,
    messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn deliver(&self, message: &str) -> Result<()> {
        if self.fail {
            return Err(AppError::Notify("sink offline".to_string()));
        }
        self.messages.lock().push(message.to_string());
        Ok(())
    }
}

/// Settings for tests: no key ETFs, daily broad tier, hourly detailed tier.
pub fn test_settings(tickers: &[&str]) -> Settings {
    let mut settings = Settings::default();
    settings.universe.tickers = tickers.iter().map(|t| t.to_string()).collect();
    settings.universe.include_key_etfs = false;
    settings.data.broad_timeframes = vec!["1d".to_string()];
    settings.data.detailed_timeframes = vec!["1h".to_string()];
    settings.screener.strategies = vec!["BUY_TREND".to_string(), "SELL_STRENGTH".to_string()];
    settings
}

pub fn state_with(settings: Settings, feed: Arc<ScriptedFeed>, sink: Arc<RecordingSink>) -> AppState {
    let duckdb = Arc::new(DuckDb::open_in_memory().expect("in-memory store"));
    AppState::with_parts(settings, duckdb, feed, sink)
}

/// Strictly rising, accelerating closes: RSI pinned at 100, ADX high,
/// positive MACD histogram.
pub fn rising(ticker: &str, n: usize, end: DateTime<Utc>, step: Duration) -> Vec<FeedRow> {
    (0..n)
        .map(|i| {
            let x = i as f64;
            let close = 100.0 + x + 0.01 * x * x;
            FeedRow {
                ticker: ticker.to_string(),
                timestamp: end - step * (n - 1 - i) as i32,
                open: Some(close - 0.5),
                high: Some(close + 0.5),
                low: Some(close - 1.0),
                close: Some(close),
                volume: Some(1_000_000.0),
            }
        })
        .collect()
}

/// Strictly falling closes.
pub fn falling(ticker: &str, n: usize, end: DateTime<Utc>, step: Duration) -> Vec<FeedRow> {
    (0..n)
        .map(|i| {
            let x = i as f64;
            let close = 600.0 - x - 0.005 * x * x;
            FeedRow {
                ticker: ticker.to_string(),
                timestamp: end - step * (n - 1 - i) as i32,
                open: Some(close + 0.5),
                high: Some(close + 1.0),
                low: Some(close - 0.5),
                close: Some(close),
                volume: Some(800_000.0),
            }
        })
        .collect()
}
