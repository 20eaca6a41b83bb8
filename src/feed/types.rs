//! Feed request and response shapes

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One multi-ticker request for a single interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedRequest {
    pub tickers: Vec<String>,
    /// Feed interval string, e.g. "1d", "60m", "15m"
    pub interval: String,
    /// First calendar day requested (inclusive)
    pub start: NaiveDate,
}

/// Loose row as returned upstream: any field may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedRow {
    pub ticker: String,
    pub timestamp: DateTime<Utc>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

/// Unordered response table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedFrame {
    pub rows: Vec<FeedRow>,
}

impl FeedFrame {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
