//! Bar timeframes

use crate::error::AppError;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sampling granularity of a bar series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1d")]
    Daily,
    #[serde(rename = "1h")]
    Hourly,
    /// Resampled locally from hourly bars, never fetched.
    #[serde(rename = "2h")]
    TwoHour,
    #[serde(rename = "15m")]
    FifteenMin,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [
        Timeframe::Daily,
        Timeframe::Hourly,
        Timeframe::TwoHour,
        Timeframe::FifteenMin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Daily => "1d",
            Timeframe::Hourly => "1h",
            Timeframe::TwoHour => "2h",
            Timeframe::FifteenMin => "15m",
        }
    }

    pub fn is_daily(&self) -> bool {
        matches!(self, Timeframe::Daily)
    }

    /// Timeframe this one is resampled from, if it is derived.
    pub fn source(&self) -> Option<Timeframe> {
        match self {
            Timeframe::TwoHour => Some(Timeframe::Hourly),
            _ => None,
        }
    }

    /// Interval string understood by the upstream feed.
    pub fn feed_interval(&self) -> Option<&'static str> {
        match self {
            Timeframe::Daily => Some("1d"),
            Timeframe::Hourly => Some("60m"),
            Timeframe::FifteenMin => Some("15m"),
            Timeframe::TwoHour => None,
        }
    }

    /// Maximum history the feed serves for intraday granularities.
    pub fn max_lookback(&self) -> Option<Duration> {
        match self {
            Timeframe::Daily => None,
            Timeframe::Hourly | Timeframe::TwoHour => Some(Duration::days(720)),
            Timeframe::FifteenMin => Some(Duration::days(59)),
        }
    }

    /// Start date for a ticker with no stored bars.
    pub fn full_history_start(&self, now: DateTime<Utc>, daily_start: NaiveDate) -> NaiveDate {
        match self.max_lookback() {
            Some(lookback) => (now - lookback).date_naive(),
            None => daily_start,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1d" => Ok(Timeframe::Daily),
            "1h" | "60m" => Ok(Timeframe::Hourly),
            "2h" => Ok(Timeframe::TwoHour),
            "15m" => Ok(Timeframe::FifteenMin),
            other => Err(AppError::Validation(format!("Unknown timeframe: {}", other))),
        }
    }
}
