//! DuckDB data models

use crate::error::{AppError, Result};
use crate::indicators::{Bias, Phase, Signal};
use crate::timeframe::Timeframe;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Timestamp layout bound into DuckDB, microsecond precision like `TIMESTAMP`.
/// Reads come back through `strftime(.., '%Y-%m-%d %H:%M:%S.%f')`.
pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Accepts an optional fractional part.
const TS_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

pub fn parse_ts(value: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, TS_PARSE_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| AppError::Internal(format!("Bad timestamp '{}': {}", value, e)))
}

/// OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub ticker: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// Indicator values for one bar, keyed like [`Bar`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRow {
    pub ticker: String,
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,

    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_hist: Option<f64>,
    pub macd_slope3: Option<f64>,
    pub ema_short: Option<f64>,
    pub ema_long: Option<f64>,
    pub ma_short: Option<f64>,
    pub ma_long: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    pub bb_bandwidth: Option<f64>,
    pub bb_percent: Option<f64>,
    pub adx: Option<f64>,
    pub di_plus: Option<f64>,
    pub di_minus: Option<f64>,
    pub donchian_high: Option<f64>,
    pub donchian_low: Option<f64>,
    pub donchian_mid: Option<f64>,
    pub donchian_long_high: Option<f64>,
    pub donchian_long_low: Option<f64>,
    pub vol_sma: Option<f64>,
    pub vol_ema: Option<f64>,
    pub obv: Option<f64>,
    pub cmf: Option<f64>,
    pub mfi: Option<f64>,
    pub gap_pct: Option<f64>,
    pub chg_pct: Option<f64>,
    pub vol_k: Option<f64>,
    pub phase_slope: Option<f64>,
    pub strength_pct: Option<f64>,

    pub bias: Bias,
    pub signal: Option<Signal>,
    pub phase: Phase,
    pub previous_phase: Option<Phase>,
    pub days_in_phase: i64,
    pub phase_change: bool,
    pub bullish_entry: bool,
}

impl IndicatorRow {
    pub const NUMERIC_COLUMNS: [&'static str; 32] = [
        "rsi",
        "macd",
        "macd_signal",
        "macd_hist",
        "macd_slope3",
        "ema_short",
        "ema_long",
        "ma_short",
        "ma_long",
        "bb_upper",
        "bb_middle",
        "bb_lower",
        "bb_bandwidth",
        "bb_percent",
        "adx",
        "di_plus",
        "di_minus",
        "donchian_high",
        "donchian_low",
        "donchian_mid",
        "donchian_long_high",
        "donchian_long_low",
        "vol_sma",
        "vol_ema",
        "obv",
        "cmf",
        "mfi",
        "gap_pct",
        "chg_pct",
        "vol_k",
        "phase_slope",
        "strength_pct",
    ];

    pub const LABEL_COLUMNS: [&'static str; 7] = [
        "bias",
        "signal",
        "phase",
        "previous_phase",
        "days_in_phase",
        "phase_change",
        "bullish_entry",
    ];

    /// Numeric values in `NUMERIC_COLUMNS` order.
    pub fn numeric_values(&self) -> [Option<f64>; 32] {
        [
            self.rsi,
            self.macd,
            self.macd_signal,
            self.macd_hist,
            self.macd_slope3,
            self.ema_short,
            self.ema_long,
            self.ma_short,
            self.ma_long,
            self.bb_upper,
            self.bb_middle,
            self.bb_lower,
            self.bb_bandwidth,
            self.bb_percent,
            self.adx,
            self.di_plus,
            self.di_minus,
            self.donchian_high,
            self.donchian_low,
            self.donchian_mid,
            self.donchian_long_high,
            self.donchian_long_low,
            self.vol_sma,
            self.vol_ema,
            self.obv,
            self.cmf,
            self.mfi,
            self.gap_pct,
            self.chg_pct,
            self.vol_k,
            self.phase_slope,
            self.strength_pct,
        ]
    }

    /// Rebuild a row from values read in `NUMERIC_COLUMNS` order.
    pub fn from_parts(
        ticker: String,
        timeframe: Timeframe,
        timestamp: DateTime<Utc>,
        v: [Option<f64>; 32],
        labels: IndicatorLabels,
    ) -> Self {
        Self {
            ticker,
            timeframe,
            timestamp,
            rsi: v[0],
            macd: v[1],
            macd_signal: v[2],
            macd_hist: v[3],
            macd_slope3: v[4],
            ema_short: v[5],
            ema_long: v[6],
            ma_short: v[7],
            ma_long: v[8],
            bb_upper: v[9],
            bb_middle: v[10],
            bb_lower: v[11],
            bb_bandwidth: v[12],
            bb_percent: v[13],
            adx: v[14],
            di_plus: v[15],
            di_minus: v[16],
            donchian_high: v[17],
            donchian_low: v[18],
            donchian_mid: v[19],
            donchian_long_high: v[20],
            donchian_long_low: v[21],
            vol_sma: v[22],
            vol_ema: v[23],
            obv: v[24],
            cmf: v[25],
            mfi: v[26],
            gap_pct: v[27],
            chg_pct: v[28],
            vol_k: v[29],
            phase_slope: v[30],
            strength_pct: v[31],
            bias: labels.bias,
            signal: labels.signal,
            phase: labels.phase,
            previous_phase: labels.previous_phase,
            days_in_phase: labels.days_in_phase,
            phase_change: labels.phase_change,
            bullish_entry: labels.bullish_entry,
        }
    }
}

/// Categorical part of an [`IndicatorRow`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorLabels {
    pub bias: Bias,
    pub signal: Option<Signal>,
    pub phase: Phase,
    pub previous_phase: Option<Phase>,
    pub days_in_phase: i64,
    pub phase_change: bool,
    pub bullish_entry: bool,
}

/// Latest bar joined with its indicator row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub bar: Bar,
    pub indicators: IndicatorRow,
}

impl Snapshot {
    pub fn ticker(&self) -> &str {
        &self.bar.ticker
    }

    pub fn close(&self) -> f64 {
        self.bar.close
    }
}

/// Dynamic watchlist entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub ticker: String,
    pub reasons: BTreeSet<String>,
    pub added_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl WatchlistEntry {
    pub fn reasons_text(&self) -> String {
        self.reasons.iter().cloned().collect::<Vec<_>>().join(", ")
    }

    pub fn parse_reasons(text: &str) -> BTreeSet<String> {
        text.split(',')
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .map(|r| r.to_string())
            .collect()
    }
}

/// Delivered alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub ticker: String,
    pub strategy: String,
    pub timeframe: Timeframe,
    pub sent_at: DateTime<Utc>,
    pub price: f64,
}

/// Ledger transaction side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

/// Ledger transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub ticker: String,
    pub side: Side,
    pub qty: f64,
    pub price: f64,
    pub executed_at: DateTime<Utc>,
}

/// Ticker metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerMetadata {
    pub ticker: String,
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_format_round_trip() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 17, 13, 30, 0).unwrap();
        assert_eq!(fmt_ts(&ts), "2024-05-17 13:30:00.000000");
        assert_eq!(parse_ts("2024-05-17 13:30:00.000000").unwrap(), ts);
        assert_eq!(parse_ts("2024-05-17 13:30:00").unwrap(), ts);

        let precise = ts + chrono::Duration::microseconds(250);
        assert_eq!(parse_ts(&fmt_ts(&precise)).unwrap(), precise);
        assert!(parse_ts("17/05/2024").is_err());
    }

    #[test]
    fn test_reasons_text() {
        let reasons = WatchlistEntry::parse_reasons("BUY_TREND, BUY_BOUNCE,,");
        assert_eq!(reasons.len(), 2);
        let entry = WatchlistEntry {
            ticker: "AAPL".to_string(),
            reasons,
            added_at: Utc::now(),
            expires_at: Utc::now(),
        };
        assert_eq!(entry.reasons_text(), "BUY_BOUNCE, BUY_TREND");
    }
}
