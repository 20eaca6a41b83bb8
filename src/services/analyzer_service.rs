//! Analyzer Service
//!
//! Recomputes indicator rows from stored bars and persists them.
//! Phase run-lengths depend on the whole history, so every ticker is
//! recomputed from its first bar; only the write is limited.

use crate::error::{AppError, Result};
use crate::indicators;
use crate::state::AppState;
use crate::timeframe::Timeframe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Outcome of one timeframe analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeReport {
    pub timeframe: Timeframe,
    pub analyzed: usize,
    pub rows_written: usize,
    pub failed: Vec<String>,
}

/// Analyzer service for indicator refresh
pub struct AnalyzerService;

impl AnalyzerService {
    /// Analyze every ticker on one timeframe.
    ///
    /// With `force_full` every row is rewritten. Otherwise the write covers
    /// every bar newer than the ticker's last stored indicator row, and never
    /// less than the most recent `analyzer.persist_tail` rows.
    pub fn analyze(
        state: &AppState,
        tickers: &[String],
        timeframe: Timeframe,
        force_full: bool,
    ) -> Result<AnalyzeReport> {
        Self::analyze_touched(state, tickers, timeframe, force_full, &BTreeMap::new())
    }

    /// Like [`analyze`](Self::analyze), also rewriting every row from the
    /// earliest bar a sync just wrote for each ticker in `touched`.
    pub fn analyze_touched(
        state: &AppState,
        tickers: &[String],
        timeframe: Timeframe,
        force_full: bool,
        touched: &BTreeMap<String, DateTime<Utc>>,
    ) -> Result<AnalyzeReport> {
        info!(
            "AnalyzerService::analyze - {} tickers on {} (force_full={})",
            tickers.len(),
            timeframe,
            force_full
        );

        let stored = state.duckdb.last_indicator_timestamps(timeframe)?;

        let mut report = AnalyzeReport {
            timeframe,
            analyzed: 0,
            rows_written: 0,
            failed: Vec::new(),
        };

        for ticker in tickers {
            let window = if force_full {
                WriteWindow::Full
            } else {
                WriteWindow::Since {
                    touched: touched.get(ticker).copied(),
                    last_written: stored.get(ticker).copied(),
                }
            };

            match Self::analyze_ticker(state, ticker, timeframe, window) {
                Ok(written) => {
                    report.analyzed += 1;
                    report.rows_written += written;
                }
                Err(e @ AppError::DuckDb(_)) => return Err(e),
                Err(e) => {
                    warn!("   {} {}: analysis failed: {}", ticker, timeframe, e);
                    report.failed.push(ticker.clone());
                }
            }
        }

        info!(
            "AnalyzerService::analyze - {} done: {} tickers, {} rows, {} failed",
            timeframe,
            report.analyzed,
            report.rows_written,
            report.failed.len()
        );
        Ok(report)
    }

    /// Recompute one ticker and persist its rows; returns rows written.
    pub fn analyze_ticker(
        state: &AppState,
        ticker: &str,
        timeframe: Timeframe,
        window: WriteWindow,
    ) -> Result<usize> {
        let bars = state.duckdb.get_bars(ticker, timeframe, None)?;
        if bars.is_empty() {
            debug!("   {} {}: no bars", ticker, timeframe);
            return Ok(0);
        }

        let rows = indicators::compute_rows(ticker, timeframe, &bars, &state.settings.indicators)?;
        let timestamps: Vec<DateTime<Utc>> = rows.iter().map(|r| r.timestamp).collect();
        let first = window.first_index(&timestamps, state.settings.analyzer.persist_tail);

        state.duckdb.upsert_indicators(&rows[first..])
    }
}

/// Which computed rows of a ticker get written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteWindow {
    Full,
    Since {
        /// Earliest bar the last sync wrote
        touched: Option<DateTime<Utc>>,
        /// Newest indicator row already stored
        last_written: Option<DateTime<Utc>>,
    },
}

impl WriteWindow {
    /// Index of the first row to write in an ascending timestamp list
    pub fn first_index(&self, timestamps: &[DateTime<Utc>], tail: usize) -> usize {
        let n = timestamps.len();
        match *self {
            WriteWindow::Full => 0,
            WriteWindow::Since { touched, last_written } => {
                // Nothing stored yet: the whole history is new
                let Some(last) = last_written else {
                    return 0;
                };
                let after_last = timestamps.partition_point(|ts| *ts <= last);
                let from_touched = touched.map_or(n, |t| timestamps.partition_point(|ts| *ts < t));
                after_last.min(from_touched).min(n.saturating_sub(tail))
            }
        }
    }
}
