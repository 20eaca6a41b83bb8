//! Maintenance runs over every configured timeframe.
//!
//! `recalc` rewrites all indicator rows from stored bars. `repair` refetches
//! the full window from the feed first, then recalculates.

use super::{refresh, ScanReport};
use crate::error::Result;
use crate::services::{AnalyzerService, SyncMode, UniverseService};
use crate::state::AppState;
use crate::timeframe::Timeframe;
use chrono::{DateTime, Utc};
use tracing::{error, info};

/// Every configured timeframe, broad first, without duplicates.
fn timeframes(state: &AppState) -> Result<Vec<Timeframe>> {
    let mut out = state.settings.broad_timeframes()?;
    for tf in state.settings.detailed_timeframes()? {
        if !out.contains(&tf) {
            out.push(tf);
        }
    }
    Ok(out)
}

fn tickers(state: &AppState, now: DateTime<Utc>) -> Result<Vec<String>> {
    let mut all = UniverseService::broad(state)?;
    all.extend(UniverseService::detailed(state, now)?);
    Ok(all.into_iter().collect())
}

/// Recompute and rewrite every indicator row
pub fn recalc(state: &AppState, now: DateTime<Utc>) -> Result<ScanReport> {
    let tickers = tickers(state, now)?;
    let mut report = ScanReport {
        universe: tickers.len(),
        ..Default::default()
    };

    for timeframe in timeframes(state)? {
        info!("Recalc {} for {} tickers", timeframe, tickers.len());
        match AnalyzerService::analyze(state, &tickers, timeframe, true) {
            Ok(analysis) => report.analyses.push(analysis),
            Err(e) => {
                error!("Recalc {} aborted: {}", timeframe, e);
                report.failed_timeframes.push((timeframe, e.into()));
            }
        }
    }
    Ok(report)
}

/// Refetch the full window for every ticker, then recalculate
pub async fn repair(state: &AppState, now: DateTime<Utc>) -> Result<ScanReport> {
    let tickers = tickers(state, now)?;
    let mut report = ScanReport {
        universe: tickers.len(),
        ..Default::default()
    };

    for timeframe in timeframes(state)? {
        info!("Repair {} for {} tickers", timeframe, tickers.len());
        match refresh(state, &tickers, timeframe, SyncMode::Full, true, now).await {
            Ok((sync, analysis)) => {
                report.syncs.push(sync);
                report.analyses.push(analysis);
            }
            Err(e) => {
                error!("Repair {} aborted: {}", timeframe, e);
                report.failed_timeframes.push((timeframe, e.into()));
            }
        }
    }
    Ok(report)
}
