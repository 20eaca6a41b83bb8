//! Scan jobs: the broad and detailed funnel tiers plus maintenance runs.
//!
//! Each job walks its timeframes in order. A store failure aborts only the
//! timeframe it happened on; the job records it and moves on.

pub mod broad_scan;
pub mod detailed_scan;
pub mod maintenance;

use crate::error::{ErrorResponse, Result};
use crate::services::{AnalyzeReport, AnalyzerService, CollectorService, SyncMode, SyncReport};
use crate::state::AppState;
use crate::timeframe::Timeframe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of one job run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReport {
    pub universe: usize,
    pub purged: usize,
    pub syncs: Vec<SyncReport>,
    pub analyses: Vec<AnalyzeReport>,
    pub matches: usize,
    pub promoted: usize,
    pub delivered: usize,
    pub suppressed: usize,
    pub failed_alerts: usize,
    /// Timeframes aborted by an error
    pub failed_timeframes: Vec<(Timeframe, ErrorResponse)>,
}

impl ScanReport {
    pub fn is_clean(&self) -> bool {
        self.failed_timeframes.is_empty()
    }
}

/// Sync then analyze one timeframe.
async fn refresh(
    state: &AppState,
    tickers: &[String],
    timeframe: Timeframe,
    mode: SyncMode,
    force_full: bool,
    now: DateTime<Utc>,
) -> Result<(SyncReport, AnalyzeReport)> {
    let sync = CollectorService::sync(state, tickers, timeframe, mode, now).await?;
    let analysis = AnalyzerService::analyze_touched(state, tickers, timeframe, force_full, &sync.touched)?;
    Ok((sync, analysis))
}
