//! Broad scan: sync, analyze and screen the whole universe on the broad
//! timeframes, and promote every match to the dynamic watchlist.

use super::{refresh, ScanReport};
use crate::error::Result;
use crate::services::{
    ScreenScope, ScreenerService, Strategy, SyncMode, UniverseService, WatchlistService,
};
use crate::state::AppState;
use crate::timeframe::Timeframe;
use chrono::{DateTime, Utc};
use tracing::{error, info};

pub async fn run(state: &AppState, now: DateTime<Utc>) -> Result<ScanReport> {
    info!("Broad scan starting");

    let mut report = ScanReport {
        purged: WatchlistService::purge(state, now)?,
        ..Default::default()
    };

    let universe: Vec<String> = UniverseService::broad(state)?.into_iter().collect();
    report.universe = universe.len();
    let strategies = ScreenerService::enabled_strategies(state)?;

    for timeframe in state.settings.broad_timeframes()? {
        if let Err(e) = scan_timeframe(state, &universe, timeframe, &strategies, now, &mut report).await {
            error!("Broad scan {} aborted: {}", timeframe, e);
            report.failed_timeframes.push((timeframe, e.into()));
        }
    }

    info!(
        "Broad scan finished: {} tickers, {} matches, {} promoted, {} purged",
        report.universe, report.matches, report.promoted, report.purged
    );
    Ok(report)
}

async fn scan_timeframe(
    state: &AppState,
    universe: &[String],
    timeframe: Timeframe,
    strategies: &[Strategy],
    now: DateTime<Utc>,
    report: &mut ScanReport,
) -> Result<()> {
    let (sync, analysis) = refresh(state, universe, timeframe, SyncMode::Incremental, false, now).await?;
    report.syncs.push(sync);
    report.analyses.push(analysis);

    let matches = ScreenerService::screen(state, timeframe, strategies, None, ScreenScope::Latest)?;
    report.matches += matches.len();
    report.promoted += WatchlistService::promote(state, &matches, now)?.len();
    Ok(())
}
