//! Detailed scan: the narrow, frequent tier. Works only on holdings, pinned
//! tickers and the active watchlist, and is the only stage that alerts.

use super::{refresh, ScanReport};
use crate::error::Result;
use crate::services::{
    Alert, GateOutcome, NotificationService, ScreenScope, ScreenerService, Strategy, SyncMode,
    UniverseService,
};
use crate::state::AppState;
use crate::timeframe::Timeframe;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tracing::{error, info, warn};

pub async fn run(state: &AppState, now: DateTime<Utc>) -> Result<ScanReport> {
    info!("Detailed scan starting");

    let universe = UniverseService::detailed(state, now)?;
    let holdings = UniverseService::holdings(state)?;
    let mut report = ScanReport {
        universe: universe.len(),
        ..Default::default()
    };
    if universe.is_empty() {
        warn!("Detailed scan: empty universe, nothing to do");
        return Ok(report);
    }

    let tickers: Vec<String> = universe.iter().cloned().collect();
    let strategies = ScreenerService::enabled_strategies(state)?;

    for timeframe in state.settings.detailed_timeframes()? {
        let scope = Scope {
            universe: &universe,
            holdings: &holdings,
            strategies: &strategies,
        };
        if let Err(e) = scan_timeframe(state, &tickers, timeframe, &scope, now, &mut report).await {
            error!("Detailed scan {} aborted: {}", timeframe, e);
            report.failed_timeframes.push((timeframe, e.into()));
        }
    }

    info!(
        "Detailed scan finished: {} tickers, {} matches, {} delivered, {} suppressed, {} failed",
        report.universe, report.matches, report.delivered, report.suppressed, report.failed_alerts
    );
    Ok(report)
}

struct Scope<'a> {
    universe: &'a BTreeSet<String>,
    holdings: &'a BTreeSet<String>,
    strategies: &'a [Strategy],
}

async fn scan_timeframe(
    state: &AppState,
    tickers: &[String],
    timeframe: Timeframe,
    scope: &Scope<'_>,
    now: DateTime<Utc>,
    report: &mut ScanReport,
) -> Result<()> {
    let (sync, analysis) = refresh(state, tickers, timeframe, SyncMode::Incremental, false, now).await?;
    report.syncs.push(sync);
    report.analyses.push(analysis);

    let matches = ScreenerService::screen(
        state,
        timeframe,
        scope.strategies,
        Some(scope.universe),
        ScreenScope::Latest,
    )?;
    report.matches += matches.len();

    for m in matches {
        let name = state
            .duckdb
            .get_metadata(&m.ticker)?
            .and_then(|meta| meta.name)
            .unwrap_or_else(|| m.ticker.clone());
        let note = if scope.holdings.contains(&m.ticker) {
            format!("Holding position: {}", name)
        } else {
            format!("Watchlist candidate: {}", name)
        };

        let alert = Alert {
            ticker: m.ticker,
            strategy: m.strategy,
            timeframe,
            price: m.close,
            note: Some(note),
        };
        match NotificationService::notify(state, &alert, scope.holdings, now).await? {
            GateOutcome::Delivered => report.delivered += 1,
            GateOutcome::Cooldown | GateOutcome::NotHeld => report.suppressed += 1,
            GateOutcome::Failed => report.failed_alerts += 1,
        }
    }
    Ok(())
}
