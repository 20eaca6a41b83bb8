//! Watchlist Service
//!
//! Expiring registry of tickers flagged by the broad scan. The detailed
//! scan watches these until their entries lapse.

use crate::db::duckdb::models::WatchlistEntry;
use crate::error::Result;
use crate::services::screener_service::StrategyMatch;
use crate::state::AppState;
use chrono::{DateTime, Duration, Utc};
use tracing::info;

/// Watchlist service
pub struct WatchlistService;

impl WatchlistService {
    /// Insert or extend an entry for every match.
    ///
    /// A ticker matched by several strategies keeps one row whose reasons
    /// hold every strategy code.
    pub fn promote(
        state: &AppState,
        matches: &[StrategyMatch],
        now: DateTime<Utc>,
    ) -> Result<Vec<WatchlistEntry>> {
        let retention = Duration::days(state.settings.watchlist.retention_days);

        let mut entries = Vec::with_capacity(matches.len());
        for m in matches {
            entries.push(
                state
                    .duckdb
                    .upsert_watchlist(&m.ticker, m.strategy.code(), now, retention)?,
            );
        }

        info!("WatchlistService::promote - {} matches upserted", entries.len());
        Ok(entries)
    }

    /// Entries not yet expired at `now`
    pub fn active(state: &AppState, now: DateTime<Utc>) -> Result<Vec<WatchlistEntry>> {
        state.duckdb.active_watchlist(now)
    }

    /// Drop every entry whose expiry has passed
    pub fn purge(state: &AppState, now: DateTime<Utc>) -> Result<usize> {
        let removed = state.duckdb.purge_expired_watchlist(now)?;
        if removed > 0 {
            info!("WatchlistService::purge - {} expired entries removed", removed);
        }
        Ok(removed)
    }
}
