//! Universe Service
//!
//! Builds the ticker sets each scan tier works on.

use crate::error::Result;
use crate::state::AppState;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tracing::info;

/// Benchmark indices and liquid ETFs always scanned by the broad tier.
pub const KEY_ETFS: &[&str] = &[
    "^GSPC", "^NDX", "^MXX", "^VIX", "SPY", "QQQ", "IWM", "DIA", "SOXX", "SMH", "XLK", "XLF",
    "XLE", "XLV", "TQQQ", "SQQQ", "SOXL", "SOXS", "TLT", "UVXY", "BITO", "ARKK",
];

/// Universe service
pub struct UniverseService;

impl UniverseService {
    /// Tickers held now: the ledger view unioned with configured holdings.
    pub fn holdings(state: &AppState) -> Result<BTreeSet<String>> {
        let mut held = state.duckdb.held_tickers()?;
        held.extend(normalize(&state.settings.portfolio.holdings));
        Ok(held)
    }

    /// Broad universe: configured tickers, key ETFs, pinned tickers and holdings.
    pub fn broad(state: &AppState) -> Result<BTreeSet<String>> {
        let universe = &state.settings.universe;
        let mut out = normalize(&universe.tickers);
        if universe.include_key_etfs {
            out.extend(KEY_ETFS.iter().map(|t| t.to_string()));
        }
        out.extend(normalize(&universe.pinned));
        out.extend(Self::holdings(state)?);

        info!("UniverseService::broad - {} tickers", out.len());
        Ok(out)
    }

    /// Detailed universe: holdings, pinned tickers and the active watchlist.
    pub fn detailed(state: &AppState, now: DateTime<Utc>) -> Result<BTreeSet<String>> {
        let mut out = Self::holdings(state)?;
        out.extend(normalize(&state.settings.universe.pinned));
        out.extend(
            state
                .duckdb
                .active_watchlist(now)?
                .into_iter()
                .map(|e| e.ticker),
        );

        info!("UniverseService::detailed - {} tickers", out.len());
        Ok(out)
    }
}

fn normalize(tickers: &[String]) -> BTreeSet<String> {
    tickers
        .iter()
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .collect()
}
