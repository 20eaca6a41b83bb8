//! DuckDB store for bars, indicators, the dynamic watchlist, alert history
//! and the portfolio ledger view.
//!
//! One connection guarded by a mutex; every write is a single short
//! transaction. Timestamps cross the boundary as `TS_FORMAT` strings.

pub mod models;
mod migrations;
mod bars;
mod indicators;
mod watchlist;
mod notifications;
mod ledger;

use crate::error::Result;
use crate::timeframe::Timeframe;
use chrono::{DateTime, Duration, Utc};
use duckdb::Connection;
use models::*;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// DuckDB database wrapper
pub struct DuckDb {
    conn: Mutex<Connection>,
}

impl DuckDb {
    /// Open (or create) the store file and run migrations
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an existing store file without write access. No migrations run,
    /// so the file must already carry the schema.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let config = duckdb::Config::default().access_mode(duckdb::AccessMode::ReadOnly)?;
        let conn = Connection::open_with_flags(path, config)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };

        db.run_migrations()?;

        Ok(db)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();
        migrations::run_migrations(&conn)
    }

    // ========== Bar Methods ==========

    /// Idempotent merge keyed by (ticker, timeframe, timestamp), last write wins
    pub fn upsert_bars(&self, timeframe: Timeframe, rows: &[Bar]) -> Result<usize> {
        let mut conn = self.conn.lock();
        bars::upsert_bars(&mut conn, timeframe, rows)
    }

    pub fn last_timestamp(&self, ticker: &str, timeframe: Timeframe) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn.lock();
        bars::last_timestamp(&conn, ticker, timeframe)
    }

    /// Last stored timestamp for every ticker of a timeframe, in one query
    pub fn last_timestamps(&self, timeframe: Timeframe) -> Result<HashMap<String, DateTime<Utc>>> {
        let conn = self.conn.lock();
        bars::last_timestamps(&conn, timeframe)
    }

    /// Bars in ascending order; with a limit, the most recent `limit` bars
    pub fn get_bars(&self, ticker: &str, timeframe: Timeframe, limit: Option<usize>) -> Result<Vec<Bar>> {
        let conn = self.conn.lock();
        bars::get_bars(&conn, ticker, timeframe, limit)
    }

    pub fn get_bars_since(
        &self,
        ticker: &str,
        timeframe: Timeframe,
        since: DateTime<Utc>,
    ) -> Result<Vec<Bar>> {
        let conn = self.conn.lock();
        bars::get_bars_since(&conn, ticker, timeframe, since)
    }

    pub fn count_bars(&self, ticker: &str, timeframe: Timeframe) -> Result<i64> {
        let conn = self.conn.lock();
        bars::count_bars(&conn, ticker, timeframe)
    }

    // ========== Indicator Methods ==========

    pub fn upsert_indicators(&self, rows: &[IndicatorRow]) -> Result<usize> {
        let mut conn = self.conn.lock();
        indicators::upsert_indicators(&mut conn, rows)
    }

    /// Newest indicator timestamp per ticker on a timeframe
    pub fn last_indicator_timestamps(&self, timeframe: Timeframe) -> Result<HashMap<String, DateTime<Utc>>> {
        let conn = self.conn.lock();
        indicators::last_timestamps(&conn, timeframe)
    }

    pub fn get_indicators(&self, ticker: &str, timeframe: Timeframe) -> Result<Vec<IndicatorRow>> {
        let conn = self.conn.lock();
        indicators::get_indicators(&conn, ticker, timeframe)
    }

    /// Most recent bar ⨝ indicator row per ticker
    pub fn latest_snapshots(&self, timeframe: Timeframe) -> Result<Vec<Snapshot>> {
        let conn = self.conn.lock();
        indicators::snapshots(&conn, timeframe, true)
    }

    /// Every bar ⨝ indicator row of the timeframe
    pub fn all_snapshots(&self, timeframe: Timeframe) -> Result<Vec<Snapshot>> {
        let conn = self.conn.lock();
        indicators::snapshots(&conn, timeframe, false)
    }

    // ========== Watchlist Methods ==========

    /// Insert, or union the reason and extend expiry to the later of old and new
    pub fn upsert_watchlist(
        &self,
        ticker: &str,
        reason: &str,
        now: DateTime<Utc>,
        retention: Duration,
    ) -> Result<WatchlistEntry> {
        let mut conn = self.conn.lock();
        watchlist::upsert_entry(&mut conn, ticker, reason, now, retention)
    }

    pub fn active_watchlist(&self, now: DateTime<Utc>) -> Result<Vec<WatchlistEntry>> {
        let conn = self.conn.lock();
        watchlist::active_entries(&conn, now)
    }

    pub fn purge_expired_watchlist(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock();
        watchlist::purge_expired(&conn, now)
    }

    // ========== Notification Methods ==========

    pub fn record_notification(&self, record: &NotificationRecord) -> Result<()> {
        let conn = self.conn.lock();
        notifications::insert(&conn, record)
    }

    pub fn count_notifications_since(
        &self,
        ticker: &str,
        strategy: &str,
        timeframe: Timeframe,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self.conn.lock();
        notifications::count_since(&conn, ticker, strategy, timeframe, since)
    }

    // ========== Ledger Methods ==========

    pub fn record_transaction(&self, txn: &Transaction) -> Result<()> {
        let conn = self.conn.lock();
        ledger::insert_transaction(&conn, txn)
    }

    /// Tickers with positive net quantity in `view_portfolio_holdings`
    pub fn held_tickers(&self) -> Result<BTreeSet<String>> {
        let conn = self.conn.lock();
        ledger::held_tickers(&conn)
    }

    pub fn upsert_metadata(&self, meta: &TickerMetadata) -> Result<()> {
        let conn = self.conn.lock();
        ledger::upsert_metadata(&conn, meta)
    }

    pub fn get_metadata(&self, ticker: &str) -> Result<Option<TickerMetadata>> {
        let conn = self.conn.lock();
        ledger::get_metadata(&conn, ticker)
    }
}
