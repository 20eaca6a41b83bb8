//! Dynamic watchlist access

use super::models::{fmt_ts, parse_ts, WatchlistEntry};
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use duckdb::{params, Connection, OptionalExt};

pub fn upsert_entry(
    conn: &mut Connection,
    ticker: &str,
    reason: &str,
    now: DateTime<Utc>,
    retention: Duration,
) -> Result<WatchlistEntry> {
    let tx = conn.transaction()?;

    let existing: Option<(String, String, String)> = tx
        .query_row(
            "SELECT reason,
                    strftime(added_at, '%Y-%m-%d %H:%M:%S.%f'),
                    strftime(expires_at, '%Y-%m-%d %H:%M:%S.%f')
             FROM watchlist WHERE ticker = ?",
            [ticker],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    let new_expiry = now + retention;
    let entry = match existing {
        Some((reasons, added_at, expires_at)) => {
            let mut reasons = WatchlistEntry::parse_reasons(&reasons);
            reasons.insert(reason.to_string());
            let old_expiry = parse_ts(&expires_at)?;
            WatchlistEntry {
                ticker: ticker.to_string(),
                reasons,
                added_at: parse_ts(&added_at)?,
                expires_at: old_expiry.max(new_expiry),
            }
        }
        None => WatchlistEntry {
            ticker: ticker.to_string(),
            reasons: WatchlistEntry::parse_reasons(reason),
            added_at: now,
            expires_at: new_expiry,
        },
    };

    tx.execute(
        "INSERT INTO watchlist (ticker, reason, added_at, expires_at)
         VALUES (?, ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))
         ON CONFLICT (ticker) DO UPDATE SET
           reason = excluded.reason, expires_at = excluded.expires_at",
        params![
            entry.ticker,
            entry.reasons_text(),
            fmt_ts(&entry.added_at),
            fmt_ts(&entry.expires_at),
        ],
    )?;

    tx.commit()?;
    Ok(entry)
}

/// Entries whose expiry has not passed at `now`
pub fn active_entries(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<WatchlistEntry>> {
    let mut stmt = conn.prepare(
        "SELECT ticker, reason,
                strftime(added_at, '%Y-%m-%d %H:%M:%S.%f'),
                strftime(expires_at, '%Y-%m-%d %H:%M:%S.%f')
         FROM watchlist
         WHERE expires_at >= CAST(? AS TIMESTAMP)
         ORDER BY ticker ASC",
    )?;

    let raw = stmt
        .query_map([fmt_ts(&now)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(ticker, reasons, added_at, expires_at)| {
            Ok(WatchlistEntry {
                ticker,
                reasons: WatchlistEntry::parse_reasons(&reasons),
                added_at: parse_ts(&added_at)?,
                expires_at: parse_ts(&expires_at)?,
            })
        })
        .collect()
}

pub fn purge_expired(conn: &Connection, now: DateTime<Utc>) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM watchlist WHERE expires_at < CAST(? AS TIMESTAMP)",
        [fmt_ts(&now)],
    )?;
    Ok(removed)
}
