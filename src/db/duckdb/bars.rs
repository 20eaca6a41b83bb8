//! Bar table access

use super::models::{fmt_ts, parse_ts, Bar};
use crate::error::Result;
use crate::timeframe::Timeframe;
use chrono::{DateTime, Utc};
use duckdb::{params, Connection};
use std::collections::{BTreeMap, HashMap};

const SELECT_COLUMNS: &str =
    "ticker, strftime(timestamp, '%Y-%m-%d %H:%M:%S.%f'), open, high, low, close, volume";

struct RawBar {
    ticker: String,
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: i64,
}

impl RawBar {
    fn from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            ticker: row.get(0)?,
            timestamp: row.get(1)?,
            open: row.get(2)?,
            high: row.get(3)?,
            low: row.get(4)?,
            close: row.get(5)?,
            volume: row.get(6)?,
        })
    }

    fn into_bar(self) -> Result<Bar> {
        Ok(Bar {
            timestamp: parse_ts(&self.timestamp)?,
            ticker: self.ticker,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        })
    }
}

pub fn upsert_bars(conn: &mut Connection, timeframe: Timeframe, rows: &[Bar]) -> Result<usize> {
    if rows.is_empty() {
        return Ok(0);
    }

    // Collapse duplicate keys inside the batch, last occurrence wins
    let mut unique: BTreeMap<(&str, DateTime<Utc>), &Bar> = BTreeMap::new();
    for row in rows {
        unique.insert((row.ticker.as_str(), row.timestamp), row);
    }

    let tx = conn.transaction()?;

    let mut stmt = tx.prepare(
        "INSERT INTO bars (ticker, timeframe, timestamp, open, high, low, close, volume)
         VALUES (?, ?, CAST(? AS TIMESTAMP), ?, ?, ?, ?, ?)
         ON CONFLICT (ticker, timeframe, timestamp) DO UPDATE SET
           open = excluded.open, high = excluded.high, low = excluded.low,
           close = excluded.close, volume = excluded.volume",
    )?;

    let mut count = 0;
    for row in unique.values() {
        stmt.execute(params![
            row.ticker,
            timeframe.as_str(),
            fmt_ts(&row.timestamp),
            row.open,
            row.high,
            row.low,
            row.close,
            row.volume,
        ])?;
        count += 1;
    }

    drop(stmt);
    tx.commit()?;

    Ok(count)
}

pub fn last_timestamp(
    conn: &Connection,
    ticker: &str,
    timeframe: Timeframe,
) -> Result<Option<DateTime<Utc>>> {
    let last: Option<String> = conn.query_row(
        "SELECT strftime(MAX(timestamp), '%Y-%m-%d %H:%M:%S.%f')
         FROM bars WHERE ticker = ? AND timeframe = ?",
        params![ticker, timeframe.as_str()],
        |row| row.get(0),
    )?;

    last.as_deref().map(parse_ts).transpose()
}

pub fn last_timestamps(
    conn: &Connection,
    timeframe: Timeframe,
) -> Result<HashMap<String, DateTime<Utc>>> {
    let mut stmt = conn.prepare(
        "SELECT ticker, strftime(MAX(timestamp), '%Y-%m-%d %H:%M:%S.%f')
         FROM bars WHERE timeframe = ?
         GROUP BY ticker",
    )?;

    let rows = stmt
        .query_map([timeframe.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut out = HashMap::with_capacity(rows.len());
    for (ticker, ts) in rows {
        out.insert(ticker, parse_ts(&ts)?);
    }
    Ok(out)
}

pub fn get_bars(
    conn: &Connection,
    ticker: &str,
    timeframe: Timeframe,
    limit: Option<usize>,
) -> Result<Vec<Bar>> {
    let raw = match limit {
        Some(limit) => {
            let sql = format!(
                "SELECT * FROM (
                    SELECT {SELECT_COLUMNS}, timestamp AS ts_order
                    FROM bars WHERE ticker = ? AND timeframe = ?
                    ORDER BY timestamp DESC LIMIT ?
                 ) ORDER BY ts_order ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    params![ticker, timeframe.as_str(), limit as i64],
                    RawBar::from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM bars
                 WHERE ticker = ? AND timeframe = ?
                 ORDER BY timestamp ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![ticker, timeframe.as_str()], RawBar::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        }
    };

    raw.into_iter().map(RawBar::into_bar).collect()
}

pub fn get_bars_since(
    conn: &Connection,
    ticker: &str,
    timeframe: Timeframe,
    since: DateTime<Utc>,
) -> Result<Vec<Bar>> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM bars
         WHERE ticker = ? AND timeframe = ? AND timestamp >= CAST(? AS TIMESTAMP)
         ORDER BY timestamp ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let raw = stmt
        .query_map(
            params![ticker, timeframe.as_str(), fmt_ts(&since)],
            RawBar::from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    raw.into_iter().map(RawBar::into_bar).collect()
}

pub fn count_bars(conn: &Connection, ticker: &str, timeframe: Timeframe) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bars WHERE ticker = ? AND timeframe = ?",
        params![ticker, timeframe.as_str()],
        |row| row.get(0),
    )?;
    Ok(count)
}
