//! Delivered alert history

use super::models::{fmt_ts, NotificationRecord};
use crate::error::Result;
use crate::timeframe::Timeframe;
use chrono::{DateTime, Utc};
use duckdb::{params, Connection};

pub fn insert(conn: &Connection, record: &NotificationRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO notifications (ticker, strategy, timeframe, sent_at, price)
         VALUES (?, ?, ?, CAST(? AS TIMESTAMP), ?)",
        params![
            record.ticker,
            record.strategy,
            record.timeframe.as_str(),
            fmt_ts(&record.sent_at),
            record.price,
        ],
    )?;
    Ok(())
}

/// Alerts for the (ticker, strategy, timeframe) triple sent after `since`
pub fn count_since(
    conn: &Connection,
    ticker: &str,
    strategy: &str,
    timeframe: Timeframe,
    since: DateTime<Utc>,
) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM notifications
         WHERE ticker = ? AND strategy = ? AND timeframe = ?
           AND sent_at > CAST(? AS TIMESTAMP)",
        params![ticker, strategy, timeframe.as_str(), fmt_ts(&since)],
        |row| row.get(0),
    )?;
    Ok(count)
}
