//! Indicator table access and bar ⨝ indicator snapshots

use super::models::{fmt_ts, parse_ts, Bar, IndicatorLabels, IndicatorRow, Snapshot};
use crate::error::Result;
use crate::indicators::{Bias, Phase, Signal};
use crate::timeframe::Timeframe;
use chrono::{DateTime, Utc};
use duckdb::{params, params_from_iter, Connection, ToSql};
use std::collections::HashMap;

const NUMERIC_COUNT: usize = 32;

fn insert_sql() -> String {
    let numeric = IndicatorRow::NUMERIC_COLUMNS;
    let labels = IndicatorRow::LABEL_COLUMNS;

    let columns = numeric.iter().chain(labels.iter()).copied().collect::<Vec<_>>();
    let placeholders = vec!["?"; columns.len()].join(", ");
    let updates = columns
        .iter()
        .map(|c| format!("{c} = excluded.{c}"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO indicators (ticker, timeframe, timestamp, {})
         VALUES (?, ?, CAST(? AS TIMESTAMP), {})
         ON CONFLICT (ticker, timeframe, timestamp) DO UPDATE SET
           {}, updated_at = now()",
        columns.join(", "),
        placeholders,
        updates
    )
}

fn select_indicator_columns(alias: &str) -> String {
    IndicatorRow::NUMERIC_COLUMNS
        .iter()
        .chain(IndicatorRow::LABEL_COLUMNS.iter())
        .map(|c| format!("{alias}.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn upsert_indicators(conn: &mut Connection, rows: &[IndicatorRow]) -> Result<usize> {
    if rows.is_empty() {
        return Ok(0);
    }

    let tx = conn.transaction()?;
    let mut stmt = tx.prepare(&insert_sql())?;

    let mut count = 0;
    for row in rows {
        let timeframe = row.timeframe.as_str();
        let timestamp = fmt_ts(&row.timestamp);
        let numeric = row.numeric_values();
        let bias = row.bias.as_str();
        let signal = row.signal.map(|s| s.as_str());
        let phase = row.phase.as_str();
        let previous = row.previous_phase.map(|p| p.as_str());

        let mut values: Vec<&dyn ToSql> = Vec::with_capacity(3 + NUMERIC_COUNT + 7);
        values.push(&row.ticker);
        values.push(&timeframe);
        values.push(&timestamp);
        for v in numeric.iter() {
            values.push(v);
        }
        values.push(&bias);
        values.push(&signal);
        values.push(&phase);
        values.push(&previous);
        values.push(&row.days_in_phase);
        values.push(&row.phase_change);
        values.push(&row.bullish_entry);

        stmt.execute(params_from_iter(values))?;
        count += 1;
    }

    drop(stmt);
    tx.commit()?;

    Ok(count)
}

/// Indicator part of a result row, read before label parsing.
struct RawIndicator {
    numeric: [Option<f64>; NUMERIC_COUNT],
    bias: String,
    signal: Option<String>,
    phase: String,
    previous_phase: Option<String>,
    days_in_phase: i64,
    phase_change: bool,
    bullish_entry: bool,
}

impl RawIndicator {
    fn from_row(row: &duckdb::Row<'_>, offset: usize) -> duckdb::Result<Self> {
        let mut numeric = [None; NUMERIC_COUNT];
        for (k, slot) in numeric.iter_mut().enumerate() {
            *slot = row.get(offset + k)?;
        }
        let l = offset + NUMERIC_COUNT;
        Ok(Self {
            numeric,
            bias: row.get(l)?,
            signal: row.get(l + 1)?,
            phase: row.get(l + 2)?,
            previous_phase: row.get(l + 3)?,
            days_in_phase: row.get(l + 4)?,
            phase_change: row.get(l + 5)?,
            bullish_entry: row.get(l + 6)?,
        })
    }

    fn into_row(self, ticker: String, timeframe: Timeframe, timestamp: &str) -> Result<IndicatorRow> {
        let labels = IndicatorLabels {
            bias: self.bias.parse::<Bias>()?,
            signal: self.signal.as_deref().map(str::parse::<Signal>).transpose()?,
            phase: self.phase.parse::<Phase>()?,
            previous_phase: self
                .previous_phase
                .as_deref()
                .map(str::parse::<Phase>)
                .transpose()?,
            days_in_phase: self.days_in_phase,
            phase_change: self.phase_change,
            bullish_entry: self.bullish_entry,
        };
        Ok(IndicatorRow::from_parts(
            ticker,
            timeframe,
            parse_ts(timestamp)?,
            self.numeric,
            labels,
        ))
    }
}

/// Timestamp of the newest stored indicator row per ticker
pub fn last_timestamps(
    conn: &Connection,
    timeframe: Timeframe,
) -> Result<HashMap<String, DateTime<Utc>>> {
    let mut stmt = conn.prepare(
        "SELECT ticker, strftime(MAX(timestamp), '%Y-%m-%d %H:%M:%S.%f')
         FROM indicators WHERE timeframe = ?
         GROUP BY ticker",
    )?;

    let rows = stmt
        .query_map([timeframe.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(ticker, ts)| Ok((ticker, parse_ts(&ts)?)))
        .collect()
}

pub fn get_indicators(
    conn: &Connection,
    ticker: &str,
    timeframe: Timeframe,
) -> Result<Vec<IndicatorRow>> {
    let sql = format!(
        "SELECT i.ticker, strftime(i.timestamp, '%Y-%m-%d %H:%M:%S.%f'), {}
         FROM indicators i
         WHERE i.ticker = ? AND i.timeframe = ?
         ORDER BY i.timestamp ASC",
        select_indicator_columns("i")
    );

    let mut stmt = conn.prepare(&sql)?;
    let raw = stmt
        .query_map(params![ticker, timeframe.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                RawIndicator::from_row(row, 2)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(ticker, ts, ind)| ind.into_row(ticker, timeframe, &ts))
        .collect()
}

/// Bar ⨝ indicator rows of one timeframe, optionally only the latest per ticker.
pub fn snapshots(conn: &Connection, timeframe: Timeframe, latest_only: bool) -> Result<Vec<Snapshot>> {
    let qualify = if latest_only {
        "QUALIFY row_number() OVER (PARTITION BY b.ticker ORDER BY b.timestamp DESC) = 1"
    } else {
        ""
    };

    let sql = format!(
        "SELECT b.ticker, strftime(b.timestamp, '%Y-%m-%d %H:%M:%S.%f'),
                b.open, b.high, b.low, b.close, b.volume, {}
         FROM bars b
         JOIN indicators i
           ON i.ticker = b.ticker AND i.timeframe = b.timeframe AND i.timestamp = b.timestamp
         WHERE b.timeframe = ?
         {}
         ORDER BY b.ticker ASC, b.timestamp ASC",
        select_indicator_columns("i"),
        qualify
    );

    let mut stmt = conn.prepare(&sql)?;
    let raw = stmt
        .query_map([timeframe.as_str()], |row| {
            let ticker: String = row.get(0)?;
            let ts: String = row.get(1)?;
            let bar = (
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, f64>(5)?,
                row.get::<_, i64>(6)?,
            );
            Ok((ticker, ts, bar, RawIndicator::from_row(row, 7)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(ticker, ts, (open, high, low, close, volume), ind)| {
            let indicators = ind.into_row(ticker.clone(), timeframe, &ts)?;
            Ok(Snapshot {
                bar: Bar {
                    ticker,
                    timestamp: indicators.timestamp,
                    open,
                    high,
                    low,
                    close,
                    volume,
                },
                indicators,
            })
        })
        .collect()
}
