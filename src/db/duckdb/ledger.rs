//! Portfolio ledger and ticker metadata

use super::models::{fmt_ts, TickerMetadata, Transaction};
use crate::error::Result;
use duckdb::{params, Connection, OptionalExt};
use std::collections::BTreeSet;

pub fn insert_transaction(conn: &Connection, txn: &Transaction) -> Result<()> {
    conn.execute(
        "INSERT INTO portfolio_transactions (ticker, side, qty, price, timestamp)
         VALUES (?, ?, ?, ?, CAST(? AS TIMESTAMP))",
        params![
            txn.ticker,
            txn.side.as_str(),
            txn.qty,
            txn.price,
            fmt_ts(&txn.executed_at),
        ],
    )?;
    Ok(())
}

pub fn held_tickers(conn: &Connection) -> Result<BTreeSet<String>> {
    let mut stmt = conn.prepare("SELECT ticker FROM view_portfolio_holdings")?;
    let tickers = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<BTreeSet<_>, _>>()?;
    Ok(tickers)
}

pub fn upsert_metadata(conn: &Connection, meta: &TickerMetadata) -> Result<()> {
    conn.execute(
        "INSERT INTO ticker_metadata (ticker, name, updated_at)
         VALUES (?, ?, CURRENT_TIMESTAMP)
         ON CONFLICT (ticker) DO UPDATE SET
           name = COALESCE(excluded.name, ticker_metadata.name),
           updated_at = now()",
        params![meta.ticker, meta.name],
    )?;
    Ok(())
}

pub fn get_metadata(conn: &Connection, ticker: &str) -> Result<Option<TickerMetadata>> {
    let meta = conn
        .query_row(
            "SELECT ticker, name FROM ticker_metadata WHERE ticker = ?",
            [ticker],
            |row| {
                Ok(TickerMetadata {
                    ticker: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(meta)
}
