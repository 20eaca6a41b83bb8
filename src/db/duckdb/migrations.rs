//! DuckDB migrations

use crate::error::Result;
use crate::db::duckdb::models::IndicatorRow;
use duckdb::Connection;

/// Run all DuckDB migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    // Migration names are the primary key
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS migrations (
            name VARCHAR PRIMARY KEY,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
    )?;

    run_migration(conn, "001_bars", CREATE_BARS)?;
    run_migration(conn, "002_indicators", &create_indicators_sql())?;
    run_migration(conn, "003_watchlist", CREATE_WATCHLIST)?;
    run_migration(conn, "004_notifications", CREATE_NOTIFICATIONS)?;
    run_migration(conn, "005_portfolio", CREATE_PORTFOLIO)?;
    run_migration(conn, "006_ticker_metadata", CREATE_TICKER_METADATA)?;

    tracing::debug!("DuckDB migrations completed");
    Ok(())
}

fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM migrations WHERE name = ?",
        [name],
        |row| row.get(0),
    )?;

    if !exists {
        tracing::info!("Running DuckDB migration: {}", name);
        conn.execute_batch(sql)?;
        conn.execute("INSERT INTO migrations (name) VALUES (?)", [name])?;
    }

    Ok(())
}

const CREATE_BARS: &str = r#"
CREATE TABLE IF NOT EXISTS bars (
    ticker VARCHAR NOT NULL,
    timeframe VARCHAR NOT NULL,
    timestamp TIMESTAMP NOT NULL,
    open DOUBLE NOT NULL,
    high DOUBLE NOT NULL,
    low DOUBLE NOT NULL,
    close DOUBLE NOT NULL,
    volume BIGINT NOT NULL,
    PRIMARY KEY (ticker, timeframe, timestamp)
);
"#;

/// Indicator columns come from the row model so the schema never drifts
/// from what the store writes.
fn create_indicators_sql() -> String {
    let numeric = IndicatorRow::NUMERIC_COLUMNS
        .iter()
        .map(|c| format!("    {} DOUBLE,\n", c))
        .collect::<String>();

    format!(
        r#"
CREATE TABLE IF NOT EXISTS indicators (
    ticker VARCHAR NOT NULL,
    timeframe VARCHAR NOT NULL,
    timestamp TIMESTAMP NOT NULL,
{numeric}    bias VARCHAR NOT NULL,
    signal VARCHAR,
    phase VARCHAR NOT NULL,
    previous_phase VARCHAR,
    days_in_phase BIGINT NOT NULL,
    phase_change BOOLEAN NOT NULL,
    bullish_entry BOOLEAN NOT NULL,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (ticker, timeframe, timestamp)
);
"#
    )
}

const CREATE_WATCHLIST: &str = r#"
CREATE TABLE IF NOT EXISTS watchlist (
    ticker VARCHAR PRIMARY KEY,
    reason VARCHAR NOT NULL,
    added_at TIMESTAMP NOT NULL,
    expires_at TIMESTAMP NOT NULL
);
"#;

const CREATE_NOTIFICATIONS: &str = r#"
CREATE TABLE IF NOT EXISTS notifications (
    ticker VARCHAR NOT NULL,
    strategy VARCHAR NOT NULL,
    timeframe VARCHAR NOT NULL,
    sent_at TIMESTAMP NOT NULL,
    price DOUBLE
);

CREATE INDEX IF NOT EXISTS idx_notifications_key ON notifications(ticker, strategy, timeframe);
"#;

const CREATE_PORTFOLIO: &str = r#"
CREATE SEQUENCE IF NOT EXISTS txn_id_seq START 1;

CREATE TABLE IF NOT EXISTS portfolio_transactions (
    id INTEGER PRIMARY KEY DEFAULT nextval('txn_id_seq'),
    ticker VARCHAR NOT NULL,
    side VARCHAR NOT NULL,
    qty DOUBLE NOT NULL,
    price DOUBLE NOT NULL,
    timestamp TIMESTAMP NOT NULL
);

CREATE OR REPLACE VIEW view_portfolio_holdings AS
SELECT
    ticker,
    SUM(CASE WHEN side = 'BUY' THEN qty WHEN side = 'SELL' THEN -qty ELSE 0 END) AS qty
FROM portfolio_transactions
GROUP BY ticker
HAVING SUM(CASE WHEN side = 'BUY' THEN qty WHEN side = 'SELL' THEN -qty ELSE 0 END) > 0;
"#;

const CREATE_TICKER_METADATA: &str = r#"
CREATE TABLE IF NOT EXISTS ticker_metadata (
    ticker VARCHAR PRIMARY KEY,
    name VARCHAR,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
"#;
