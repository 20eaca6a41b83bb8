//! Yahoo Finance chart API adapter

use crate::error::{AppError, Result};
use crate::feed::throttle::RequestThrottle;
use crate::feed::types::{FeedFrame, FeedRequest, FeedRow};
use crate::feed::MarketFeed;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

const BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) market-dashboard";

/// Yahoo Finance feed.
///
/// The chart endpoint serves one symbol per call, so a multi-ticker request
/// becomes a sequence of paced calls. A failing symbol is left out of the
/// frame and the rest is returned; the request only fails when every symbol
/// did. Prices are split and dividend adjusted when the response carries
/// `adjclose`.
pub struct YahooFeed {
    client: Client,
    throttle: RequestThrottle,
}

impl YahooFeed {
    pub fn new(requests_per_second: u32, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            throttle: RequestThrottle::new(requests_per_second),
        })
    }

    async fn fetch_symbol(&self, ticker: &str, interval: &str, period1: i64) -> Result<Vec<FeedRow>> {
        self.throttle.acquire().await;

        let period2 = Utc::now().timestamp();
        let response = self
            .client
            .get(format!("{}/{}", BASE_URL, ticker))
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", interval.to_string()),
                ("includePrePost", "false".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Feed(format!(
                "{} {}: HTTP {} {}",
                ticker,
                interval,
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let body: ChartResponse = response.json().await?;
        parse_chart(ticker, body)
    }
}

#[async_trait]
impl MarketFeed for YahooFeed {
    fn id(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch(&self, request: &FeedRequest) -> Result<FeedFrame> {
        let period1 = request
            .start
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .ok_or_else(|| AppError::Internal(format!("Invalid start date {}", request.start)))?;

        let mut results = Vec::with_capacity(request.tickers.len());
        for ticker in &request.tickers {
            let result = self.fetch_symbol(ticker, &request.interval, period1).await;
            results.push((ticker.as_str(), result));
        }
        merge_symbols(results)
    }
}

/// Combine per-symbol results into one frame, dropping failed symbols.
fn merge_symbols(results: Vec<(&str, Result<Vec<FeedRow>>)>) -> Result<FeedFrame> {
    let total = results.len();
    let mut frame = FeedFrame::default();
    let mut last_error = None;
    let mut failures = 0;

    for (ticker, result) in results {
        match result {
            Ok(rows) => frame.rows.extend(rows),
            Err(e) => {
                warn!("yahoo: {} left out of the batch: {}", ticker, e);
                failures += 1;
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if failures == total => Err(e),
        _ => Ok(frame),
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<Quote>,
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

#[derive(Debug, Default, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

fn parse_chart(ticker: &str, body: ChartResponse) -> Result<Vec<FeedRow>> {
    if let Some(err) = body.chart.error {
        return Err(AppError::Feed(format!(
            "{}: {} {}",
            ticker,
            err.code.unwrap_or_default(),
            err.description.unwrap_or_default()
        )));
    }

    let result = body
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| AppError::Feed(format!("{}: empty chart result", ticker)))?;

    // No timestamps means no bars in the window
    let timestamps = match result.timestamp {
        Some(ts) => ts,
        None => return Ok(Vec::new()),
    };

    let indicators = result.indicators;
    let adjclose = indicators
        .adjclose
        .into_iter()
        .next()
        .map(|a| a.adjclose)
        .unwrap_or_default();
    let quote = indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Feed(format!("{}: missing quote block", ticker)))?;

    let at = |v: &Vec<Option<f64>>, i: usize| v.get(i).copied().flatten();

    let mut rows = Vec::with_capacity(timestamps.len());
    for (i, ts) in timestamps.iter().enumerate() {
        let timestamp = DateTime::<Utc>::from_timestamp(*ts, 0)
            .ok_or_else(|| AppError::Feed(format!("{}: bad timestamp {}", ticker, ts)))?;

        let close = at(&quote.close, i);
        // Scale the whole bar by adjclose / close; unadjusted when either is missing
        let factor = match (close, at(&adjclose, i)) {
            (Some(c), Some(adj)) if c != 0.0 => adj / c,
            _ => 1.0,
        };
        let scale = |v: Option<f64>| v.map(|x| x * factor);

        rows.push(FeedRow {
            ticker: ticker.to_string(),
            timestamp,
            open: scale(at(&quote.open, i)),
            high: scale(at(&quote.high, i)),
            low: scale(at(&quote.low, i)),
            close: scale(close),
            volume: at(&quote.volume, i),
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chart_with_gaps() {
        let body: ChartResponse = serde_json::from_str(
            r#"{"chart":{"result":[{"meta":{"symbol":"AAPL"},
                "timestamp":[1704205800,1704292200],
                "indicators":{"quote":[{"open":[187.1,null],"high":[188.4,185.8],
                  "low":[183.8,183.4],"close":[185.6,184.2],"volume":[82488700,58414500]}]}}],
                "error":null}}"#,
        )
        .unwrap();

        let rows = parse_chart("AAPL", body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].open, Some(187.1));
        assert_eq!(rows[1].open, None);
        assert_eq!(rows[1].volume, Some(58414500.0));
    }

    #[test]
    fn test_parse_chart_error() {
        let body: ChartResponse = serde_json::from_str(
            r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#,
        )
        .unwrap();
        let err = parse_chart("ZZZZ", body).unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_parse_chart_applies_adjclose() {
        // 2:1 split after the first bar: raw closes 200 then 100, adjusted 100 and 100
        let body: ChartResponse = serde_json::from_str(
            r#"{"chart":{"result":[{"timestamp":[1704205800,1704292200],
                "indicators":{"quote":[{"open":[198.0,99.0],"high":[202.0,101.0],
                  "low":[196.0,98.0],"close":[200.0,100.0],"volume":[1000,2000]}],
                  "adjclose":[{"adjclose":[100.0,null]}]}}],"error":null}}"#,
        )
        .unwrap();

        let rows = parse_chart("NVDA", body).unwrap();
        assert_eq!(rows[0].open, Some(99.0));
        assert_eq!(rows[0].high, Some(101.0));
        assert_eq!(rows[0].low, Some(98.0));
        assert_eq!(rows[0].close, Some(100.0));
        assert_eq!(rows[0].volume, Some(1000.0));
        // No adjusted value: raw prices kept
        assert_eq!(rows[1].close, Some(100.0));
        assert_eq!(rows[1].open, Some(99.0));
    }

    fn feed_row(ticker: &str) -> FeedRow {
        FeedRow {
            ticker: ticker.to_string(),
            timestamp: DateTime::<Utc>::from_timestamp(1704205800, 0).unwrap(),
            open: Some(1.0),
            high: Some(1.0),
            low: Some(1.0),
            close: Some(1.0),
            volume: Some(1.0),
        }
    }

    #[test]
    fn test_merge_symbols_keeps_partial_batch() {
        let frame = merge_symbols(vec![
            ("AAPL", Ok(vec![feed_row("AAPL")])),
            ("ZZZZ", Err(AppError::Feed("ZZZZ: Not Found".to_string()))),
            ("MSFT", Ok(vec![feed_row("MSFT")])),
        ])
        .unwrap();

        let tickers: Vec<&str> = frame.rows.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn test_merge_symbols_fails_when_every_symbol_failed() {
        let err = merge_symbols(vec![
            ("ZZZZ", Err(AppError::Feed("ZZZZ: Not Found".to_string()))),
            ("YYYY", Err(AppError::Feed("YYYY: Not Found".to_string()))),
        ]);
        assert!(matches!(err, Err(AppError::Feed(_))));

        // An empty but successful symbol is not a failure
        let frame = merge_symbols(vec![("AAPL", Ok(Vec::new()))]).unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn test_parse_chart_without_timestamps() {
        let body: ChartResponse = serde_json::from_str(
            r#"{"chart":{"result":[{"meta":{},"indicators":{"quote":[{}]}}],"error":null}}"#,
        )
        .unwrap();
        assert!(parse_chart("AAPL", body).unwrap().is_empty());
    }
}
