//! Collector Service
//!
//! Brings stored bars up to date against the upstream feed.
//!
//! Each run plans a start date per ticker (full history when nothing is
//! stored, otherwise the last stored bar minus an overlap margin), groups
//! tickers sharing a start date, and issues one multi-ticker request per
//! chunk. A failed or empty chunk falls back to one request per ticker.
//! Derived timeframes are resampled from stored source bars instead of
//! being fetched.

use crate::db::duckdb::models::Bar;
use crate::error::Result;
use crate::feed::types::{FeedFrame, FeedRequest};
use crate::state::AppState;
use crate::timeframe::Timeframe;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, error, info, warn};

/// Two-hour buckets start at local midnight plus this offset.
const BUCKET_OFFSET_MIN: i64 = 30;
const BUCKET_WIDTH_MIN: i64 = 120;

/// How stored data shapes the fetch window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    /// Resume from the last stored bar minus the overlap margin
    Incremental,
    /// Ignore stored data and refetch the full window (repair)
    Full,
}

/// Outcome of one timeframe sync
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub timeframe: Timeframe,
    pub groups: usize,
    pub chunks: usize,
    pub failovers: usize,
    pub rows_written: usize,
    /// Tickers that returned nothing this cycle
    pub skipped: Vec<String>,
    /// Earliest bar written per ticker; analysis rewrites from here
    pub touched: BTreeMap<String, DateTime<Utc>>,
}

impl SyncReport {
    fn new(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            groups: 0,
            chunks: 0,
            failovers: 0,
            rows_written: 0,
            skipped: Vec::new(),
            touched: BTreeMap::new(),
        }
    }

    fn record(&mut self, bars: &[Bar], written: usize) {
        self.rows_written += written;
        for bar in bars {
            self.touched
                .entry(bar.ticker.clone())
                .and_modify(|ts| *ts = (*ts).min(bar.timestamp))
                .or_insert(bar.timestamp);
        }
    }
}

/// Collector service for bar synchronization
pub struct CollectorService;

impl CollectorService {
    /// Sync one timeframe for the given tickers.
    ///
    /// Feed failures are absorbed per ticker; store failures abort the run.
    pub async fn sync(
        state: &AppState,
        tickers: &[String],
        timeframe: Timeframe,
        mode: SyncMode,
        now: DateTime<Utc>,
    ) -> Result<SyncReport> {
        let tickers: BTreeSet<String> = tickers.iter().cloned().collect();
        if tickers.is_empty() {
            warn!("CollectorService::sync - empty ticker list for {}", timeframe);
            return Ok(SyncReport::new(timeframe));
        }

        if let Some(source) = timeframe.source() {
            return Self::resample(state, &tickers, timeframe, source, mode);
        }

        info!(
            "CollectorService::sync - {} tickers on {} ({:?})",
            tickers.len(),
            timeframe,
            mode
        );

        let last = match mode {
            SyncMode::Incremental => state.duckdb.last_timestamps(timeframe)?,
            SyncMode::Full => HashMap::new(),
        };

        let groups = plan_groups(
            &tickers,
            &last,
            timeframe,
            now,
            state.settings.daily_history_start()?,
            state.settings.sync.overlap_days,
        );
        let requests = chunk_requests(&groups, timeframe, state.settings.sync.chunk_size);
        let tz = state.settings.exchange_tz()?;

        let mut report = SyncReport::new(timeframe);
        report.groups = groups.len();
        info!("   {} start-date groups, {} requests", groups.len(), requests.len());

        for request in &requests {
            report.chunks += 1;
            debug!(
                "   requesting {} tickers from {}",
                request.tickers.len(),
                request.start
            );

            let failed: Vec<String> = match state.feed.fetch(request).await {
                Ok(frame) if !frame.is_empty() => {
                    let bars = normalize(frame, timeframe, tz);
                    let written = state.duckdb.upsert_bars(timeframe, &bars)?;
                    report.record(&bars, written);

                    // Tickers whose rows were all dropped count as missing
                    let returned: BTreeSet<&str> = bars.iter().map(|b| b.ticker.as_str()).collect();
                    request
                        .tickers
                        .iter()
                        .filter(|t| !returned.contains(t.as_str()))
                        .cloned()
                        .collect()
                }
                Ok(_) => {
                    warn!("   chunk from {} returned no rows, failing over", request.start);
                    request.tickers.clone()
                }
                Err(e) => {
                    warn!("   chunk from {} failed ({}), failing over", request.start, e);
                    request.tickers.clone()
                }
            };

            for ticker in failed {
                report.failovers += 1;
                Self::fetch_single(state, &ticker, request, tz, &mut report).await?;
            }
        }

        info!(
            "CollectorService::sync - {} done: {} rows, {} failovers, {} skipped",
            timeframe,
            report.rows_written,
            report.failovers,
            report.skipped.len()
        );
        Ok(report)
    }

    async fn fetch_single(
        state: &AppState,
        ticker: &str,
        chunk: &FeedRequest,
        tz: Tz,
        report: &mut SyncReport,
    ) -> Result<()> {
        let request = FeedRequest {
            tickers: vec![ticker.to_string()],
            interval: chunk.interval.clone(),
            start: chunk.start,
        };

        match state.feed.fetch(&request).await {
            Ok(frame) => {
                let bars = normalize(frame, report.timeframe, tz);
                if bars.is_empty() {
                    warn!("   {} {}: no data, skipped", ticker, report.timeframe);
                    report.skipped.push(ticker.to_string());
                } else {
                    let written = state.duckdb.upsert_bars(report.timeframe, &bars)?;
                    report.record(&bars, written);
                }
            }
            Err(e) if e.is_transient() => {
                warn!("   {} {}: {}, skipped", ticker, report.timeframe, e);
                report.skipped.push(ticker.to_string());
            }
            Err(e) => {
                error!("   {} {}: unexpected feed failure: {}, skipped", ticker, report.timeframe, e);
                report.skipped.push(ticker.to_string());
            }
        }
        Ok(())
    }

    fn resample(
        state: &AppState,
        tickers: &BTreeSet<String>,
        timeframe: Timeframe,
        source: Timeframe,
        mode: SyncMode,
    ) -> Result<SyncReport> {
        let tz = state.settings.exchange_tz()?;
        let overlap = Duration::days(state.settings.sync.overlap_days);
        let last = match mode {
            SyncMode::Incremental => state.duckdb.last_timestamps(timeframe)?,
            SyncMode::Full => HashMap::new(),
        };

        let mut report = SyncReport::new(timeframe);
        for ticker in tickers {
            let bars = match last.get(ticker) {
                Some(ts) => {
                    let since = local_midnight(*ts - overlap, tz).unwrap_or(*ts - overlap);
                    state.duckdb.get_bars_since(ticker, source, since)?
                }
                None => state.duckdb.get_bars(ticker, source, None)?,
            };

            let buckets = resample_two_hour(&bars, tz);
            if buckets.is_empty() {
                debug!("   {} {}: no source bars", ticker, timeframe);
                report.skipped.push(ticker.clone());
                continue;
            }
            let written = state.duckdb.upsert_bars(timeframe, &buckets)?;
            report.record(&buckets, written);
        }

        info!(
            "CollectorService::resample - {} from {}: {} rows",
            timeframe, source, report.rows_written
        );
        Ok(report)
    }
}

/// Start date per ticker, grouped so tickers sharing a window share a request.
pub fn plan_groups(
    tickers: &BTreeSet<String>,
    last: &HashMap<String, DateTime<Utc>>,
    timeframe: Timeframe,
    now: DateTime<Utc>,
    daily_start: NaiveDate,
    overlap_days: i64,
) -> BTreeMap<NaiveDate, Vec<String>> {
    let full_start = timeframe.full_history_start(now, daily_start);
    let mut groups: BTreeMap<NaiveDate, Vec<String>> = BTreeMap::new();

    for ticker in tickers {
        let start = match last.get(ticker) {
            Some(ts) => (*ts - Duration::days(overlap_days)).date_naive().max(full_start),
            None => full_start,
        };
        groups.entry(start).or_default().push(ticker.clone());
    }
    groups
}

/// Split each start-date group into requests of at most `chunk_size` tickers.
pub fn chunk_requests(
    groups: &BTreeMap<NaiveDate, Vec<String>>,
    timeframe: Timeframe,
    chunk_size: usize,
) -> Vec<FeedRequest> {
    let Some(interval) = timeframe.feed_interval() else {
        return Vec::new();
    };

    groups
        .iter()
        .flat_map(|(start, tickers)| {
            tickers.chunks(chunk_size.max(1)).map(move |chunk| FeedRequest {
                tickers: chunk.to_vec(),
                interval: interval.to_string(),
                start: *start,
            })
        })
        .collect()
}

/// Clean a feed frame into bars sorted by (ticker, timestamp).
///
/// Rows missing any price, or with no positive volume, are dropped. Daily
/// bars are keyed at UTC midnight of their exchange-local trading date.
/// Duplicate keys keep the last row.
pub fn normalize(frame: FeedFrame, timeframe: Timeframe, tz: Tz) -> Vec<Bar> {
    let mut out: BTreeMap<(String, DateTime<Utc>), Bar> = BTreeMap::new();

    for row in frame.rows {
        let (Some(open), Some(high), Some(low), Some(close)) = (row.open, row.high, row.low, row.close)
        else {
            continue;
        };
        if ![open, high, low, close].iter().all(|v| v.is_finite()) {
            continue;
        }
        let volume = match row.volume {
            Some(v) if v.is_finite() && v > 0.0 => v.round() as i64,
            _ => continue,
        };

        let timestamp = if timeframe.is_daily() {
            match row
                .timestamp
                .with_timezone(&tz)
                .date_naive()
                .and_hms_opt(0, 0, 0)
            {
                Some(midnight) => midnight.and_utc(),
                None => continue,
            }
        } else {
            row.timestamp
        };

        out.insert(
            (row.ticker.clone(), timestamp),
            Bar {
                ticker: row.ticker,
                timestamp,
                open,
                high,
                low,
                close,
                volume,
            },
        );
    }

    out.into_values().collect()
}

/// Aggregate ascending hourly bars of one ticker into two-hour buckets
/// anchored at local midnight + 30 minutes.
pub fn resample_two_hour(bars: &[Bar], tz: Tz) -> Vec<Bar> {
    let mut buckets: BTreeMap<DateTime<Utc>, Bar> = BTreeMap::new();

    for bar in bars {
        let Some(start) = bucket_start(bar.timestamp, tz) else {
            warn!("{}: no local midnight for {}, bar skipped", bar.ticker, bar.timestamp);
            continue;
        };

        buckets
            .entry(start)
            .and_modify(|b| {
                b.high = b.high.max(bar.high);
                b.low = b.low.min(bar.low);
                b.close = bar.close;
                b.volume += bar.volume;
            })
            .or_insert_with(|| Bar {
                timestamp: start,
                ..bar.clone()
            });
    }

    buckets.into_values().filter(|b| b.volume > 0).collect()
}

fn bucket_start(ts: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
    let local = ts.with_timezone(&tz);
    let midnight = local_midnight(ts, tz)?;
    let minutes = (local.hour() * 60 + local.minute()) as i64;
    let idx = (minutes - BUCKET_OFFSET_MIN).div_euclid(BUCKET_WIDTH_MIN);
    Some(midnight + Duration::minutes(BUCKET_OFFSET_MIN + idx * BUCKET_WIDTH_MIN))
}

fn local_midnight(ts: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
    let day = ts.with_timezone(&tz).date_naive().and_hms_opt(0, 0, 0)?;
    tz.from_local_datetime(&day)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
