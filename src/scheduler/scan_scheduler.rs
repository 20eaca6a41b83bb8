//! Daemon loop dispatching broad and detailed scans.
//!
//! Jobs run inline in the loop, one at a time, so there is never more than
//! one writer against the store.

use crate::config::parse_hhmm;
use crate::error::Result;
use crate::jobs::{broad_scan, detailed_scan};
use crate::state::AppState;
use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Scan scheduler bound to the exchange timezone
pub struct ScanScheduler {
    state: Arc<AppState>,
    tz: Tz,
    broad_times: Vec<NaiveTime>,
    market_open: NaiveTime,
    market_close: NaiveTime,
    detailed_interval: Duration,
    tick: std::time::Duration,
}

impl ScanScheduler {
    pub fn new(state: Arc<AppState>) -> Result<Self> {
        let cfg = &state.settings.scheduler;
        let mut broad_times = cfg
            .broad_run_at
            .iter()
            .map(|t| parse_hhmm(t))
            .collect::<Result<Vec<_>>>()?;
        broad_times.sort();

        Ok(Self {
            tz: state.settings.exchange_tz()?,
            broad_times,
            market_open: parse_hhmm(&cfg.market_open)?,
            market_close: parse_hhmm(&cfg.market_close)?,
            detailed_interval: Duration::minutes(cfg.detailed_interval_min as i64),
            tick: std::time::Duration::from_secs(cfg.loop_interval_sec.max(1)),
            state,
        })
    }

    /// Run until Ctrl-C
    pub async fn run(self) -> Result<()> {
        let respect_hours = self.state.settings.scheduler.respect_market_hours;
        let mut next_broad = next_broad_run(Utc::now(), &self.broad_times, self.tz);
        let mut last_detailed: Option<DateTime<Utc>> = None;

        match next_broad {
            Some(at) => info!("Scheduler started, next broad scan at {}", at.with_timezone(&self.tz)),
            None => warn!("Scheduler started without broad scan times"),
        }

        loop {
            let now = Utc::now();

            if next_broad.map_or(false, |at| now >= at) {
                match broad_scan::run(&self.state, now).await {
                    Ok(report) if !report.is_clean() => {
                        warn!("Broad scan had failures: {:?}", report.failed_timeframes)
                    }
                    Ok(_) => {}
                    Err(e) => error!("Broad scan failed: {}", e),
                }
                next_broad = next_broad_run(Utc::now(), &self.broad_times, self.tz);
                if let Some(at) = next_broad {
                    info!("Next broad scan at {}", at.with_timezone(&self.tz));
                }
            }

            let due = last_detailed.map_or(true, |last| now - last >= self.detailed_interval);
            let open = !respect_hours
                || is_market_open(now.with_timezone(&self.tz), self.market_open, self.market_close);
            if due && open {
                last_detailed = Some(now);
                match detailed_scan::run(&self.state, now).await {
                    Ok(report) if !report.is_clean() => {
                        warn!("Detailed scan had failures: {:?}", report.failed_timeframes)
                    }
                    Ok(_) => {}
                    Err(e) => error!("Detailed scan failed: {}", e),
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.tick) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown requested, scheduler stopping");
                    return Ok(());
                }
            }
        }
    }
}

fn is_weekday(day: Weekday) -> bool {
    !matches!(day, Weekday::Sat | Weekday::Sun)
}

/// Earliest configured weekday run time strictly after `after`.
pub fn next_broad_run(after: DateTime<Utc>, times: &[NaiveTime], tz: Tz) -> Option<DateTime<Utc>> {
    let today = after.with_timezone(&tz).date_naive();

    (0..=7)
        .filter_map(|offset| today.checked_add_signed(Duration::days(offset)))
        .filter(|date| is_weekday(date.weekday()))
        .flat_map(|date| times.iter().map(move |t| date.and_time(*t)))
        .filter_map(|local| tz.from_local_datetime(&local).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .filter(|dt| *dt > after)
        .min()
}

/// Regular session check on exchange-local time, weekends closed.
pub fn is_market_open(local: DateTime<Tz>, open: NaiveTime, close: NaiveTime) -> bool {
    let t = local.time();
    is_weekday(local.weekday()) && t >= open && t < close
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ny() -> Tz {
        "America/New_York".parse().unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_next_broad_run_same_day() {
        // Tue 2024-03-12 15:00 EDT
        let after = Utc.with_ymd_and_hms(2024, 3, 12, 19, 0, 0).unwrap();
        let next = next_broad_run(after, &[hm(16, 15)], ny()).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 12, 20, 15, 0).unwrap());
    }

    #[test]
    fn test_next_broad_run_skips_weekend() {
        // Fri 2024-03-15 17:00 EDT
        let after = Utc.with_ymd_and_hms(2024, 3, 15, 21, 0, 0).unwrap();
        let next = next_broad_run(after, &[hm(16, 15)], ny()).unwrap();
        // Mon 2024-03-18 16:15 EDT
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 18, 20, 15, 0).unwrap());
    }

    #[test]
    fn test_next_broad_run_without_times() {
        let after = Utc.with_ymd_and_hms(2024, 3, 12, 19, 0, 0).unwrap();
        assert!(next_broad_run(after, &[], ny()).is_none());
    }

    #[test]
    fn test_market_hours() {
        let tz = ny();
        let at = |d: u32, h: u32, m: u32| tz.with_ymd_and_hms(2024, 3, d, h, m, 0).unwrap();

        assert!(is_market_open(at(12, 9, 30), hm(9, 30), hm(16, 0)));
        assert!(is_market_open(at(12, 15, 59), hm(9, 30), hm(16, 0)));
        assert!(!is_market_open(at(12, 16, 0), hm(9, 30), hm(16, 0)));
        assert!(!is_market_open(at(12, 9, 0), hm(9, 30), hm(16, 0)));
        // Saturday
        assert!(!is_market_open(at(16, 11, 0), hm(9, 30), hm(16, 0)));
    }
}
