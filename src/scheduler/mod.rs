//! Scheduler module
//!
//! Runs the scan jobs as a daemon:
//! - Broad scan at fixed exchange-local wall clock times on weekdays
//! - Detailed scan on an interval, optionally only within market hours

mod scan_scheduler;

pub use scan_scheduler::{is_market_open, next_broad_run, ScanScheduler};
