//! Services Layer
//!
//! Pipeline logic shared by the scan jobs and the CLI.
//!
//! # Architecture
//!
//! ```text
//! Scheduler / CLI --> Jobs --> Services --> Feed / DuckDB / Alert sink
//! ```
//!
//! # Services
//!
//! - `CollectorService` - Sync planning, chunked fetches, failover, 2h resample
//! - `AnalyzerService` - Indicator and phase refresh from stored bars
//! - `ScreenerService` - Strategy evaluation over bar + indicator snapshots
//! - `WatchlistService` - Expiring dynamic watchlist
//! - `NotificationService` - Cooldown and holdings gate for alerts
//! - `UniverseService` - Broad and detailed ticker universes

pub mod collector_service;
pub mod analyzer_service;
pub mod screener_service;
pub mod watchlist_service;
pub mod notification_service;
pub mod universe_service;

// Re-export commonly used types and services
pub use collector_service::{CollectorService, SyncMode, SyncReport};
pub use analyzer_service::{AnalyzerService, AnalyzeReport, WriteWindow};
pub use screener_service::{ScreenScope, ScreenerService, Strategy, StrategyMatch};
pub use watchlist_service::WatchlistService;
pub use notification_service::{Alert, GateOutcome, NotificationService};
pub use universe_service::{UniverseService, KEY_ETFS};
