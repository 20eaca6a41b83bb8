//! Typed settings loaded from TOML
//!
//! Every recognized option is enumerated here with an explicit default.
//! A missing file yields the defaults; a present file is parsed strictly and
//! then validated once through [`Settings::validate`].

use crate::error::{AppError, Result};
use crate::timeframe::Timeframe;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/settings.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub system: SystemConfig,
    pub portfolio: PortfolioConfig,
    pub universe: UniverseConfig,
    pub data: DataConfig,
    pub sync: SyncConfig,
    pub indicators: IndicatorsConfig,
    pub analyzer: AnalyzerConfig,
    pub screener: ScreenerConfig,
    pub watchlist: WatchlistConfig,
    pub alerts: AlertsConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SystemConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    /// Exchange timezone used for market hours and 2h bucket anchoring
    pub exchange_timezone: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/markets.duckdb"),
            log_level: "info".to_string(),
            exchange_timezone: "America/New_York".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PortfolioConfig {
    /// Positions held outside the ledger
    pub holdings: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UniverseConfig {
    /// Broad scan tickers
    pub tickers: Vec<String>,
    /// Manually pinned tickers, always part of the detailed scan
    pub pinned: Vec<String>,
    pub include_key_etfs: bool,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            tickers: Vec::new(),
            pinned: Vec::new(),
            include_key_etfs: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    pub broad_timeframes: Vec<String>,
    pub detailed_timeframes: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            broad_timeframes: vec!["1d".to_string()],
            detailed_timeframes: vec!["1h".to_string(), "2h".to_string(), "15m".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    pub chunk_size: usize,
    pub overlap_days: i64,
    /// First date requested for daily tickers with no stored history (YYYY-MM-DD)
    pub daily_history_start: String,
    /// Upper bound on upstream feed requests
    pub requests_per_second: u32,
    pub request_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            chunk_size: 50,
            overlap_days: 5,
            daily_history_start: "2000-01-01".to_string(),
            requests_per_second: 2,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndicatorsConfig {
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub adx_length: usize,
    pub bias_adx_threshold: f64,
    pub ema_short: usize,
    pub ema_long: usize,
    pub bollinger_length: usize,
    pub bollinger_stdev: f64,
    pub donchian_short: usize,
    pub donchian_long: usize,
    pub volume_length: usize,
    pub cmf_length: usize,
    pub mfi_length: usize,
    pub phase_short_ma: usize,
    pub phase_long_ma: usize,
    pub phase_slope_window: usize,
    pub phase_flat_slope: f64,
    pub phase_band: f64,
}

impl Default for IndicatorsConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            adx_length: 14,
            bias_adx_threshold: 20.0,
            ema_short: 50,
            ema_long: 200,
            bollinger_length: 20,
            bollinger_stdev: 2.0,
            donchian_short: 20,
            donchian_long: 60,
            volume_length: 20,
            cmf_length: 20,
            mfi_length: 14,
            phase_short_ma: 50,
            phase_long_ma: 200,
            phase_slope_window: 40,
            phase_flat_slope: 3e-4,
            phase_band: 0.05,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerConfig {
    /// Rows persisted per ticker on an incremental pass
    pub persist_tail: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self { persist_tail: 5 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScreenerConfig {
    pub strategies: Vec<String>,
    pub bounce_max_gap_pct: f64,
    pub bounce_rsi_min: f64,
    pub bounce_rsi_max: f64,
    pub bounce_min_rel_volume: f64,
    pub trend_min_adx: f64,
    pub strength_min_rsi: f64,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            strategies: vec![
                "BUY_BOUNCE".to_string(),
                "BUY_TREND".to_string(),
                "SELL_STRENGTH".to_string(),
                "MARKUP_ENTRY".to_string(),
            ],
            bounce_max_gap_pct: -6.0,
            bounce_rsi_min: 5.0,
            bounce_rsi_max: 60.0,
            bounce_min_rel_volume: 0.6,
            trend_min_adx: 25.0,
            strength_min_rsi: 70.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchlistConfig {
    pub retention_days: i64,
}

impl Default for WatchlistConfig {
    fn default() -> Self {
        Self { retention_days: 3 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlertsConfig {
    pub enabled: bool,
    pub discord_webhook_url: Option<String>,
    pub cooldown_hours: i64,
    /// Optional link appended to every alert
    pub dashboard_url: Option<String>,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            discord_webhook_url: None,
            cooldown_hours: 6,
            dashboard_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Wall clock times (exchange timezone, HH:MM) for the broad scan
    pub broad_run_at: Vec<String>,
    pub detailed_interval_min: u64,
    pub market_open: String,
    pub market_close: String,
    pub respect_market_hours: bool,
    pub loop_interval_sec: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            broad_run_at: vec!["16:15".to_string()],
            detailed_interval_min: 15,
            market_open: "09:30".to_string(),
            market_close: "16:00".to_string(),
            respect_market_hours: true,
            loop_interval_sec: 60,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file, falling back to defaults when the file is absent.
    ///
    /// `DISCORD_WEBHOOK_URL` and `MARKET_DASHBOARD_DB` override the file.
    pub fn load(path: &Path) -> Result<Self> {
        let mut settings = if path.exists() {
            let contents = fs::read_to_string(path)?;
            Self::from_toml(&contents)?
        } else {
            tracing::warn!("Config file {} not found, using defaults", path.display());
            Self::default()
        };

        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    fn apply_env_overrides(&mut self) {
        dotenv::dotenv().ok();

        if let Ok(url) = std::env::var("DISCORD_WEBHOOK_URL") {
            if !url.trim().is_empty() {
                self.alerts.discord_webhook_url = Some(url);
            }
        }
        if let Ok(db) = std::env::var("MARKET_DASHBOARD_DB") {
            if !db.trim().is_empty() {
                self.system.db_path = PathBuf::from(db);
            }
        }
    }

    /// Check every option once; later code trusts these invariants.
    pub fn validate(&self) -> Result<()> {
        let ind = &self.indicators;
        for (name, value) in [
            ("rsi_period", ind.rsi_period),
            ("macd_fast", ind.macd_fast),
            ("macd_slow", ind.macd_slow),
            ("macd_signal", ind.macd_signal),
            ("adx_length", ind.adx_length),
            ("ema_short", ind.ema_short),
            ("ema_long", ind.ema_long),
            ("bollinger_length", ind.bollinger_length),
            ("donchian_short", ind.donchian_short),
            ("donchian_long", ind.donchian_long),
            ("volume_length", ind.volume_length),
            ("cmf_length", ind.cmf_length),
            ("mfi_length", ind.mfi_length),
            ("phase_short_ma", ind.phase_short_ma),
            ("phase_long_ma", ind.phase_long_ma),
            ("phase_slope_window", ind.phase_slope_window),
        ] {
            if value == 0 {
                return Err(AppError::Config(format!("indicators.{} must be positive", name)));
            }
        }
        if ind.macd_fast >= ind.macd_slow {
            return Err(AppError::Config(
                "indicators.macd_fast must be shorter than macd_slow".to_string(),
            ));
        }
        if ind.ema_short >= ind.ema_long {
            return Err(AppError::Config(
                "indicators.ema_short must be shorter than ema_long".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&ind.rsi_oversold)
            || !(0.0..=100.0).contains(&ind.rsi_overbought)
            || ind.rsi_oversold >= ind.rsi_overbought
        {
            return Err(AppError::Config(
                "indicators.rsi_oversold must be below rsi_overbought within 0..100".to_string(),
            ));
        }
        if ind.bollinger_stdev <= 0.0 {
            return Err(AppError::Config("indicators.bollinger_stdev must be positive".to_string()));
        }

        if self.sync.chunk_size == 0 {
            return Err(AppError::Config("sync.chunk_size must be positive".to_string()));
        }
        if self.sync.requests_per_second == 0 || self.sync.request_timeout_secs == 0 {
            return Err(AppError::Config(
                "sync.requests_per_second and sync.request_timeout_secs must be positive".to_string(),
            ));
        }
        if self.sync.overlap_days < 0 {
            return Err(AppError::Config("sync.overlap_days cannot be negative".to_string()));
        }
        self.daily_history_start()?;

        if self.watchlist.retention_days <= 0 {
            return Err(AppError::Config("watchlist.retention_days must be positive".to_string()));
        }
        if self.alerts.cooldown_hours < 0 {
            return Err(AppError::Config("alerts.cooldown_hours cannot be negative".to_string()));
        }
        if self.alerts.enabled && self.alerts.discord_webhook_url.is_none() {
            return Err(AppError::Config(
                "alerts.enabled requires alerts.discord_webhook_url or DISCORD_WEBHOOK_URL".to_string(),
            ));
        }

        self.broad_timeframes()?;
        self.detailed_timeframes()?;
        self.exchange_tz()?;
        for strategy in &self.screener.strategies {
            strategy.parse::<crate::services::Strategy>()?;
        }

        for t in &self.scheduler.broad_run_at {
            parse_hhmm(t)?;
        }
        let open = parse_hhmm(&self.scheduler.market_open)?;
        let close = parse_hhmm(&self.scheduler.market_close)?;
        if open >= close {
            return Err(AppError::Config(
                "scheduler.market_open must be before market_close".to_string(),
            ));
        }
        if self.scheduler.detailed_interval_min == 0 {
            return Err(AppError::Config(
                "scheduler.detailed_interval_min must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn broad_timeframes(&self) -> Result<Vec<Timeframe>> {
        parse_timeframes(&self.data.broad_timeframes)
    }

    /// Detailed timeframes, ordered so a derived timeframe follows its source.
    pub fn detailed_timeframes(&self) -> Result<Vec<Timeframe>> {
        let mut tfs = parse_timeframes(&self.data.detailed_timeframes)?;
        tfs.sort_by_key(|tf| tf.source().is_some());
        for tf in &tfs {
            if let Some(src) = tf.source() {
                if !tfs.contains(&src) {
                    return Err(AppError::Config(format!(
                        "timeframe {} requires its source timeframe {}",
                        tf, src
                    )));
                }
            }
        }
        Ok(tfs)
    }

    pub fn daily_history_start(&self) -> Result<chrono::NaiveDate> {
        chrono::NaiveDate::parse_from_str(&self.sync.daily_history_start, "%Y-%m-%d").map_err(|e| {
            AppError::Config(format!(
                "sync.daily_history_start '{}': {}",
                self.sync.daily_history_start, e
            ))
        })
    }

    pub fn exchange_tz(&self) -> Result<chrono_tz::Tz> {
        self.system.exchange_timezone.parse::<chrono_tz::Tz>().map_err(|e| {
            AppError::Config(format!("system.exchange_timezone: {}", e))
        })
    }
}

fn parse_timeframes(values: &[String]) -> Result<Vec<Timeframe>> {
    let mut out = Vec::with_capacity(values.len());
    for v in values {
        let tf: Timeframe = v.parse()?;
        if !out.contains(&tf) {
            out.push(tf);
        }
    }
    Ok(out)
}

pub fn parse_hhmm(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|e| AppError::Config(format!("invalid time '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.sync.chunk_size, 50);
        assert_eq!(settings.sync.overlap_days, 5);
        assert_eq!(settings.watchlist.retention_days, 3);
        assert_eq!(settings.alerts.cooldown_hours, 6);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = Settings::from_toml(
            r#"
            [universe]
            tickers = ["AAPL", "MSFT"]

            [indicators]
            rsi_period = 10
            "#,
        )
        .unwrap();

        assert_eq!(settings.universe.tickers, vec!["AAPL", "MSFT"]);
        assert_eq!(settings.indicators.rsi_period, 10);
        assert_eq!(settings.indicators.macd_slow, 26);
        settings.validate().unwrap();
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(Settings::from_toml("[sync]\nchunk = 10\n").is_err());
    }

    #[test]
    fn test_validation_errors() {
        let mut settings = Settings::default();
        settings.indicators.macd_fast = 30;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.sync.chunk_size = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.data.detailed_timeframes = vec!["2h".to_string()];
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.scheduler.broad_run_at = vec!["25:00".to_string()];
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_detailed_timeframes_put_sources_first() {
        let mut settings = Settings::default();
        settings.data.detailed_timeframes =
            vec!["2h".to_string(), "15m".to_string(), "1h".to_string()];
        let tfs = settings.detailed_timeframes().unwrap();
        let pos_1h = tfs.iter().position(|t| *t == Timeframe::Hourly).unwrap();
        let pos_2h = tfs.iter().position(|t| *t == Timeframe::TwoHour).unwrap();
        assert!(pos_1h < pos_2h);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings.screener.strategies.len(), 4);
    }
}
