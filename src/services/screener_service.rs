//! Screener Service
//!
//! Named boolean strategies evaluated over bar + indicator snapshots.

use crate::config::ScreenerConfig;
use crate::db::duckdb::models::Snapshot;
use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::timeframe::Timeframe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Strategy catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    /// Panic gap down with room to rebound
    BuyBounce,
    /// Established uptrend with momentum
    BuyTrend,
    /// Overbought, candidate to trim
    SellStrength,
    /// First bar of a new markup phase
    MarkupEntry,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::BuyBounce,
        Strategy::BuyTrend,
        Strategy::SellStrength,
        Strategy::MarkupEntry,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Strategy::BuyBounce => "BUY_BOUNCE",
            Strategy::BuyTrend => "BUY_TREND",
            Strategy::SellStrength => "SELL_STRENGTH",
            Strategy::MarkupEntry => "MARKUP_ENTRY",
        }
    }

    /// Sell-like alerts only make sense for tickers we hold.
    pub fn is_sell_like(&self) -> bool {
        matches!(self, Strategy::SellStrength)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Strategy::BuyBounce => "Bounce / Oversold",
            Strategy::BuyTrend => "Strong Trend",
            Strategy::SellStrength => "Euphoria / Overbought",
            Strategy::MarkupEntry => "Markup Entry",
        }
    }

    /// Evaluate the strategy on one snapshot. Undefined inputs never match.
    pub fn matches(&self, snap: &Snapshot, cfg: &ScreenerConfig) -> bool {
        let ind = &snap.indicators;
        let close = snap.close();
        match self {
            Strategy::BuyBounce => match (ind.gap_pct, ind.rsi, ind.vol_k) {
                (Some(gap), Some(rsi), Some(vol_k)) => {
                    gap <= cfg.bounce_max_gap_pct
                        && (cfg.bounce_rsi_min..=cfg.bounce_rsi_max).contains(&rsi)
                        && vol_k >= cfg.bounce_min_rel_volume
                }
                _ => false,
            },
            Strategy::BuyTrend => match (ind.adx, ind.ema_short, ind.ema_long, ind.macd_hist) {
                (Some(adx), Some(ema_s), Some(ema_l), Some(hist)) => {
                    adx >= cfg.trend_min_adx && ema_s > ema_l && close > ema_s && hist > 0.0
                }
                _ => false,
            },
            Strategy::SellStrength => ind.rsi.map_or(false, |rsi| rsi >= cfg.strength_min_rsi),
            Strategy::MarkupEntry => ind.bullish_entry,
        }
    }

    /// Presentation order of matches: strongest candidate first.
    fn rank(&self, a: &Snapshot, b: &Snapshot) -> Ordering {
        let key = |s: &Snapshot| match self {
            Strategy::BuyBounce => s.indicators.gap_pct,
            Strategy::BuyTrend => s.indicators.adx.map(|v| -v),
            Strategy::SellStrength => s.indicators.rsi.map(|v| -v),
            Strategy::MarkupEntry => s.indicators.strength_pct.map(|v| -v),
        };
        key(a)
            .partial_cmp(&key(b))
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.ticker().cmp(b.ticker()))
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Strategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Strategy::ALL
            .into_iter()
            .find(|st| st.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::Validation(format!("Unknown strategy: {}", s)))
    }
}

/// Which bars a screen evaluates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScreenScope {
    /// Most recent bar per ticker
    Latest,
    /// Every stored bar
    Full,
}

/// One strategy hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyMatch {
    pub ticker: String,
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,
    pub strategy: Strategy,
    pub close: f64,
}

/// Screener service
pub struct ScreenerService;

impl ScreenerService {
    /// Strategies enabled in settings, in configured order
    pub fn enabled_strategies(state: &AppState) -> Result<Vec<Strategy>> {
        state
            .settings
            .screener
            .strategies
            .iter()
            .map(|s| s.parse())
            .collect()
    }

    /// Run strategies on one timeframe, optionally restricted to a ticker set.
    ///
    /// Results are grouped by strategy in the given order.
    pub fn screen(
        state: &AppState,
        timeframe: Timeframe,
        strategies: &[Strategy],
        tickers: Option<&BTreeSet<String>>,
        scope: ScreenScope,
    ) -> Result<Vec<StrategyMatch>> {
        let mut snapshots = match scope {
            ScreenScope::Latest => state.duckdb.latest_snapshots(timeframe)?,
            ScreenScope::Full => state.duckdb.all_snapshots(timeframe)?,
        };
        if let Some(universe) = tickers {
            snapshots.retain(|s| universe.contains(s.ticker()));
        }

        let matches = evaluate(&snapshots, strategies, &state.settings.screener);
        info!(
            "ScreenerService::screen - {} on {} snapshots: {} matches",
            timeframe,
            snapshots.len(),
            matches.len()
        );
        Ok(matches)
    }
}

/// Evaluate strategies over snapshots; pure.
pub fn evaluate(
    snapshots: &[Snapshot],
    strategies: &[Strategy],
    cfg: &ScreenerConfig,
) -> Vec<StrategyMatch> {
    let mut out = Vec::new();
    for strategy in strategies {
        let mut hits: Vec<&Snapshot> = snapshots.iter().filter(|s| strategy.matches(s, cfg)).collect();
        hits.sort_by(|a, b| strategy.rank(a, b));
        debug!("   {}: {} hits", strategy, hits.len());

        out.extend(hits.into_iter().map(|s| StrategyMatch {
            ticker: s.ticker().to_string(),
            timeframe: s.indicators.timeframe,
            timestamp: s.bar.timestamp,
            strategy: *strategy,
            close: s.close(),
        }));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::duckdb::models::{Bar, IndicatorLabels, IndicatorRow};
    use crate::indicators::{Bias, Phase};
    use chrono::TimeZone;

    fn snapshot(ticker: &str, close: f64, set: impl FnOnce(&mut IndicatorRow)) -> Snapshot {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mut indicators = IndicatorRow::from_parts(
            ticker.to_string(),
            Timeframe::Daily,
            ts,
            [None; 32],
            IndicatorLabels {
                bias: Bias::Neutral,
                signal: None,
                phase: Phase::Transitional,
                previous_phase: None,
                days_in_phase: 1,
                phase_change: true,
                bullish_entry: false,
            },
        );
        set(&mut indicators);
        Snapshot {
            bar: Bar {
                ticker: ticker.to_string(),
                timestamp: ts,
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000,
            },
            indicators,
        }
    }

    #[test]
    fn test_strategy_codes() {
        for st in Strategy::ALL {
            assert_eq!(st.code().parse::<Strategy>().unwrap(), st);
        }
        assert_eq!("buy_trend".parse::<Strategy>().unwrap(), Strategy::BuyTrend);
        assert!("SELL_EVERYTHING".parse::<Strategy>().is_err());
        assert!(Strategy::SellStrength.is_sell_like());
        assert!(!Strategy::BuyBounce.is_sell_like());
    }

    #[test]
    fn test_buy_bounce_thresholds() {
        let cfg = ScreenerConfig::default();
        let hit = snapshot("AAA", 10.0, |r| {
            r.gap_pct = Some(-7.5);
            r.rsi = Some(35.0);
            r.vol_k = Some(1.4);
        });
        let shallow = snapshot("BBB", 10.0, |r| {
            r.gap_pct = Some(-3.0);
            r.rsi = Some(35.0);
            r.vol_k = Some(1.4);
        });
        let missing = snapshot("CCC", 10.0, |r| {
            r.gap_pct = Some(-9.0);
            r.rsi = None;
            r.vol_k = Some(1.4);
        });

        assert!(Strategy::BuyBounce.matches(&hit, &cfg));
        assert!(!Strategy::BuyBounce.matches(&shallow, &cfg));
        assert!(!Strategy::BuyBounce.matches(&missing, &cfg));
    }

    #[test]
    fn test_buy_trend_requires_close_above_short_ema() {
        let cfg = ScreenerConfig::default();
        let trend = |close: f64| {
            snapshot("AAA", close, |r| {
                r.adx = Some(31.0);
                r.ema_short = Some(100.0);
                r.ema_long = Some(90.0);
                r.macd_hist = Some(0.4);
            })
        };
        assert!(Strategy::BuyTrend.matches(&trend(105.0), &cfg));
        assert!(!Strategy::BuyTrend.matches(&trend(99.0), &cfg));
    }

    #[test]
    fn test_evaluate_groups_and_ranks() {
        let cfg = ScreenerConfig::default();
        let snaps = vec![
            snapshot("AAA", 10.0, |r| r.rsi = Some(72.0)),
            snapshot("BBB", 10.0, |r| r.rsi = Some(81.0)),
            snapshot("CCC", 10.0, |r| {
                r.rsi = Some(50.0);
                r.bullish_entry = true;
                r.phase = Phase::Markup;
            }),
        ];

        let matches = evaluate(
            &snaps,
            &[Strategy::SellStrength, Strategy::MarkupEntry],
            &cfg,
        );
        let got: Vec<(&str, Strategy)> = matches.iter().map(|m| (m.ticker.as_str(), m.strategy)).collect();
        assert_eq!(
            got,
            vec![
                ("BBB", Strategy::SellStrength),
                ("AAA", Strategy::SellStrength),
                ("CCC", Strategy::MarkupEntry),
            ]
        );
    }
}
