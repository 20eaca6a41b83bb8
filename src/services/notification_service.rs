//! Notification Service
//!
//! The gate every detailed-scan match passes before it leaves as an alert:
//! duplicate suppression per (ticker, strategy, timeframe), sell-like
//! strategies restricted to holdings, and an append-only record of what
//! was actually delivered.

use crate::db::duckdb::models::NotificationRecord;
use crate::error::Result;
use crate::services::screener_service::Strategy;
use crate::state::AppState;
use crate::timeframe::Timeframe;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{error, info};

/// Candidate alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub ticker: String,
    pub strategy: Strategy,
    pub timeframe: Timeframe,
    pub price: f64,
    pub note: Option<String>,
}

/// What the gate did with an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateOutcome {
    Delivered,
    /// Same alert already sent within the cooldown window
    Cooldown,
    /// Sell-like alert for a ticker not held
    NotHeld,
    /// Sink rejected the message; nothing recorded
    Failed,
}

/// Notification service
pub struct NotificationService;

impl NotificationService {
    /// Pass one alert through the gate.
    ///
    /// Only store errors are returned; a failed delivery is an outcome.
    pub async fn notify(
        state: &AppState,
        alert: &Alert,
        holdings: &BTreeSet<String>,
        now: DateTime<Utc>,
    ) -> Result<GateOutcome> {
        let since = now - Duration::hours(state.settings.alerts.cooldown_hours);
        let recent = state.duckdb.count_notifications_since(
            &alert.ticker,
            alert.strategy.code(),
            alert.timeframe,
            since,
        )?;
        if recent > 0 {
            info!("Alert suppressed (cooldown): {} {} {}", alert.ticker, alert.strategy, alert.timeframe);
            return Ok(GateOutcome::Cooldown);
        }

        if alert.strategy.is_sell_like() && !holdings.contains(&alert.ticker) {
            info!("Alert suppressed (not held): {} {}", alert.ticker, alert.strategy);
            return Ok(GateOutcome::NotHeld);
        }

        let message = format_message(alert, state.settings.alerts.dashboard_url.as_deref());
        if let Err(e) = state.alerts.deliver(&message).await {
            error!("Alert delivery via {} failed: {}", state.alerts.name(), e);
            return Ok(GateOutcome::Failed);
        }

        state.duckdb.record_notification(&NotificationRecord {
            ticker: alert.ticker.clone(),
            strategy: alert.strategy.code().to_string(),
            timeframe: alert.timeframe,
            sent_at: now,
            price: alert.price,
        })?;

        info!("Alert sent via {}: {} {} {}", state.alerts.name(), alert.ticker, alert.strategy, alert.timeframe);
        Ok(GateOutcome::Delivered)
    }
}

/// Chat-ready alert text
pub fn format_message(alert: &Alert, dashboard_url: Option<&str>) -> String {
    let marker = if alert.strategy.is_sell_like() { "🔴" } else { "🟢" };

    let mut msg = format!("{} **SIGNAL DETECTED** {}\n", marker, marker);
    msg.push_str(&format!("**Ticker:** `{}`\n", alert.ticker));
    msg.push_str(&format!("**Strategy:** `{}` ({})\n", alert.strategy, alert.strategy.label()));
    msg.push_str(&format!("**Timeframe:** `{}`\n", alert.timeframe));
    msg.push_str(&format!("**Price:** `${:.2}`\n", alert.price));
    if let Some(note) = &alert.note {
        msg.push_str(&format!("**Note:** {}\n", note));
    }
    if let Some(url) = dashboard_url {
        msg.push_str(&format!("[Open in dashboard]({}?ticker={})", url.trim_end_matches('/'), alert.ticker));
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(strategy: Strategy, note: Option<&str>) -> Alert {
        Alert {
            ticker: "NVDA".to_string(),
            strategy,
            timeframe: Timeframe::Hourly,
            price: 912.456,
            note: note.map(str::to_string),
        }
    }

    #[test]
    fn test_format_message() {
        let msg = format_message(&alert(Strategy::BuyTrend, Some("Holding position")), None);
        assert!(msg.starts_with("🟢"));
        assert!(msg.contains("`NVDA`"));
        assert!(msg.contains("`BUY_TREND`"));
        assert!(msg.contains("`1h`"));
        assert!(msg.contains("`$912.46`"));
        assert!(msg.contains("**Note:** Holding position"));
        assert!(!msg.contains("dashboard"));
    }

    #[test]
    fn test_format_message_with_link() {
        let msg = format_message(&alert(Strategy::SellStrength, None), Some("http://nas:8000/screen/"));
        assert!(msg.starts_with("🔴"));
        assert!(msg.ends_with("(http://nas:8000/screen?ticker=NVDA)"));
        assert!(!msg.contains("Note"));
    }
}
