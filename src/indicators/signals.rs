//! Categorical labels derived from indicator values.
//!
//! `bias` is a slow trend label evaluated on a single bar. `signal` is
//! edge-triggered: it looks only at the current bar and the one before it,
//! so it can be recomputed for any bar without carried state.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Bias {
    Buy,
    Sell,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
}

impl Bias {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bias::Buy => "BUY",
            Bias::Sell => "SELL",
            Bias::Neutral => "NEUTRAL",
        }
    }
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
        }
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bias {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(Bias::Buy),
            "SELL" => Ok(Bias::Sell),
            "NEUTRAL" => Ok(Bias::Neutral),
            other => Err(AppError::Validation(format!("Unknown bias: {}", other))),
        }
    }
}

impl FromStr for Signal {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(Signal::Buy),
            "SELL" => Ok(Signal::Sell),
            other => Err(AppError::Validation(format!("Unknown signal: {}", other))),
        }
    }
}

/// Trend bias of one bar. Any undefined input gives `Neutral`.
pub fn bias(
    hist: Option<f64>,
    ema_short: Option<f64>,
    ema_long: Option<f64>,
    adx: Option<f64>,
    adx_threshold: f64,
) -> Bias {
    let (Some(hist), Some(short), Some(long), Some(adx)) = (hist, ema_short, ema_long, adx) else {
        return Bias::Neutral;
    };

    if adx <= adx_threshold {
        return Bias::Neutral;
    }
    if hist > 0.0 && short > long {
        Bias::Buy
    } else if hist < 0.0 && short < long {
        Bias::Sell
    } else {
        Bias::Neutral
    }
}

/// Histogram zero-cross confirmed by RSI on the crossing bar.
pub fn signal_at(
    hist: &[Option<f64>],
    rsi: &[Option<f64>],
    i: usize,
    oversold: f64,
    overbought: f64,
) -> Option<Signal> {
    if i == 0 || i >= hist.len() || i >= rsi.len() {
        return None;
    }
    let (prev, cur, r) = (hist[i - 1]?, hist[i]?, rsi[i]?);

    if prev <= 0.0 && cur > 0.0 && r < oversold {
        Some(Signal::Buy)
    } else if prev >= 0.0 && cur < 0.0 && r > overbought {
        Some(Signal::Sell)
    } else {
        None
    }
}

pub fn signals(
    hist: &[Option<f64>],
    rsi: &[Option<f64>],
    oversold: f64,
    overbought: f64,
) -> Vec<Option<Signal>> {
    (0..hist.len())
        .map(|i| signal_at(hist, rsi, i, oversold, overbought))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bias() {
        assert_eq!(bias(Some(0.5), Some(110.0), Some(100.0), Some(25.0), 20.0), Bias::Buy);
        assert_eq!(bias(Some(-0.5), Some(90.0), Some(100.0), Some(25.0), 20.0), Bias::Sell);
        assert_eq!(bias(Some(0.5), Some(110.0), Some(100.0), Some(15.0), 20.0), Bias::Neutral);
        assert_eq!(bias(Some(0.5), Some(90.0), Some(100.0), Some(30.0), 20.0), Bias::Neutral);
        assert_eq!(bias(None, Some(110.0), Some(100.0), Some(30.0), 20.0), Bias::Neutral);
    }

    #[test]
    fn test_buy_signal_fires_only_on_cross_bar() {
        // closes 100, 101, 99, 98; histogram turns positive on the fourth bar
        let hist = [Some(-0.3), Some(-0.2), Some(-0.1), Some(0.2)];
        let rsi = [Some(45.0), Some(40.0), Some(32.0), Some(28.0)];
        let out = signals(&hist, &rsi, 30.0, 70.0);
        assert_eq!(out, vec![None, None, None, Some(Signal::Buy)]);
    }

    #[test]
    fn test_cross_without_rsi_confirmation() {
        let hist = [Some(-0.1), Some(0.2)];
        let rsi = [Some(40.0), Some(45.0)];
        assert_eq!(signal_at(&hist, &rsi, 1, 30.0, 70.0), None);
    }

    #[test]
    fn test_sell_signal_and_undefined_inputs() {
        let hist = [Some(0.0), Some(-0.4), None, Some(0.3)];
        let rsi = [Some(75.0), Some(72.0), Some(60.0), Some(20.0)];
        let out = signals(&hist, &rsi, 30.0, 70.0);
        assert_eq!(out, vec![None, Some(Signal::Sell), None, None]);
    }

    #[test]
    fn test_round_trip_labels() {
        assert_eq!("NEUTRAL".parse::<Bias>().unwrap(), Bias::Neutral);
        assert_eq!(Signal::Sell.to_string().parse::<Signal>().unwrap(), Signal::Sell);
    }
}
