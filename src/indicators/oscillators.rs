//! RSI, MACD and the Wilder directional movement system.

use super::ma::{ema, ema_opt, wilder};
use super::Series;

/// Relative Strength Index with Wilder smoothing.
///
/// The first defined value sits at index `period`.
pub fn rsi(close: &[f64], period: usize) -> Series {
    let n = close.len();
    let mut gains = vec![None; n];
    let mut losses = vec![None; n];
    for i in 1..n {
        let change = close[i] - close[i - 1];
        gains[i] = Some(change.max(0.0));
        losses[i] = Some((-change).max(0.0));
    }

    let avg_gain = wilder(&gains, period);
    let avg_loss = wilder(&losses, period);

    avg_gain
        .iter()
        .zip(avg_loss.iter())
        .map(|(g, l)| match (g, l) {
            (Some(g), Some(l)) => Some(rsi_from_averages(*g, *l)),
            _ => None,
        })
        .collect()
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

pub struct MacdResult {
    pub line: Series,
    pub signal: Series,
    pub hist: Series,
}

pub fn macd(close: &[f64], fast: usize, slow: usize, signal: usize) -> MacdResult {
    let fast_ema = ema(close, fast);
    let slow_ema = ema(close, slow);

    let line: Series = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();
    let signal_line = ema_opt(&line, signal);
    let hist = line
        .iter()
        .zip(signal_line.iter())
        .map(|(m, s)| Some((*m)? - (*s)?))
        .collect();

    MacdResult {
        line,
        signal: signal_line,
        hist,
    }
}

/// Mean of the last three one-bar changes of the MACD histogram.
pub fn hist_slope3(hist: &[Option<f64>]) -> Series {
    let n = hist.len();
    let mut diffs = vec![None; n];
    for i in 1..n {
        diffs[i] = match (hist[i], hist[i - 1]) {
            (Some(a), Some(b)) => Some(a - b),
            _ => None,
        };
    }
    (0..n)
        .map(|i| {
            if i < 3 {
                return None;
            }
            let window = &diffs[i - 2..=i];
            let sum: Option<f64> = window.iter().copied().sum();
            sum.map(|s| s / 3.0)
        })
        .collect()
}

pub struct DmiResult {
    pub plus_di: Series,
    pub minus_di: Series,
    pub adx: Series,
}

#[inline]
fn true_range(high: f64, low: f64, prev_close: f64) -> f64 {
    let hl = (high - low).abs();
    let hc = (high - prev_close).abs();
    let lc = (low - prev_close).abs();
    hl.max(hc).max(lc)
}

/// Directional movement index (+DI, -DI, ADX), Wilder smoothed.
pub fn dmi(high: &[f64], low: &[f64], close: &[f64], period: usize) -> DmiResult {
    let n = high.len();
    let mut tr = vec![None; n];
    let mut plus_dm = vec![None; n];
    let mut minus_dm = vec![None; n];

    for i in 1..n {
        tr[i] = Some(true_range(high[i], low[i], close[i - 1]));

        let up_move = high[i] - high[i - 1];
        let down_move = low[i - 1] - low[i];
        plus_dm[i] = Some(if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        });
        minus_dm[i] = Some(if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        });
    }

    let atr = wilder(&tr, period);
    let smooth_plus = wilder(&plus_dm, period);
    let smooth_minus = wilder(&minus_dm, period);

    let mut plus_di = vec![None; n];
    let mut minus_di = vec![None; n];
    let mut dx = vec![None; n];

    for i in 0..n {
        if let (Some(atr_val), Some(p), Some(m)) = (atr[i], smooth_plus[i], smooth_minus[i]) {
            if atr_val > 0.0 {
                let pdi = 100.0 * p / atr_val;
                let mdi = 100.0 * m / atr_val;
                plus_di[i] = Some(pdi);
                minus_di[i] = Some(mdi);
                let sum = pdi + mdi;
                dx[i] = Some(if sum > 0.0 {
                    100.0 * (pdi - mdi).abs() / sum
                } else {
                    0.0
                });
            }
        }
    }

    DmiResult {
        plus_di,
        minus_di,
        adx: wilder(&dx, period),
    }
}
