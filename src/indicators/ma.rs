//! Rolling primitives shared by the indicator implementations.
//!
//! All functions return one value per input bar; bars without enough history
//! yield `None` rather than an error.

use super::Series;

/// Simple moving average over a full window.
pub fn sma(values: &[f64], period: usize) -> Series {
    sma_min_periods(values, period, period)
}

/// Simple moving average that emits once `min_periods` values are available.
///
/// With `min_periods == 1` the first bars average over whatever history exists.
pub fn sma_min_periods(values: &[f64], period: usize, min_periods: usize) -> Series {
    let n = values.len();
    let mut out = vec![None; n];
    if period == 0 || min_periods == 0 {
        return out;
    }

    let mut sum = 0.0;
    for i in 0..n {
        sum += values[i];
        if i >= period {
            sum -= values[i - period];
        }
        let count = (i + 1).min(period);
        if count >= min_periods {
            out[i] = Some(sum / count as f64);
        }
    }
    out
}

/// Exponential moving average seeded with the SMA of the first `period` values.
pub fn ema(values: &[f64], period: usize) -> Series {
    let wrapped: Vec<Option<f64>> = values.iter().map(|v| Some(*v)).collect();
    ema_opt(&wrapped, period)
}

/// EMA over a series with a leading undefined region (e.g. a MACD line).
///
/// Seeding starts at the first defined value. A gap after seeding yields
/// `None` for that bar and carries the previous average forward.
pub fn ema_opt(values: &[Option<f64>], period: usize) -> Series {
    let alpha = 2.0 / (period as f64 + 1.0);
    smooth(values, period, alpha)
}

/// Wilder smoothing (alpha = 1/period), SMA seeded.
pub fn wilder(values: &[Option<f64>], period: usize) -> Series {
    let alpha = 1.0 / period.max(1) as f64;
    smooth(values, period, alpha)
}

fn smooth(values: &[Option<f64>], period: usize, alpha: f64) -> Series {
    let n = values.len();
    let mut out = vec![None; n];
    if period == 0 {
        return out;
    }

    let start = match values.iter().position(|v| v.is_some()) {
        Some(idx) => idx,
        None => return out,
    };

    let mut seed_sum = 0.0;
    let mut seen = 0usize;
    let mut prev: Option<f64> = None;

    for i in start..n {
        let v = match values[i] {
            Some(v) => v,
            None => continue,
        };
        match prev {
            None => {
                seed_sum += v;
                seen += 1;
                if seen == period {
                    let seed = seed_sum / period as f64;
                    prev = Some(seed);
                    out[i] = Some(seed);
                }
            }
            Some(p) => {
                let next = alpha * v + (1.0 - alpha) * p;
                prev = Some(next);
                out[i] = Some(next);
            }
        }
    }
    out
}

/// Population standard deviation over a full window.
pub fn rolling_std(values: &[f64], period: usize) -> Series {
    let n = values.len();
    let mut out = vec![None; n];
    if period == 0 || n < period {
        return out;
    }

    for i in (period - 1)..n {
        let window = &values[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
        out[i] = Some(var.sqrt());
    }
    out
}

pub fn rolling_max(values: &[f64], period: usize) -> Series {
    rolling_fold(values, period, f64::max)
}

pub fn rolling_min(values: &[f64], period: usize) -> Series {
    rolling_fold(values, period, f64::min)
}

fn rolling_fold(values: &[f64], period: usize, f: fn(f64, f64) -> f64) -> Series {
    let n = values.len();
    let mut out = vec![None; n];
    if period == 0 || n < period {
        return out;
    }
    for i in (period - 1)..n {
        let window = &values[i + 1 - period..=i];
        out[i] = window.iter().copied().reduce(f);
    }
    out
}

/// Rolling sum over a full window.
pub fn rolling_sum(values: &[f64], period: usize) -> Series {
    let n = values.len();
    let mut out = vec![None; n];
    if period == 0 {
        return out;
    }
    let mut sum = 0.0;
    for i in 0..n {
        sum += values[i];
        if i >= period {
            sum -= values[i - period];
        }
        if i + 1 >= period {
            out[i] = Some(sum);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Option<f64>, b: f64) -> bool {
        a.map(|a| (a - b).abs() < 1e-9).unwrap_or(false)
    }

    #[test]
    fn test_sma() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert!(approx(out[2], 2.0));
        assert!(approx(out[4], 4.0));
    }

    #[test]
    fn test_sma_min_periods_one() {
        let out = sma_min_periods(&[2.0, 4.0, 6.0, 8.0], 3, 1);
        assert!(approx(out[0], 2.0));
        assert!(approx(out[1], 3.0));
        assert!(approx(out[2], 4.0));
        assert!(approx(out[3], 6.0));
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        let out = ema(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(out[1], None);
        assert!(approx(out[2], 2.0));
        // alpha = 0.5
        assert!(approx(out[3], 3.0));
    }

    #[test]
    fn test_ema_opt_skips_leading_gap() {
        let out = ema_opt(&[None, None, Some(2.0), Some(4.0)], 2);
        assert_eq!(out[2], None);
        assert!(approx(out[3], 3.0));
    }

    #[test]
    fn test_rolling_std_population() {
        let out = rolling_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 8);
        assert!(approx(out[7], 2.0));
    }

    #[test]
    fn test_rolling_extremes_and_sum() {
        let v = [3.0, 1.0, 4.0, 1.0, 5.0];
        assert!(approx(rolling_max(&v, 3)[4], 5.0));
        assert!(approx(rolling_min(&v, 3)[3], 1.0));
        assert!(approx(rolling_sum(&v, 2)[1], 4.0));
        assert_eq!(rolling_max(&v, 6)[4], None);
    }
}
