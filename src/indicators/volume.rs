//! Volume statistics: smoothers, OBV, Chaikin money flow and MFI.

use super::ma::{ema, rolling_sum, sma};
use super::Series;

pub fn volume_sma(volume: &[f64], period: usize) -> Series {
    sma(volume, period)
}

pub fn volume_ema(volume: &[f64], period: usize) -> Series {
    ema(volume, period)
}

/// On-balance volume, starting at zero on the first bar.
pub fn obv(close: &[f64], volume: &[f64]) -> Series {
    let mut out = Vec::with_capacity(close.len());
    let mut acc = 0.0;
    for i in 0..close.len() {
        if i > 0 {
            if close[i] > close[i - 1] {
                acc += volume[i];
            } else if close[i] < close[i - 1] {
                acc -= volume[i];
            }
        }
        out.push(Some(acc));
    }
    out
}

/// Chaikin money flow over `period` bars.
pub fn cmf(high: &[f64], low: &[f64], close: &[f64], volume: &[f64], period: usize) -> Series {
    let mfv: Vec<f64> = (0..close.len())
        .map(|i| {
            let range = high[i] - low[i];
            if range == 0.0 {
                0.0
            } else {
                ((close[i] - low[i]) - (high[i] - close[i])) / range * volume[i]
            }
        })
        .collect();

    let mfv_sum = rolling_sum(&mfv, period);
    let vol_sum = rolling_sum(volume, period);
    mfv_sum
        .iter()
        .zip(vol_sum.iter())
        .map(|(m, v)| match (m, v) {
            (Some(m), Some(v)) if *v > 0.0 => Some(m / v),
            _ => None,
        })
        .collect()
}

/// Money flow index over `period` typical-price changes.
pub fn mfi(high: &[f64], low: &[f64], close: &[f64], volume: &[f64], period: usize) -> Series {
    let n = close.len();
    let mut out = vec![None; n];
    if period == 0 || n <= period {
        return out;
    }

    let typical: Vec<f64> = (0..n).map(|i| (high[i] + low[i] + close[i]) / 3.0).collect();
    let mut pos = vec![0.0; n];
    let mut neg = vec![0.0; n];
    for i in 1..n {
        let flow = typical[i] * volume[i];
        if typical[i] > typical[i - 1] {
            pos[i] = flow;
        } else if typical[i] < typical[i - 1] {
            neg[i] = flow;
        }
    }

    for i in period..n {
        let p: f64 = pos[i + 1 - period..=i].iter().sum();
        let m: f64 = neg[i + 1 - period..=i].iter().sum();
        out[i] = Some(if m == 0.0 {
            if p == 0.0 {
                50.0
            } else {
                100.0
            }
        } else {
            100.0 - 100.0 / (1.0 + p / m)
        });
    }
    out
}

/// Volume relative to its moving average.
pub fn relative_volume(volume: &[f64], avg: &[Option<f64>]) -> Series {
    volume
        .iter()
        .zip(avg.iter())
        .map(|(v, a)| a.map(|a| v / (a + 1e-9)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obv() {
        let close = [10.0, 11.0, 10.5, 10.5, 12.0];
        let volume = [100.0, 200.0, 50.0, 80.0, 10.0];
        let out: Vec<f64> = obv(&close, &volume).into_iter().map(|v| v.unwrap()).collect();
        assert_eq!(out, vec![0.0, 200.0, 150.0, 150.0, 160.0]);
    }

    #[test]
    fn test_cmf_closes_at_high() {
        let high = [10.0; 5];
        let low = [8.0; 5];
        let close = [10.0; 5];
        let volume = [100.0; 5];
        let out = cmf(&high, &low, &close, &volume, 3);
        assert_eq!(out[1], None);
        assert_eq!(out[4], Some(1.0));
    }

    #[test]
    fn test_mfi_rising_prices() {
        let high: Vec<f64> = (0..20).map(|i| 11.0 + i as f64).collect();
        let low: Vec<f64> = (0..20).map(|i| 9.0 + i as f64).collect();
        let close: Vec<f64> = (0..20).map(|i| 10.0 + i as f64).collect();
        let volume = vec![1000.0; 20];
        let out = mfi(&high, &low, &close, &volume, 14);
        assert_eq!(out[13], None);
        assert_eq!(out[14], Some(100.0));
    }

    #[test]
    fn test_relative_volume() {
        let out = relative_volume(&[200.0, 50.0], &[None, Some(100.0)]);
        assert_eq!(out[0], None);
        assert!((out[1].unwrap() - 0.5).abs() < 1e-6);
    }
}
