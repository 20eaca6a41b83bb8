//! Bollinger bands and Donchian channels.

use super::ma::{rolling_max, rolling_min, rolling_std, sma};
use super::Series;

pub struct BollingerResult {
    pub upper: Series,
    pub middle: Series,
    pub lower: Series,
    /// (upper - lower) / middle, in percent
    pub bandwidth: Series,
    /// Position of close inside the bands, 0 at lower and 1 at upper
    pub percent_b: Series,
}

pub fn bollinger(close: &[f64], period: usize, std_factor: f64) -> BollingerResult {
    let middle = sma(close, period);
    let std = rolling_std(close, period);
    let n = close.len();

    let mut upper = vec![None; n];
    let mut lower = vec![None; n];
    let mut bandwidth = vec![None; n];
    let mut percent_b = vec![None; n];

    for i in 0..n {
        if let (Some(mid), Some(s)) = (middle[i], std[i]) {
            let up = mid + std_factor * s;
            let lo = mid - std_factor * s;
            upper[i] = Some(up);
            lower[i] = Some(lo);
            if mid != 0.0 {
                bandwidth[i] = Some((up - lo) / mid * 100.0);
            }
            if up > lo {
                percent_b[i] = Some((close[i] - lo) / (up - lo));
            }
        }
    }

    BollingerResult {
        upper,
        middle,
        lower,
        bandwidth,
        percent_b,
    }
}

pub struct DonchianResult {
    pub high: Series,
    pub low: Series,
    pub mid: Series,
}

pub fn donchian(high: &[f64], low: &[f64], period: usize) -> DonchianResult {
    let upper = rolling_max(high, period);
    let lower = rolling_min(low, period);
    let mid = upper
        .iter()
        .zip(lower.iter())
        .map(|(h, l)| Some(((*h)? + (*l)?) / 2.0))
        .collect();

    DonchianResult {
        high: upper,
        low: lower,
        mid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bollinger_flat_series() {
        let close = vec![10.0; 25];
        let bb = bollinger(&close, 20, 2.0);
        assert!(bb.upper[18].is_none());
        assert_eq!(bb.middle[24], Some(10.0));
        assert_eq!(bb.upper[24], Some(10.0));
        assert_eq!(bb.bandwidth[24], Some(0.0));
        // zero-width bands have no defined position
        assert_eq!(bb.percent_b[24], None);
    }

    #[test]
    fn test_bollinger_percent_b() {
        let close: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let bb = bollinger(&close, 20, 2.0);
        let pb = bb.percent_b[19].unwrap();
        assert!(pb > 0.5 && pb < 1.0);
        assert!(bb.upper[19].unwrap() > bb.middle[19].unwrap());
    }

    #[test]
    fn test_donchian() {
        let high = [5.0, 7.0, 6.0, 8.0];
        let low = [1.0, 2.0, 0.5, 3.0];
        let dc = donchian(&high, &low, 3);
        assert_eq!(dc.high[1], None);
        assert_eq!(dc.high[2], Some(7.0));
        assert_eq!(dc.low[3], Some(0.5));
        assert_eq!(dc.mid[3], Some(4.25));
    }
}
