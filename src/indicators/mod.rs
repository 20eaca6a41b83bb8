//! Technical indicators, trend bias/signal labels and phase classification.
//!
//! Everything here is pure: a bar history goes in, aligned values come out.
//! Bars without enough history produce `None`, never an error.

pub mod ma;
pub mod oscillators;
pub mod bands;
pub mod volume;
pub mod signals;
pub mod phase;

use crate::config::IndicatorsConfig;
use crate::db::duckdb::models::{Bar, IndicatorRow};
use crate::error::{AppError, Result};
use crate::timeframe::Timeframe;

pub use phase::{Phase, PhaseParams, PhaseRun};
pub use signals::{Bias, Signal};

/// One optional value per bar.
pub type Series = Vec<Option<f64>>;

impl From<&IndicatorsConfig> for PhaseParams {
    fn from(cfg: &IndicatorsConfig) -> Self {
        Self {
            short_ma: cfg.phase_short_ma,
            long_ma: cfg.phase_long_ma,
            slope_window: cfg.phase_slope_window,
            flat_slope: cfg.phase_flat_slope,
            band: cfg.phase_band,
        }
    }
}

/// Compute one indicator row per bar.
///
/// Bars must be strictly increasing in time with finite prices.
pub fn compute_rows(
    ticker: &str,
    timeframe: Timeframe,
    bars: &[Bar],
    cfg: &IndicatorsConfig,
) -> Result<Vec<IndicatorRow>> {
    validate_bars(ticker, bars)?;

    let n = bars.len();
    let open: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let high: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let low: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let close: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let vol: Vec<f64> = bars.iter().map(|b| b.volume as f64).collect();

    let rsi = oscillators::rsi(&close, cfg.rsi_period);
    let macd = oscillators::macd(&close, cfg.macd_fast, cfg.macd_slow, cfg.macd_signal);
    let macd_slope3 = oscillators::hist_slope3(&macd.hist);
    let dmi = oscillators::dmi(&high, &low, &close, cfg.adx_length);
    let ema_short = ma::ema(&close, cfg.ema_short);
    let ema_long = ma::ema(&close, cfg.ema_long);
    let bb = bands::bollinger(&close, cfg.bollinger_length, cfg.bollinger_stdev);
    let dc_short = bands::donchian(&high, &low, cfg.donchian_short);
    let dc_long = bands::donchian(&high, &low, cfg.donchian_long);
    let vol_sma = volume::volume_sma(&vol, cfg.volume_length);
    let vol_ema = volume::volume_ema(&vol, cfg.volume_length);
    let obv = volume::obv(&close, &vol);
    let cmf = volume::cmf(&high, &low, &close, &vol, cfg.cmf_length);
    let mfi = volume::mfi(&high, &low, &close, &vol, cfg.mfi_length);
    let vol_k = volume::relative_volume(&vol, &vol_sma);
    let signal = signals::signals(&macd.hist, &rsi, cfg.rsi_oversold, cfg.rsi_overbought);
    let phases = phase::phase_series(&close, &macd.hist, &PhaseParams::from(cfg));

    let mut rows = Vec::with_capacity(n);
    for i in 0..n {
        let prev_close = if i > 0 { Some(close[i - 1]) } else { None };
        let run = &phases.runs[i];

        rows.push(IndicatorRow {
            ticker: ticker.to_string(),
            timeframe,
            timestamp: bars[i].timestamp,
            rsi: rsi[i],
            macd: macd.line[i],
            macd_signal: macd.signal[i],
            macd_hist: macd.hist[i],
            macd_slope3: macd_slope3[i],
            ema_short: ema_short[i],
            ema_long: ema_long[i],
            ma_short: phases.ma_short[i],
            ma_long: phases.ma_long[i],
            bb_upper: bb.upper[i],
            bb_middle: bb.middle[i],
            bb_lower: bb.lower[i],
            bb_bandwidth: bb.bandwidth[i],
            bb_percent: bb.percent_b[i],
            adx: dmi.adx[i],
            di_plus: dmi.plus_di[i],
            di_minus: dmi.minus_di[i],
            donchian_high: dc_short.high[i],
            donchian_low: dc_short.low[i],
            donchian_mid: dc_short.mid[i],
            donchian_long_high: dc_long.high[i],
            donchian_long_low: dc_long.low[i],
            vol_sma: vol_sma[i],
            vol_ema: vol_ema[i],
            obv: obv[i],
            cmf: cmf[i],
            mfi: mfi[i],
            gap_pct: prev_close.and_then(|p| pct_change(open[i], p)),
            chg_pct: prev_close.and_then(|p| pct_change(close[i], p)),
            vol_k: vol_k[i],
            phase_slope: phases.slope[i],
            strength_pct: phases.strength_pct[i],
            bias: signals::bias(
                macd.hist[i],
                ema_short[i],
                ema_long[i],
                dmi.adx[i],
                cfg.bias_adx_threshold,
            ),
            signal: signal[i],
            phase: run.phase,
            previous_phase: run.previous_phase,
            days_in_phase: run.days_in_phase as i64,
            phase_change: run.phase_change,
            bullish_entry: run.bullish_entry,
        });
    }

    Ok(rows)
}

fn pct_change(value: f64, base: f64) -> Option<f64> {
    if base == 0.0 {
        None
    } else {
        Some((value - base) / base * 100.0)
    }
}

fn validate_bars(ticker: &str, bars: &[Bar]) -> Result<()> {
    for (i, bar) in bars.iter().enumerate() {
        if ![bar.open, bar.high, bar.low, bar.close].iter().all(|v| v.is_finite()) {
            return Err(AppError::Validation(format!(
                "{}: non-finite price at {}",
                ticker, bar.timestamp
            )));
        }
        if i > 0 && bars[i - 1].timestamp >= bar.timestamp {
            return Err(AppError::Validation(format!(
                "{}: bars not strictly increasing at {}",
                ticker, bar.timestamp
            )));
        }
    }
    Ok(())
}
