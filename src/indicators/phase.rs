//! Trend-stage classification and run-length annotation.
//!
//! Each bar gets one of four mutually exclusive labels from its close, a
//! short and a long simple average, the normalized slope of the long average
//! and the MACD histogram sign. Run metadata is then derived in one pass over
//! the whole label sequence, so a refresh never depends on previously stored
//! phase state.
//!
//! Both averages use a minimum-periods-of-one convention: short histories
//! still get a label, it is just statistically weak.

use super::ma::sma_min_periods;
use super::Series;
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    /// Stage 1 (accumulation) or stage 3 (distribution)
    Base,
    /// Stage 2
    Markup,
    /// Stage 4
    Markdown,
    Transitional,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Base => "BASE",
            Phase::Markup => "MARKUP",
            Phase::Markdown => "MARKDOWN",
            Phase::Transitional => "TRANSITIONAL",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BASE" => Ok(Phase::Base),
            "MARKUP" => Ok(Phase::Markup),
            "MARKDOWN" => Ok(Phase::Markdown),
            "TRANSITIONAL" => Ok(Phase::Transitional),
            other => Err(AppError::Validation(format!("Unknown phase: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PhaseParams {
    pub short_ma: usize,
    pub long_ma: usize,
    pub slope_window: usize,
    /// |slope| below this counts as flat
    pub flat_slope: f64,
    /// Max relative distance from the long average for a base
    pub band: f64,
}

impl Default for PhaseParams {
    fn default() -> Self {
        Self {
            short_ma: 50,
            long_ma: 200,
            slope_window: 40,
            flat_slope: 3e-4,
            band: 0.05,
        }
    }
}

/// Inputs of the classifier for one bar.
#[derive(Debug, Clone, Copy)]
pub struct PhaseInputs {
    pub close: f64,
    pub ma_short: Option<f64>,
    pub ma_long: Option<f64>,
    pub slope: Option<f64>,
    pub hist: Option<f64>,
}

pub fn classify(x: &PhaseInputs, params: &PhaseParams) -> Phase {
    let (Some(m1), Some(m2)) = (x.ma_short, x.ma_long) else {
        return Phase::Transitional;
    };
    let c = x.close;

    if let (Some(slope), Some(hist)) = (x.slope, x.hist) {
        if c > m1 && c > m2 && m1 > m2 && slope > 0.0 && hist > 0.0 {
            return Phase::Markup;
        }
        if c < m1 && c < m2 && m1 < m2 && slope < 0.0 && hist < 0.0 {
            return Phase::Markdown;
        }
    }

    if let Some(slope) = x.slope {
        if m2 != 0.0 && slope.abs() < params.flat_slope && (c - m2).abs() / m2.abs() < params.band {
            return Phase::Base;
        }
    }

    Phase::Transitional
}

/// Normalized change of `ma` over `window` bars.
pub fn normalized_slope(ma: &[Option<f64>], window: usize) -> Series {
    (0..ma.len())
        .map(|i| {
            if window == 0 || i < window {
                return None;
            }
            let cur = ma[i]?;
            let past = ma[i - window]?;
            Some((cur - past) / ((past + EPS) * window as f64))
        })
        .collect()
}

/// Run-length metadata of one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseRun {
    pub phase: Phase,
    pub phase_change: bool,
    pub run_id: usize,
    pub days_in_phase: usize,
    pub previous_phase: Option<Phase>,
    pub bullish_entry: bool,
}

pub fn annotate_runs(labels: &[Phase]) -> Vec<PhaseRun> {
    let mut out: Vec<PhaseRun> = Vec::with_capacity(labels.len());
    let mut run_id = 0usize;
    let mut days = 0usize;
    let mut previous: Option<Phase> = None;

    for (i, &phase) in labels.iter().enumerate() {
        let change = i == 0 || labels[i - 1] != phase;
        if change {
            if i > 0 {
                previous = Some(labels[i - 1]);
            }
            run_id += 1;
            days = 1;
        } else {
            days += 1;
        }

        out.push(PhaseRun {
            phase,
            phase_change: change,
            run_id,
            days_in_phase: days,
            previous_phase: previous,
            bullish_entry: phase == Phase::Markup && days == 1,
        });
    }
    out
}

/// Phase series for a bar history.
pub struct PhaseSeries {
    pub ma_short: Series,
    pub ma_long: Series,
    pub slope: Series,
    pub runs: Vec<PhaseRun>,
    /// (close / long average - 1) * 100
    pub strength_pct: Series,
}

pub fn phase_series(close: &[f64], hist: &[Option<f64>], params: &PhaseParams) -> PhaseSeries {
    let ma_short = sma_min_periods(close, params.short_ma, 1);
    let ma_long = sma_min_periods(close, params.long_ma, 1);
    let slope = normalized_slope(&ma_long, params.slope_window);

    let labels: Vec<Phase> = (0..close.len())
        .map(|i| {
            classify(
                &PhaseInputs {
                    close: close[i],
                    ma_short: ma_short[i],
                    ma_long: ma_long[i],
                    slope: slope[i],
                    hist: hist.get(i).copied().flatten(),
                },
                params,
            )
        })
        .collect();

    let strength_pct = close
        .iter()
        .zip(ma_long.iter())
        .map(|(c, m)| match m {
            Some(m) if *m != 0.0 => Some((c / m - 1.0) * 100.0),
            _ => None,
        })
        .collect();

    PhaseSeries {
        runs: annotate_runs(&labels),
        ma_short,
        ma_long,
        slope,
        strength_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markup_inputs() -> PhaseInputs {
        PhaseInputs {
            close: 120.0,
            ma_short: Some(110.0),
            ma_long: Some(100.0),
            slope: Some(0.001),
            hist: Some(0.4),
        }
    }

    #[test]
    fn test_classify_labels() {
        let params = PhaseParams::default();
        assert_eq!(classify(&markup_inputs(), &params), Phase::Markup);

        let down = PhaseInputs {
            close: 80.0,
            ma_short: Some(90.0),
            ma_long: Some(100.0),
            slope: Some(-0.001),
            hist: Some(-0.4),
        };
        assert_eq!(classify(&down, &params), Phase::Markdown);

        let flat = PhaseInputs {
            close: 102.0,
            ma_short: Some(101.0),
            ma_long: Some(100.0),
            slope: Some(0.0001),
            hist: Some(-0.1),
        };
        assert_eq!(classify(&flat, &params), Phase::Base);

        let mixed = PhaseInputs {
            hist: Some(-0.1),
            ..markup_inputs()
        };
        assert_eq!(classify(&mixed, &params), Phase::Transitional);

        let no_slope = PhaseInputs {
            slope: None,
            ..markup_inputs()
        };
        assert_eq!(classify(&no_slope, &params), Phase::Transitional);
    }

    #[test]
    fn test_five_markup_bars() {
        let labels = [Phase::Markup; 5];
        let runs = annotate_runs(&labels);
        let days: Vec<usize> = runs.iter().map(|r| r.days_in_phase).collect();
        let entries: Vec<bool> = runs.iter().map(|r| r.bullish_entry).collect();
        assert_eq!(days, vec![1, 2, 3, 4, 5]);
        assert_eq!(entries, vec![true, false, false, false, false]);
        assert!(runs.iter().all(|r| r.previous_phase.is_none()));
    }

    #[test]
    fn test_run_length_properties() {
        use Phase::*;
        let labels = [
            Transitional, Transitional, Markup, Markup, Base, Markup, Markup, Markup, Markdown,
        ];
        let runs = annotate_runs(&labels);

        for i in 0..labels.len() {
            let expected_days = if i > 0 && labels[i] == labels[i - 1] {
                runs[i - 1].days_in_phase + 1
            } else {
                1
            };
            assert_eq!(runs[i].days_in_phase, expected_days);
            assert_eq!(
                runs[i].bullish_entry,
                labels[i] == Markup && runs[i].days_in_phase == 1
            );
        }

        assert!(runs[0].phase_change);
        assert_eq!(runs[3].previous_phase, Some(Transitional));
        assert_eq!(runs[4].previous_phase, Some(Markup));
        assert_eq!(runs[7].previous_phase, Some(Base));
        assert_eq!(runs[8].previous_phase, Some(Markup));
        assert_eq!(runs[8].run_id, 5);
        assert!(runs[5].bullish_entry);
    }

    #[test]
    fn test_entry_on_first_bar() {
        let runs = annotate_runs(&[Phase::Markup, Phase::Base]);
        assert!(runs[0].bullish_entry);
        assert!(runs[0].phase_change);
        assert_eq!(runs[1].previous_phase, Some(Phase::Markup));
    }

    #[test]
    fn test_normalized_slope() {
        let ma: Vec<Option<f64>> = (0..5).map(|i| Some(100.0 + i as f64)).collect();
        let slope = normalized_slope(&ma, 2);
        assert_eq!(slope[1], None);
        let expected = 2.0 / ((100.0 + EPS) * 2.0);
        assert!((slope[2].unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_short_history_still_labeled() {
        let close: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let series = phase_series(&close, &vec![Some(0.1); 10], &PhaseParams::default());
        assert_eq!(series.runs.len(), 10);
        assert!(series.ma_long[0].is_some());
        // slope window not reached yet
        assert!(series.runs.iter().all(|r| r.phase == Phase::Transitional));
    }
}
