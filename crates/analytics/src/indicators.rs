//! Technical indicators and z-score-style features derived from a price series.
//!
//! The Sufficiency Gate uses these to judge how complete a symbol's analytic
//! inputs are. Each function returns `Ok(None)` when the series is too short
//! for that indicator to be meaningful.

use crate::error::AnalyticsError;
use crate::stats::{mean_and_std, safe_zscore};
use ta::indicators::{
    BollingerBands, MovingAverageConvergenceDivergence as Macd, RelativeStrengthIndex as Rsi,
    SimpleMovingAverage as Sma, StandardDeviation,
};
use ta::Next;

/// Trailing window shared by the z-score-style features.
pub const FEATURE_WINDOW: usize = 20;
/// Lag used by the momentum feature.
pub const MOMENTUM_LAG: usize = 10;

/// Names of every indicator [`indicator_snapshot`] reports.
pub const INDICATOR_NAMES: [&str; 6] = [
    "sma_20",
    "sma_50",
    "rsi_14",
    "macd_histogram",
    "bollinger_percent_b",
    "realized_volatility_20",
];

/// Names of every feature [`feature_snapshot`] reports.
pub const FEATURE_NAMES: [&str; 4] = [
    "price_zscore",
    "return_zscore",
    "volatility_zscore",
    "momentum_zscore",
];

fn ta_error(name: &str, e: impl std::fmt::Debug) -> AnalyticsError {
    AnalyticsError::InvalidParameters(format!("Failed to initialize {name}: {e:?}"))
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

pub fn sma(values: &[f64], period: usize) -> Result<Option<f64>, AnalyticsError> {
    let mut sma = Sma::new(period).map_err(|e| ta_error("SMA", e))?;
    if values.len() < period {
        return Ok(None);
    }
    let last = values.iter().fold(f64::NAN, |_, v| sma.next(*v));
    Ok(finite(last))
}

pub fn rsi(values: &[f64], period: usize) -> Result<Option<f64>, AnalyticsError> {
    let mut rsi = Rsi::new(period).map_err(|e| ta_error("RSI", e))?;
    if values.len() <= period {
        return Ok(None);
    }
    let last = values.iter().fold(f64::NAN, |_, v| rsi.next(*v));
    Ok(finite(last))
}

/// Standard 12/26/9 MACD histogram.
pub fn macd_histogram(values: &[f64]) -> Result<Option<f64>, AnalyticsError> {
    let mut macd = Macd::new(12, 26, 9).map_err(|e| ta_error("MACD", e))?;
    if values.len() < 26 + 9 {
        return Ok(None);
    }
    let mut histogram = f64::NAN;
    for v in values {
        histogram = macd.next(*v).histogram;
    }
    Ok(finite(histogram))
}

/// Position of the last value within its Bollinger Bands: 0 at the lower band, 1 at the upper.
pub fn bollinger_percent_b(values: &[f64], period: usize, multiplier: f64) -> Result<Option<f64>, AnalyticsError> {
    let mut bb = BollingerBands::new(period, multiplier).map_err(|e| ta_error("Bollinger Bands", e))?;
    let Some(&last) = values.last() else {
        return Ok(None);
    };
    if values.len() < period {
        return Ok(None);
    }
    let mut bands = None;
    for v in values {
        bands = Some(bb.next(*v));
    }
    Ok(bands.and_then(|b| {
        let width = b.upper - b.lower;
        // Flat bands: the price sits exactly on the average.
        if width.abs() < f64::EPSILON {
            Some(0.5)
        } else {
            finite((last - b.lower) / width)
        }
    }))
}

/// Simple period-over-period returns. Skips pairs whose base is zero.
pub fn returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

/// Standard deviation of the last `period` returns.
pub fn realized_volatility(values: &[f64], period: usize) -> Result<Option<f64>, AnalyticsError> {
    let mut sd = StandardDeviation::new(period).map_err(|e| ta_error("StandardDeviation", e))?;
    let rets = returns(values);
    if rets.len() < period {
        return Ok(None);
    }
    let last = rets.iter().fold(f64::NAN, |_, r| sd.next(*r));
    Ok(finite(last))
}

/// z-score of the last element of `series` against the `window` elements before it.
fn trailing_zscore(series: &[f64], window: usize) -> Option<f64> {
    if series.len() < window + 1 {
        return None;
    }
    let (&current, prior) = series.split_last()?;
    let (mean, sd) = mean_and_std(&prior[prior.len() - window..])?;
    Some(safe_zscore(current, mean, sd))
}

pub fn price_zscore(values: &[f64]) -> Option<f64> {
    trailing_zscore(values, FEATURE_WINDOW)
}

pub fn return_zscore(values: &[f64]) -> Option<f64> {
    trailing_zscore(&returns(values), FEATURE_WINDOW)
}

/// Current realised volatility against the realised volatility of the preceding windows.
pub fn volatility_zscore(values: &[f64]) -> Option<f64> {
    let rets = returns(values);
    if rets.len() < FEATURE_WINDOW {
        return None;
    }
    let rolling: Vec<f64> = rets
        .windows(FEATURE_WINDOW)
        .filter_map(|w| mean_and_std(w).map(|(_, sd)| sd))
        .collect();
    trailing_zscore(&rolling, FEATURE_WINDOW)
}

pub fn momentum_zscore(values: &[f64]) -> Option<f64> {
    if values.len() <= MOMENTUM_LAG {
        return None;
    }
    let momentum: Vec<f64> = values
        .iter()
        .zip(values.iter().skip(MOMENTUM_LAG))
        .filter(|(base, _)| **base != 0.0)
        .map(|(base, v)| v / base - 1.0)
        .collect();
    trailing_zscore(&momentum, FEATURE_WINDOW)
}

/// The latest value of each indicator in [`INDICATOR_NAMES`], `None` when unavailable.
pub fn indicator_snapshot(values: &[f64]) -> Result<Vec<(&'static str, Option<f64>)>, AnalyticsError> {
    Ok(vec![
        ("sma_20", sma(values, 20)?),
        ("sma_50", sma(values, 50)?),
        ("rsi_14", rsi(values, 14)?),
        ("macd_histogram", macd_histogram(values)?),
        ("bollinger_percent_b", bollinger_percent_b(values, 20, 2.0)?),
        ("realized_volatility_20", realized_volatility(values, 20)?),
    ])
}

/// The latest value of each feature in [`FEATURE_NAMES`], `None` when unavailable.
pub fn feature_snapshot(values: &[f64]) -> Vec<(&'static str, Option<f64>)> {
    vec![
        ("price_zscore", price_zscore(values)),
        ("return_zscore", return_zscore(values)),
        ("volatility_zscore", volatility_zscore(values)),
        ("momentum_zscore", momentum_zscore(values)),
    ]
}
