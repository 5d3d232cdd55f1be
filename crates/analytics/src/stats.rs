//! Descriptive statistics over `f64` slices.
//!
//! Nothing here mutates the caller's data. Functions that need ordering work
//! on a sorted copy, and percentile lookups take an already-sorted slice so
//! callers can sort once and query many times.

/// Relative tolerance below which a dispersion estimate is treated as zero.
const ZERO_SCALE_TOLERANCE: f64 = 1e-9;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Mean and sample (n - 1) standard deviation. Needs at least two points.
pub fn mean_and_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some((mean, variance.max(0.0).sqrt()))
}

/// A sorted copy with non-finite values removed.
pub fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Linear-interpolated percentile (`pct` in 0..=100) of an ascending slice.
pub fn percentile_sorted(sorted: &[f64], pct: f64) -> Option<f64> {
    if sorted.is_empty() || !pct.is_finite() {
        return None;
    }
    let pct = pct.clamp(0.0, 100.0);
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return Some(sorted[lower]);
    }
    let weight = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

pub fn median(values: &[f64]) -> Option<f64> {
    percentile_sorted(&sorted_finite(values), 50.0)
}

/// Share (0-100) of the sample at or below `value`.
pub fn empirical_percentile(sample: &[f64], value: f64) -> Option<f64> {
    let finite: Vec<f64> = sample.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || !value.is_finite() {
        return None;
    }
    let at_or_below = finite.iter().filter(|v| **v <= value).count();
    Some(at_or_below as f64 / finite.len() as f64 * 100.0)
}

/// Result of clipping a sample to a percentile band.
#[derive(Debug, Clone, PartialEq)]
pub struct Winsorized {
    pub values: Vec<f64>,
    pub lower: f64,
    pub upper: f64,
    /// How many values lay outside the band and were moved onto it.
    pub clipped: usize,
}

impl Winsorized {
    pub fn clipped_fraction(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.clipped as f64 / self.values.len() as f64
        }
    }
}

/// Clips values to the `[p, 1 - p]` percentile band (`p` as a fraction).
pub fn winsorize(values: &[f64], p: f64) -> Option<Winsorized> {
    let sorted = sorted_finite(values);
    let lower = percentile_sorted(&sorted, p * 100.0)?;
    let upper = percentile_sorted(&sorted, (1.0 - p) * 100.0)?;

    let mut clipped = 0;
    let values = sorted
        .iter()
        .map(|&v| {
            if v < lower {
                clipped += 1;
                lower
            } else if v > upper {
                clipped += 1;
                upper
            } else {
                v
            }
        })
        .collect();

    Some(Winsorized {
        values,
        lower,
        upper,
        clipped,
    })
}

/// Median and median absolute deviation from that median.
pub fn median_absolute_deviation(values: &[f64]) -> Option<(f64, f64)> {
    let center = median(values)?;
    let deviations: Vec<f64> = values
        .iter()
        .filter(|v| v.is_finite())
        .map(|v| (v - center).abs())
        .collect();
    let mad = median(&deviations)?;
    Some((center, mad))
}

/// `(value - center) / scale`, or 0 when the scale is effectively zero.
pub fn safe_zscore(value: f64, center: f64, scale: f64) -> f64 {
    if !value.is_finite() || !center.is_finite() || !scale.is_finite() {
        return 0.0;
    }
    if scale <= ZERO_SCALE_TOLERANCE * center.abs().max(1.0) {
        return 0.0;
    }
    (value - center) / scale
}
