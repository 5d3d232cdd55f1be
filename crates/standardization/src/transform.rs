use chrono::{Datelike, Months, NaiveDate};
use core_types::{DataQuality, Transform};
use std::collections::{BTreeMap, HashMap};

/// Source of already-standardized levels for earlier periods.
pub trait PriorValueLookup {
    /// The level recorded for `series_id` in the calendar month containing `period`.
    fn level_in_month(&self, series_id: &str, period: NaiveDate) -> Option<f64>;
}

/// Standardized levels indexed by calendar month.
#[derive(Debug, Clone, Default)]
pub struct MonthlyLevels {
    by_series: HashMap<String, BTreeMap<(i32, u32), f64>>,
}

impl MonthlyLevels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a level. A later insert for the same month replaces the earlier one.
    pub fn insert(&mut self, series_id: &str, period_end: NaiveDate, level: f64) {
        self.by_series
            .entry(series_id.to_string())
            .or_default()
            .insert((period_end.year(), period_end.month()), level);
    }
}

impl PriorValueLookup for MonthlyLevels {
    fn level_in_month(&self, series_id: &str, period: NaiveDate) -> Option<f64> {
        self.by_series
            .get(series_id)?
            .get(&(period.year(), period.month()))
            .copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformOutput {
    pub value: f64,
    pub quality: DataQuality,
}

/// Applies LEVEL / YOY / MOM / LOG_LEVEL to standardized levels.
#[derive(Debug, Clone)]
pub struct TransformEngine {
    log_epsilon: f64,
}

impl TransformEngine {
    pub fn new(log_epsilon: f64) -> Self {
        Self { log_epsilon }
    }

    /// Deterministic for a given lookup. Never fails: when a change transform
    /// cannot find a usable prior period it returns the level and marks the
    /// output degraded.
    pub fn apply(
        &self,
        value: f64,
        transform: Transform,
        period_end: NaiveDate,
        series_id: &str,
        lookup: &dyn PriorValueLookup,
    ) -> TransformOutput {
        match transform {
            Transform::Level => TransformOutput {
                value,
                quality: DataQuality::Exact,
            },
            Transform::LogLevel => TransformOutput {
                value: value.max(self.log_epsilon).ln(),
                quality: DataQuality::Exact,
            },
            Transform::Yoy | Transform::Mom => {
                let months = transform.lookback_months().unwrap_or(1);
                let prior = period_end
                    .checked_sub_months(Months::new(months))
                    .and_then(|p| lookup.level_in_month(series_id, p))
                    .filter(|p| *p != 0.0 && p.is_finite());

                match prior {
                    Some(prior) => TransformOutput {
                        value: value / prior - 1.0,
                        quality: DataQuality::Exact,
                    },
                    None => {
                        tracing::warn!(
                            series_id,
                            %period_end,
                            transform = %transform,
                            "No usable prior period; falling back to LEVEL"
                        );
                        TransformOutput {
                            value,
                            quality: DataQuality::Degraded,
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn yoy_uses_the_same_month_last_year() {
        let mut levels = MonthlyLevels::new();
        levels.insert("CPI", date(2023, 3, 31), 300.0);
        let out = TransformEngine::new(1e-9).apply(309.0, Transform::Yoy, date(2024, 3, 31), "CPI", &levels);
        assert!((out.value - 0.03).abs() < 1e-12);
        assert_eq!(out.quality, DataQuality::Exact);
    }

    #[test]
    fn mom_resolves_short_months() {
        let mut levels = MonthlyLevels::new();
        levels.insert("CPI", date(2024, 2, 29), 200.0);
        let out = TransformEngine::new(1e-9).apply(202.0, Transform::Mom, date(2024, 3, 31), "CPI", &levels);
        assert!((out.value - 0.01).abs() < 1e-12);
    }

    #[test]
    fn zero_prior_falls_back_to_level() {
        let mut levels = MonthlyLevels::new();
        levels.insert("X", date(2024, 1, 31), 0.0);
        let out = TransformEngine::new(1e-9).apply(5.0, Transform::Mom, date(2024, 2, 29), "X", &levels);
        assert_eq!(out.value, 5.0);
        assert!(out.quality.is_degraded());
    }

    #[test]
    fn log_level_clamps_non_positive_inputs() {
        let engine = TransformEngine::new(1e-9);
        let levels = MonthlyLevels::new();
        let out = engine.apply(0.0, Transform::LogLevel, date(2024, 1, 31), "X", &levels);
        assert!((out.value - 1e-9f64.ln()).abs() < 1e-12);
        let out = engine.apply(-4.0, Transform::LogLevel, date(2024, 1, 31), "X", &levels);
        assert!(out.value.is_finite());
    }

    proptest! {
        #[test]
        fn yoy_without_predecessor_equals_level(
            value in -1.0e9f64..1.0e9,
            year in 1990i32..2100,
            month in 1u32..=12,
        ) {
            let engine = TransformEngine::new(1e-9);
            let mut levels = MonthlyLevels::new();
            // Only the month one year ahead is known, never the one behind.
            levels.insert("S", date(year + 1, month, 1), 123.0);
            let period = date(year, month, 28);
            let yoy = engine.apply(value, Transform::Yoy, period, "S", &levels);
            let level = engine.apply(value, Transform::Level, period, "S", &levels);
            prop_assert_eq!(yoy.value, level.value);
            prop_assert!(yoy.quality.is_degraded());
        }
    }
}
