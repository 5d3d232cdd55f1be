use crate::error::StandardizationError;
use analytics::stats::{mean_and_std, safe_zscore};
use configuration::StandardizationSettings;
use core_types::{
    FeatureProvenance, FeatureRecord, LevelClass, MultiSignal, StandardObservation, TrendClass,
};

/// Builds Gold feature records from a Silver series.
///
/// A record for period `t` only ever reads periods strictly before `t` for its
/// rolling statistics, so adding later observations never changes it.
#[derive(Debug, Clone)]
pub struct RollingFeatureCalculator {
    settings: StandardizationSettings,
}

impl RollingFeatureCalculator {
    pub fn new(settings: StandardizationSettings) -> Self {
        Self { settings }
    }

    /// One record per period that has at least `window + 1` earlier periods.
    ///
    /// `observations` must belong to a single series and transform; they are
    /// ordered by period before use.
    pub fn compute(
        &self,
        observations: &[StandardObservation],
        window: usize,
    ) -> Result<Vec<FeatureRecord>, StandardizationError> {
        if window < 2 {
            return Err(StandardizationError::InvalidWindow(window));
        }

        let mut ordered: Vec<&StandardObservation> = observations.iter().collect();
        ordered.sort_by_key(|o| o.period_end);

        let levels: Vec<f64> = ordered.iter().map(|o| o.value).collect();
        // deltas[i] is the change into period i; period 0 has none.
        let deltas: Vec<f64> = std::iter::once(f64::NAN)
            .chain(levels.windows(2).map(|w| w[1] - w[0]))
            .collect();

        let mut records = Vec::with_capacity(ordered.len().saturating_sub(window + 1));
        for t in (window + 1)..ordered.len() {
            let target = ordered[t];
            let level_window = &levels[t - window..t];
            let delta_window = &deltas[t - window..t];

            let (Some((mean_level, sd_level)), Some((mean_delta, sd_delta))) =
                (mean_and_std(level_window), mean_and_std(delta_window))
            else {
                continue;
            };

            let value = levels[t];
            let delta = deltas[t];
            let level_z = safe_zscore(value, mean_level, sd_level);
            let change_z = safe_zscore(delta, mean_delta, sd_delta);
            let level_class = self.classify_level(level_z);
            let trend_class = self.classify_trend(change_z);

            records.push(FeatureRecord {
                series_id: target.series_id.clone(),
                period_end: target.period_end,
                transform: target.transform,
                window,
                value,
                delta,
                mean_level,
                sd_level,
                mean_delta,
                sd_delta,
                level_z,
                change_z,
                level_class,
                trend_class,
                multi_signal: multi_signal(level_class, trend_class),
                pipeline_version: self.settings.pipeline_version.clone(),
                provenance: FeatureProvenance {
                    window_start: ordered[t - window].period_end,
                    window_end: ordered[t - 1].period_end,
                    observations_used: window,
                    degraded_inputs: ordered[t - window..=t]
                        .iter()
                        .filter(|o| o.quality.is_degraded())
                        .count(),
                },
            });
        }

        Ok(records)
    }

    pub fn classify_level(&self, z: f64) -> LevelClass {
        let s = &self.settings;
        if z >= s.level_extreme_cut {
            LevelClass::ExtremeHigh
        } else if z >= s.level_elevated_cut {
            LevelClass::High
        } else if z <= -s.level_extreme_cut {
            LevelClass::ExtremeLow
        } else if z <= -s.level_elevated_cut {
            LevelClass::Low
        } else {
            LevelClass::Normal
        }
    }

    pub fn classify_trend(&self, z: f64) -> TrendClass {
        let s = &self.settings;
        if z >= s.trend_strong_cut {
            TrendClass::StrongUp
        } else if z >= s.trend_mild_cut {
            TrendClass::Up
        } else if z <= -s.trend_strong_cut {
            TrendClass::StrongDown
        } else if z <= -s.trend_mild_cut {
            TrendClass::Down
        } else {
            TrendClass::Flat
        }
    }
}

/// Composite reading of where a series is and which way it is moving.
pub fn multi_signal(level: LevelClass, trend: TrendClass) -> MultiSignal {
    use LevelClass as L;
    use TrendClass as T;

    match (level, trend) {
        (L::High | L::ExtremeHigh, T::Up | T::StrongUp) => MultiSignal::Overheating,
        (L::High | L::ExtremeHigh, T::Down | T::StrongDown) => MultiSignal::Cooling,
        (L::Low | L::ExtremeLow, T::Up | T::StrongUp) => MultiSignal::Recovering,
        (L::Low | L::ExtremeLow, T::Down | T::StrongDown) => MultiSignal::Deteriorating,
        (L::Normal, T::StrongUp) => MultiSignal::Accelerating,
        (L::Normal, T::StrongDown) => MultiSignal::Decelerating,
        _ => MultiSignal::Stable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Months, NaiveDate};
    use core_types::{DataQuality, Transform, Unit};
    use proptest::prelude::*;

    fn series(values: &[f64]) -> Vec<StandardObservation> {
        let start = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let period_start = start + Months::new(i as u32);
                StandardObservation {
                    series_id: "UNRATE".to_string(),
                    period_start,
                    period_end: period_start,
                    value: *v,
                    unit: Unit::PercentDecimal,
                    transform: Transform::Level,
                    scale: -2,
                    precision: 4,
                    quality: DataQuality::Exact,
                }
            })
            .collect()
    }

    fn calculator() -> RollingFeatureCalculator {
        RollingFeatureCalculator::new(StandardizationSettings::default())
    }

    #[test]
    fn first_record_needs_window_plus_one_prior_periods() {
        let obs = series(&(0..10).map(|i| (i % 3) as f64).collect::<Vec<_>>());
        let records = calculator().compute(&obs, 5).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].period_end, obs[6].period_end);
        assert_eq!(records[0].provenance.window_start, obs[1].period_end);
        assert_eq!(records[0].provenance.window_end, obs[5].period_end);
    }

    #[test]
    fn flat_window_gives_zero_scores() {
        let obs = series(&[4.0; 12]);
        let records = calculator().compute(&obs, 6).unwrap();
        assert!(records.iter().all(|r| r.level_z == 0.0 && r.change_z == 0.0));
        assert!(records.iter().all(|r| r.multi_signal == MultiSignal::Stable));
    }

    #[test]
    fn spike_after_calm_history_is_overheating() {
        let mut values: Vec<f64> = (0..12).map(|i| if i % 2 == 0 { 1.0 } else { 1.1 }).collect();
        values.push(3.0);
        let records = calculator().compute(&series(&values), 10).unwrap();
        let last = records.last().unwrap();
        assert_eq!(last.level_class, LevelClass::ExtremeHigh);
        assert_eq!(last.trend_class, TrendClass::StrongUp);
        assert_eq!(last.multi_signal, MultiSignal::Overheating);
    }

    #[test]
    fn later_periods_do_not_change_earlier_records() {
        let values: Vec<f64> = (0..20).map(|i| (i as f64 * 0.7).sin()).collect();
        let short = calculator().compute(&series(&values[..15]), 8).unwrap();
        let mut extended = values.clone();
        extended[19] = 1_000.0;
        let long = calculator().compute(&series(&extended), 8).unwrap();
        assert_eq!(short[..], long[..short.len()]);
    }

    #[test]
    fn window_below_two_is_rejected() {
        assert!(matches!(
            calculator().compute(&series(&[1.0, 2.0, 3.0]), 1),
            Err(StandardizationError::InvalidWindow(1))
        ));
    }

    #[test]
    fn signal_table() {
        assert_eq!(multi_signal(LevelClass::Low, TrendClass::Up), MultiSignal::Recovering);
        assert_eq!(multi_signal(LevelClass::ExtremeLow, TrendClass::StrongDown), MultiSignal::Deteriorating);
        assert_eq!(multi_signal(LevelClass::High, TrendClass::Down), MultiSignal::Cooling);
        assert_eq!(multi_signal(LevelClass::Normal, TrendClass::StrongDown), MultiSignal::Decelerating);
        assert_eq!(multi_signal(LevelClass::Normal, TrendClass::Up), MultiSignal::Stable);
        assert_eq!(multi_signal(LevelClass::High, TrendClass::Flat), MultiSignal::Stable);
    }

    proptest! {
        #[test]
        fn recomputation_is_bit_identical(
            values in proptest::collection::vec(-1.0e4f64..1.0e4, 0..80),
            window in 2usize..20,
        ) {
            let obs = series(&values);
            let first = calculator().compute(&obs, window).unwrap();
            let second = calculator().compute(&obs, window).unwrap();
            prop_assert_eq!(first.len(), values.len().saturating_sub(window + 1));
            for (a, b) in first.iter().zip(&second) {
                prop_assert_eq!(a.level_z.to_bits(), b.level_z.to_bits());
                prop_assert_eq!(a.change_z.to_bits(), b.change_z.to_bits());
                prop_assert_eq!(a, b);
            }
        }
    }
}
