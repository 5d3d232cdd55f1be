use crate::stats::{empirical_percentile, percentile_sorted, sorted_finite};
use configuration::RegimeSettings;
use core_types::{Regime, RegimeThresholds, StrategyProfile, ThresholdSource, VolatilityRegime};
use serde::Serialize;

/// Strategy posture suggested for a regime.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyRecommendation {
    pub regime: Regime,
    pub profile: StrategyProfile,
    pub rationale: String,
    pub threshold_multiplier: f64,
}

/// Classifies volatility-index readings into regimes.
///
/// Pure classification, no state is carried between readings. When a
/// historical sample of at least `min_dynamic_sample` readings is supplied,
/// the cut points come from its percentiles; otherwise the static thresholds
/// apply.
#[derive(Debug, Clone)]
pub struct VolatilityRegimeDetector {
    settings: RegimeSettings,
}

impl VolatilityRegimeDetector {
    pub fn new(settings: RegimeSettings) -> Self {
        Self { settings }
    }

    pub fn classify(&self, level: f64, history: Option<&[f64]>) -> VolatilityRegime {
        let sorted = history.map(sorted_finite).unwrap_or_default();

        let (thresholds, source, median) = match self.dynamic_thresholds(&sorted) {
            Some(dynamic) => (dynamic, ThresholdSource::Dynamic, self.median_reference(&sorted)),
            None => (self.settings.static_thresholds, ThresholdSource::Static, None),
        };

        let regime = if level.is_finite() {
            regime_for(level, &thresholds)
        } else {
            tracing::warn!(level, "Non-finite volatility reading; assuming a normal regime");
            Regime::Normal
        };

        VolatilityRegime {
            regime,
            multiplier: self.multiplier(regime),
            percentile: empirical_percentile(&sorted, level),
            median,
            level,
            source,
            thresholds,
        }
    }

    /// Percentile cut points from an ascending sample, or `None` when the sample
    /// is too small or too degenerate to separate the regimes.
    pub fn dynamic_thresholds(&self, sorted: &[f64]) -> Option<RegimeThresholds> {
        if sorted.len() < self.settings.min_dynamic_sample {
            return None;
        }
        let thresholds = RegimeThresholds {
            low: percentile_sorted(sorted, self.settings.low_percentile)?,
            normal: percentile_sorted(sorted, self.settings.normal_percentile)?,
            high: percentile_sorted(sorted, self.settings.high_percentile)?,
        };
        if thresholds.low < thresholds.normal && thresholds.normal < thresholds.high {
            Some(thresholds)
        } else {
            tracing::debug!(?thresholds, "Dynamic thresholds not ascending; using static thresholds");
            None
        }
    }

    /// Median of the sample, reported alongside the dynamic cut points.
    pub fn median_reference(&self, sorted: &[f64]) -> Option<f64> {
        percentile_sorted(sorted, self.settings.median_percentile)
    }

    pub fn multiplier(&self, regime: Regime) -> f64 {
        let m = &self.settings.multipliers;
        match regime {
            Regime::Low => m.low,
            Regime::Normal => m.normal,
            Regime::High => m.high,
            Regime::Crisis => m.crisis,
        }
    }

    pub fn recommend(&self, regime: Regime) -> StrategyRecommendation {
        let (profile, rationale) = match regime {
            Regime::Low => (
                StrategyProfile::Aggressive,
                "Volatility is subdued; mean-reversion signals are reliable and thresholds can be relaxed.",
            ),
            Regime::Normal => (
                StrategyProfile::Moderate,
                "Volatility is within its usual range; standard thresholds apply.",
            ),
            Regime::High => (
                StrategyProfile::Conservative,
                "Volatility is elevated; thresholds are widened and outlier-resistant statistics are used.",
            ),
            Regime::Crisis => (
                StrategyProfile::Conservative,
                "Crisis volatility; only the strongest signals are acted on.",
            ),
        };
        StrategyRecommendation {
            regime,
            profile,
            rationale: rationale.to_string(),
            threshold_multiplier: self.multiplier(regime),
        }
    }

    /// The signal threshold after scaling by the regime multiplier.
    pub fn adjusted_threshold(&self, base: f64, regime: Regime) -> f64 {
        base * self.multiplier(regime)
    }
}

/// Maps a level onto ascending thresholds: below `low` is Low, below `normal`
/// is Normal, below `high` is High, anything else is Crisis.
pub fn regime_for(level: f64, thresholds: &RegimeThresholds) -> Regime {
    if level < thresholds.low {
        Regime::Low
    } else if level < thresholds.normal {
        Regime::Normal
    } else if level < thresholds.high {
        Regime::High
    } else {
        Regime::Crisis
    }
}

/// Whether a strategy posture may trade in the given regime.
///
/// Crisis admits only conservative strategies; a high regime admits
/// conservative and moderate ones.
pub fn is_safe_for(regime: Regime, profile: StrategyProfile) -> bool {
    match regime {
        Regime::Crisis => profile == StrategyProfile::Conservative,
        Regime::High => profile <= StrategyProfile::Moderate,
        Regime::Low | Regime::Normal => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> VolatilityRegimeDetector {
        VolatilityRegimeDetector::new(RegimeSettings::default())
    }

    #[test]
    fn static_thresholds_partition_the_line() {
        let d = detector();
        assert_eq!(d.classify(11.9, None).regime, Regime::Low);
        assert_eq!(d.classify(12.0, None).regime, Regime::Normal);
        assert_eq!(d.classify(25.0, None).regime, Regime::High);
        assert_eq!(d.classify(30.0, None).regime, Regime::Crisis);
    }

    #[test]
    fn reading_of_35_is_crisis_with_double_multiplier() {
        let r = detector().classify(35.0, None);
        assert_eq!(r.regime, Regime::Crisis);
        assert_eq!(r.multiplier, 2.0);
        assert_eq!(r.source, ThresholdSource::Static);
        assert!(r.percentile.is_none());
    }

    #[test]
    fn small_sample_keeps_static_thresholds_but_reports_percentile() {
        let history: Vec<f64> = (1..=50).map(|v| v as f64).collect();
        let r = detector().classify(25.0, Some(&history));
        assert_eq!(r.source, ThresholdSource::Static);
        assert_eq!(r.percentile, Some(50.0));
        assert_eq!(r.median, None);
    }

    #[test]
    fn large_sample_switches_to_dynamic_percentiles() {
        // 1..=101 gives p20 = 21, p50 = 51, p80 = 81, p95 = 96.
        let history: Vec<f64> = (1..=101).map(|v| v as f64).collect();
        let d = detector();
        let r = d.classify(50.0, Some(&history));
        assert_eq!(r.source, ThresholdSource::Dynamic);
        assert_eq!(r.thresholds, RegimeThresholds { low: 21.0, normal: 81.0, high: 96.0 });
        assert_eq!(r.regime, Regime::Normal);
        assert_eq!(r.median, Some(51.0));
        assert_eq!(d.classify(97.0, Some(&history)).regime, Regime::Crisis);
        assert_eq!(d.classify(10.0, Some(&history)).regime, Regime::Low);
    }

    #[test]
    fn flat_sample_falls_back_to_static() {
        let history = vec![18.0; 150];
        let r = detector().classify(18.0, Some(&history));
        assert_eq!(r.source, ThresholdSource::Static);
        assert_eq!(r.regime, Regime::Normal);
    }

    #[test]
    fn caller_sample_is_left_untouched() {
        let history: Vec<f64> = (0..120).rev().map(|v| v as f64).collect();
        let before = history.clone();
        let _ = detector().classify(40.0, Some(&history));
        assert_eq!(history, before);
    }

    #[test]
    fn recommendations_follow_the_regime() {
        let d = detector();
        assert_eq!(d.recommend(Regime::Low).profile, StrategyProfile::Aggressive);
        assert_eq!(d.recommend(Regime::Normal).profile, StrategyProfile::Moderate);
        assert_eq!(d.recommend(Regime::Crisis).profile, StrategyProfile::Conservative);
        assert!(!d.recommend(Regime::High).rationale.is_empty());
        assert_eq!(d.adjusted_threshold(2.0, Regime::Crisis), 4.0);
    }

    #[test]
    fn crisis_only_admits_conservative_strategies() {
        assert!(is_safe_for(Regime::Crisis, StrategyProfile::Conservative));
        assert!(!is_safe_for(Regime::Crisis, StrategyProfile::Moderate));
        assert!(is_safe_for(Regime::High, StrategyProfile::Moderate));
        assert!(!is_safe_for(Regime::High, StrategyProfile::Aggressive));
        assert!(is_safe_for(Regime::Low, StrategyProfile::Aggressive));
    }
}
