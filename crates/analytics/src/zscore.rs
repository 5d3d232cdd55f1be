use crate::stats::{mean_and_std, median_absolute_deviation, safe_zscore, winsorize};
use configuration::ZScoreSettings;
use core_types::{FactorLoadings, Regime, VolatilityRegime, ZScoreMethod};

/// The outcome of a single robust z-score calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobustZScore {
    pub z: f64,
    pub method: ZScoreMethod,
    /// Mean (winsorized) or median (MAD) the value was measured against.
    pub center: f64,
    /// Standard deviation or scaled MAD the distance was divided by.
    pub scale: f64,
    /// Fraction of the history that was clipped as outliers.
    pub clipped_fraction: f64,
    pub points: usize,
}

impl RobustZScore {
    fn zero(method: ZScoreMethod, points: usize) -> Self {
        Self {
            z: 0.0,
            method,
            center: 0.0,
            scale: 0.0,
            clipped_fraction: 0.0,
            points,
        }
    }
}

/// Regime-aware z-score calculator.
///
/// Picks a winsorized mean/std estimator in calm markets and a median/MAD
/// estimator once volatility is elevated, then adjusts the raw score for the
/// symbol's factor exposure. Every path returns a finite number; thin or
/// degenerate histories produce a z-score of zero.
#[derive(Debug, Clone)]
pub struct RobustZScoreEngine {
    settings: ZScoreSettings,
}

impl RobustZScoreEngine {
    pub fn new(settings: ZScoreSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ZScoreSettings {
        &self.settings
    }

    /// MAD for stressed regimes or an index above the MAD threshold, winsorized otherwise.
    pub fn select_method(&self, regime: &VolatilityRegime) -> ZScoreMethod {
        if regime.regime.is_stressed() || regime.level > self.settings.mad_volatility_threshold {
            ZScoreMethod::Mad
        } else {
            ZScoreMethod::Winsorized
        }
    }

    pub fn calculate(&self, history: &[f64], current: f64, regime: &VolatilityRegime) -> RobustZScore {
        match self.select_method(regime) {
            ZScoreMethod::Mad => self.mad(history, current),
            _ => self.winsorized(history, current),
        }
    }

    pub fn winsorized(&self, history: &[f64], current: f64) -> RobustZScore {
        let points = history.len();
        if points < 2 {
            return RobustZScore::zero(ZScoreMethod::Winsorized, points);
        }
        let Some(clipped) = winsorize(history, self.settings.winsor_percentile) else {
            return RobustZScore::zero(ZScoreMethod::Winsorized, points);
        };
        let Some((mean, sd)) = mean_and_std(&clipped.values) else {
            return RobustZScore::zero(ZScoreMethod::Winsorized, points);
        };

        RobustZScore {
            z: safe_zscore(current, mean, sd),
            method: ZScoreMethod::Winsorized,
            center: mean,
            scale: sd,
            clipped_fraction: clipped.clipped_fraction(),
            points,
        }
    }

    pub fn mad(&self, history: &[f64], current: f64) -> RobustZScore {
        let points = history.len();
        if points < 2 {
            return RobustZScore::zero(ZScoreMethod::Mad, points);
        }
        let Some((median, mad)) = median_absolute_deviation(history) else {
            return RobustZScore::zero(ZScoreMethod::Mad, points);
        };
        let scale = self.settings.mad_scale * mad;

        RobustZScore {
            z: safe_zscore(current, median, scale),
            method: ZScoreMethod::Mad,
            center: median,
            scale,
            clipped_fraction: 0.0,
            points,
        }
    }

    /// Plain mean/std z-score. Used by the cheap fallback path.
    pub fn simple(history: &[f64], current: f64) -> RobustZScore {
        let points = history.len();
        match mean_and_std(history) {
            Some((mean, sd)) => RobustZScore {
                z: safe_zscore(current, mean, sd),
                method: ZScoreMethod::Simple,
                center: mean,
                scale: sd,
                clipped_fraction: 0.0,
                points,
            },
            None => RobustZScore::zero(ZScoreMethod::Simple, points),
        }
    }

    pub fn factor_blend(&self, loadings: &FactorLoadings) -> f64 {
        let w = &self.settings.factor_weights;
        w.market * loadings.market
            + w.momentum * loadings.momentum
            + w.volatility * loadings.volatility
            + w.sector * loadings.sector
    }

    /// `z / max(blend, floor)`.
    pub fn risk_adjust(&self, z: f64, loadings: &FactorLoadings) -> f64 {
        let blend = self.factor_blend(loadings);
        let divisor = if blend.is_finite() {
            blend.max(self.settings.factor_floor)
        } else {
            self.settings.factor_floor
        };
        z / divisor
    }

    /// Confidence (0-100) in a z-score built from `points` observations.
    ///
    /// Rises with history depth relative to `min_history` and `full_window`, and
    /// is penalised for stressed regimes and heavy outlier clipping.
    pub fn confidence(&self, points: usize, regime: Regime, clipped_fraction: f64) -> f64 {
        let s = &self.settings;
        let n = points as f64;
        let depth = (n / s.min_history.max(1) as f64).min(1.0);
        let coverage = (n / s.full_window.max(1) as f64).min(1.0);
        let regime_penalty = match regime {
            Regime::High => 10.0,
            Regime::Crisis => 20.0,
            Regime::Low | Regime::Normal => 0.0,
        };
        let clip_penalty = 50.0 * clipped_fraction.clamp(0.0, 1.0);

        (40.0 + 40.0 * depth + 15.0 * coverage - regime_penalty - clip_penalty)
            .clamp(s.confidence_floor, s.confidence_ceiling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::median;
    use core_types::{RegimeThresholds, ThresholdSource};
    use proptest::prelude::*;

    fn regime(regime: Regime, level: f64) -> VolatilityRegime {
        VolatilityRegime {
            regime,
            multiplier: 1.0,
            percentile: None,
            median: None,
            level,
            source: ThresholdSource::Static,
            thresholds: RegimeThresholds::default(),
        }
    }

    fn engine() -> RobustZScoreEngine {
        RobustZScoreEngine::new(ZScoreSettings::default())
    }

    fn repeating_history() -> Vec<f64> {
        [100.0, 101.0, 99.0, 102.0, 98.0, 103.0].repeat(10)
    }

    #[test]
    fn calm_regime_spike_is_large_and_finite() {
        let engine = engine();
        let history = repeating_history();
        let result = engine.calculate(&history, 150.0, &regime(Regime::Normal, 15.0));

        assert_eq!(result.method, ZScoreMethod::Winsorized);
        assert!(result.z.is_finite());
        assert!(result.z > 10.0);

        let confidence = engine.confidence(result.points, Regime::Normal, result.clipped_fraction);
        assert!(confidence >= 80.0, "confidence was {confidence}");
    }

    #[test]
    fn crisis_selects_mad_and_matches_independent_computation() {
        let engine = engine();
        let history = repeating_history();
        let result = engine.calculate(&history, 150.0, &regime(Regime::Crisis, 35.0));

        let med = median(&history).unwrap();
        let deviations: Vec<f64> = history.iter().map(|v| (v - med).abs()).collect();
        let mad = median(&deviations).unwrap();
        let expected = (150.0 - med) / (1.4826 * mad);

        assert_eq!(result.method, ZScoreMethod::Mad);
        assert!((result.z - expected).abs() < 1e-12);
    }

    #[test]
    fn index_above_threshold_selects_mad_even_in_normal_regime() {
        assert_eq!(engine().select_method(&regime(Regime::Normal, 31.0)), ZScoreMethod::Mad);
        assert_eq!(engine().select_method(&regime(Regime::Low, 10.0)), ZScoreMethod::Winsorized);
    }

    #[test]
    fn short_history_gives_zero() {
        let result = engine().calculate(&[42.0], 100.0, &regime(Regime::Normal, 15.0));
        assert_eq!(result.z, 0.0);
        assert_eq!(engine().mad(&[], 5.0).z, 0.0);
    }

    #[test]
    fn factor_floor_bounds_the_divisor() {
        let engine = engine();
        let weak = FactorLoadings {
            market: 0.0,
            momentum: 0.0,
            volatility: 0.0,
            sector: 0.0,
        };
        assert_eq!(engine.risk_adjust(2.0, &weak), 4.0);
        // Defaults blend to 0.4 + 0.0 + 0.2 + 0.1 = 0.7.
        assert!((engine.risk_adjust(1.4, &FactorLoadings::default()) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn confidence_stays_within_bounds_and_reacts_to_regime() {
        let engine = engine();
        assert_eq!(engine.confidence(0, Regime::Crisis, 1.0), 20.0);
        assert_eq!(engine.confidence(10_000, Regime::Low, 0.0), 95.0);
        assert!(engine.confidence(60, Regime::High, 0.0) < engine.confidence(60, Regime::Normal, 0.0));
    }

    proptest! {
        #[test]
        fn constant_history_always_scores_zero(
            level in -1.0e6f64..1.0e6,
            len in 2usize..300,
            current in -1.0e7f64..1.0e7,
            stressed in any::<bool>(),
        ) {
            let engine = engine();
            let history = vec![level; len];
            let r = if stressed { regime(Regime::Crisis, 40.0) } else { regime(Regime::Normal, 15.0) };
            let result = engine.calculate(&history, current, &r);
            prop_assert_eq!(result.z, 0.0);
            prop_assert_eq!(RobustZScoreEngine::simple(&history, current).z, 0.0);
        }

        #[test]
        fn z_is_always_finite(
            history in proptest::collection::vec(-1.0e6f64..1.0e6, 0..200),
            current in -1.0e6f64..1.0e6,
        ) {
            let engine = engine();
            let calm = engine.calculate(&history, current, &regime(Regime::Normal, 15.0));
            let crisis = engine.calculate(&history, current, &regime(Regime::Crisis, 40.0));
            prop_assert!(calm.z.is_finite());
            prop_assert!(crisis.z.is_finite());
        }
    }
}
