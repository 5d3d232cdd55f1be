use crate::error::EngineError;
use analytics::{is_safe_for, RobustZScoreEngine, VolatilityRegimeDetector};
use chrono::Utc;
use configuration::{RegimeSettings, ZScoreSettings};
use core_types::{
    MarketFactors, Recommendation, SignalDirection, VolatilityRegime, ZScoreMethod, ZScoreResult,
};

/// Everything needed to score one symbol, fetched before dispatch.
///
/// Treated as an immutable snapshot once built.
#[derive(Debug, Clone)]
pub struct ScoreInput {
    pub symbol: String,
    /// Prior values, oldest first. Excludes `current`.
    pub history: Vec<f64>,
    pub current: f64,
    pub factors: MarketFactors,
    pub regime: VolatilityRegime,
    pub recommendation: Recommendation,
    /// Sufficiency confidence (0-1) used to scale DEGRADE results.
    pub sufficiency_confidence: f64,
}

/// The per-symbol computation the coordinator and the breaker wrap.
pub trait SymbolScorer: Send + Sync {
    fn score(&self, input: &ScoreInput) -> Result<ZScoreResult, EngineError>;

    /// A cheap, degraded answer for when `score` fails or cannot be attempted.
    fn fallback(&self, input: &ScoreInput) -> ZScoreResult;
}

pub struct ScoreCalculator {
    zscore: RobustZScoreEngine,
    regimes: VolatilityRegimeDetector,
}

impl ScoreCalculator {
    pub fn new(zscore: ZScoreSettings, regime: RegimeSettings) -> Self {
        Self {
            zscore: RobustZScoreEngine::new(zscore),
            regimes: VolatilityRegimeDetector::new(regime),
        }
    }

    pub fn regimes(&self) -> &VolatilityRegimeDetector {
        &self.regimes
    }

    pub fn zscore_engine(&self) -> &RobustZScoreEngine {
        &self.zscore
    }

    /// Mean-reversion direction for a risk-adjusted score.
    ///
    /// The threshold widens with the regime multiplier, and nothing is emitted
    /// in a regime that is unsafe for the configured strategy profile.
    pub fn signal(&self, risk_adjusted: f64, regime: &VolatilityRegime) -> SignalDirection {
        let settings = self.zscore.settings();
        if !is_safe_for(regime.regime, settings.strategy_profile) {
            return SignalDirection::Neutral;
        }
        let threshold = self
            .regimes
            .adjusted_threshold(settings.base_signal_threshold, regime.regime);
        if risk_adjusted >= threshold {
            SignalDirection::Short
        } else if risk_adjusted <= -threshold {
            SignalDirection::Long
        } else {
            SignalDirection::Neutral
        }
    }

    fn tail(history: &[f64], n: usize) -> &[f64] {
        &history[history.len().saturating_sub(n)..]
    }
}

impl SymbolScorer for ScoreCalculator {
    fn score(&self, input: &ScoreInput) -> Result<ZScoreResult, EngineError> {
        if !input.current.is_finite() {
            return Err(EngineError::InvalidInput(format!(
                "non-finite current value for '{}'",
                input.symbol
            )));
        }
        let settings = self.zscore.settings();
        let long = self.zscore.calculate(
            Self::tail(&input.history, settings.full_window),
            input.current,
            &input.regime,
        );
        let short = self.zscore.calculate(
            Self::tail(&input.history, settings.short_window),
            input.current,
            &input.regime,
        );

        let factors = input.factors.loadings();
        let risk_adjusted_signal = self.zscore.risk_adjust(long.z, &factors);

        let mut confidence = self
            .zscore
            .confidence(long.points, input.regime.regime, long.clipped_fraction);
        let degraded = input.recommendation == Recommendation::Degrade;
        if degraded {
            confidence *= input.sufficiency_confidence.clamp(0.0, 1.0);
        }

        Ok(ZScoreResult {
            symbol: input.symbol.clone(),
            z_short: short.z,
            z_long: long.z,
            factors,
            risk_adjusted_signal,
            confidence: confidence.clamp(0.0, 100.0),
            method: long.method,
            regime: input.regime.regime,
            recommendation: input.recommendation,
            signal: self.signal(risk_adjusted_signal, &input.regime),
            degraded,
            timestamp: Utc::now(),
        })
    }

    fn fallback(&self, input: &ScoreInput) -> ZScoreResult {
        let settings = self.zscore.settings();
        let z = RobustZScoreEngine::simple(Self::tail(&input.history, settings.short_window), input.current).z;
        let factors = input.factors.loadings();

        ZScoreResult {
            symbol: input.symbol.clone(),
            z_short: z,
            z_long: z,
            factors,
            risk_adjusted_signal: self.zscore.risk_adjust(z, &factors),
            confidence: settings.confidence_floor,
            method: ZScoreMethod::Simple,
            regime: input.regime.regime,
            recommendation: input.recommendation,
            signal: SignalDirection::Neutral,
            degraded: true,
            timestamp: Utc::now(),
        }
    }
}
