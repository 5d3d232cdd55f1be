use crate::enums::{
    DataQuality, LevelClass, MultiSignal, Recommendation, Regime, SignalDirection,
    ThresholdSource, Transform, TrendClass, Unit, ZScoreMethod,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==============================================================================
// Bronze / Silver / Gold
// ==============================================================================

/// Reference data describing one logical economic series.
///
/// Maintained by an external catalog process; the pipeline only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesDefinition {
    pub series_id: String,
    pub display_name: String,
    pub category: String,
    /// The unit string raw observations usually arrive in (e.g. "percent", "billions").
    pub native_unit: String,
    pub standard_unit: Unit,
    pub default_transform: Transform,
    /// Rolling window for feature engineering; `None` uses the configured default.
    pub preferred_window: Option<usize>,
    pub seasonally_adjusted: bool,
}

/// A single value as published by the source (Bronze).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub series_id: String,
    pub period_end: NaiveDate,
    pub value: f64,
    pub unit: String,
}

/// A value converted to the series' canonical unit and transform (Silver).
///
/// Keyed by `(series_id, period_end, transform)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardObservation {
    pub series_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub value: f64,
    pub unit: Unit,
    pub transform: Transform,
    /// Power of ten applied to the raw value during unit conversion.
    pub scale: i32,
    pub precision: u8,
    pub quality: DataQuality,
}

impl StandardObservation {
    pub fn key(&self) -> (String, NaiveDate, Transform) {
        (self.series_id.clone(), self.period_end, self.transform)
    }
}

/// Deterministic lineage for a feature record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureProvenance {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub observations_used: usize,
    /// How many of the observations in the window carried a degraded quality flag.
    pub degraded_inputs: usize,
}

/// Rolling statistics and classifications for one period (Gold).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub series_id: String,
    pub period_end: NaiveDate,
    pub transform: Transform,
    pub window: usize,
    pub value: f64,
    pub delta: f64,
    pub mean_level: f64,
    pub sd_level: f64,
    pub mean_delta: f64,
    pub sd_delta: f64,
    pub level_z: f64,
    pub change_z: f64,
    pub level_class: LevelClass,
    pub trend_class: TrendClass,
    pub multi_signal: MultiSignal,
    pub pipeline_version: String,
    pub provenance: FeatureProvenance,
}

impl FeatureRecord {
    pub fn key(&self) -> (String, NaiveDate, Transform, String) {
        (
            self.series_id.clone(),
            self.period_end,
            self.transform,
            self.pipeline_version.clone(),
        )
    }
}

// ==============================================================================
// Market inputs
// ==============================================================================

/// One timestamped reading of a traded symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Market-factor context for a symbol. Every field is optional; missing
/// fields resolve to the documented defaults in [`MarketFactors::loadings`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketFactors {
    pub beta: Option<f64>,
    pub momentum: Option<f64>,
    pub volatility: Option<f64>,
    pub sector_beta: Option<f64>,
}

impl MarketFactors {
    pub const DEFAULT_BETA: f64 = 1.0;
    pub const DEFAULT_MOMENTUM: f64 = 0.0;
    pub const DEFAULT_VOLATILITY: f64 = 1.0;
    pub const DEFAULT_SECTOR_BETA: f64 = 1.0;

    /// Resolves the optional fields into concrete loadings, ignoring non-finite inputs.
    pub fn loadings(&self) -> FactorLoadings {
        fn pick(v: Option<f64>, default: f64) -> f64 {
            v.filter(|x| x.is_finite()).unwrap_or(default)
        }
        FactorLoadings {
            market: pick(self.beta, Self::DEFAULT_BETA),
            momentum: pick(self.momentum, Self::DEFAULT_MOMENTUM),
            volatility: pick(self.volatility, Self::DEFAULT_VOLATILITY),
            sector: pick(self.sector_beta, Self::DEFAULT_SECTOR_BETA),
        }
    }
}

/// Resolved factor loadings used in the risk adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorLoadings {
    pub market: f64,
    pub momentum: f64,
    pub volatility: f64,
    pub sector: f64,
}

impl Default for FactorLoadings {
    fn default() -> Self {
        MarketFactors::default().loadings()
    }
}

// ==============================================================================
// Regime and z-score outputs
// ==============================================================================

/// Cut points between regimes: `low` is the upper bound of the low regime, etc.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeThresholds {
    pub low: f64,
    pub normal: f64,
    pub high: f64,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            low: 12.0,
            normal: 20.0,
            high: 30.0,
        }
    }
}

/// Classification of a single volatility-index reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolatilityRegime {
    pub regime: Regime,
    pub multiplier: f64,
    /// Empirical percentile (0-100) of the reading within the supplied sample.
    pub percentile: Option<f64>,
    /// Median of the supplied sample, when its percentiles set the thresholds.
    pub median: Option<f64>,
    pub level: f64,
    pub source: ThresholdSource,
    pub thresholds: RegimeThresholds,
}

/// The output of one z-score calculation for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZScoreResult {
    pub symbol: String,
    pub z_short: f64,
    pub z_long: f64,
    pub factors: FactorLoadings,
    pub risk_adjusted_signal: f64,
    /// 0-100.
    pub confidence: f64,
    pub method: ZScoreMethod,
    pub regime: Regime,
    pub recommendation: Recommendation,
    pub signal: SignalDirection,
    /// Set when the value came from a fallback path rather than the primary calculation.
    pub degraded: bool,
    pub timestamp: DateTime<Utc>,
}

impl ZScoreResult {
    /// A zero-signal, zero-confidence result for symbols that must not be scored.
    pub fn neutral(symbol: &str, regime: Regime, recommendation: Recommendation) -> Self {
        Self {
            symbol: symbol.to_string(),
            z_short: 0.0,
            z_long: 0.0,
            factors: FactorLoadings::default(),
            risk_adjusted_signal: 0.0,
            confidence: 0.0,
            method: ZScoreMethod::Simple,
            regime,
            recommendation,
            signal: SignalDirection::Neutral,
            degraded: true,
            timestamp: Utc::now(),
        }
    }
}

// ==============================================================================
// Sufficiency
// ==============================================================================

/// The outcome of one independent sufficiency check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub name: String,
    pub sufficient: bool,
    /// 0-1.
    pub confidence: f64,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SufficiencyMetadata {
    pub historical_points: usize,
    pub indicator_coverage: usize,
    pub last_update: Option<DateTime<Utc>>,
    pub quality_score: f64,
}

/// The Sufficiency Gate's combined verdict for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SufficiencyAssessment {
    pub symbol: String,
    pub sufficient: bool,
    pub missing: Vec<String>,
    /// 0-1.
    pub confidence: f64,
    pub recommendation: Recommendation,
    pub checks: Vec<CheckOutcome>,
    pub metadata: SufficiencyMetadata,
}

impl SufficiencyAssessment {
    /// A structured SKIP used when the assessment itself could not be produced.
    pub fn skip(symbol: &str, reason: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            sufficient: false,
            missing: vec![reason.to_string()],
            confidence: 0.0,
            recommendation: Recommendation::Skip,
            checks: Vec::new(),
            metadata: SufficiencyMetadata {
                historical_points: 0,
                indicator_coverage: 0,
                last_update: None,
                quality_score: 0.0,
            },
        }
    }

    pub fn should_skip(&self) -> bool {
        self.recommendation == Recommendation::Skip
    }
}
