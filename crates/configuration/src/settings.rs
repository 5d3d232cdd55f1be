use core_types::{RegimeThresholds, StrategyProfile};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// The root configuration structure for the entire pipeline.
///
/// Every section is optional in the toml file; omitted sections and fields
/// fall back to the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub standardization: StandardizationSettings,
    pub zscore: ZScoreSettings,
    pub regime: RegimeSettings,
    pub sufficiency: SufficiencySettings,
    pub parallel: ParallelSettings,
    pub breaker: BreakerSettings,
    pub cache: CacheSettings,
    pub orchestrator: OrchestratorSettings,
    pub logging: LoggingSettings,
}

/// Parameters for the Bronze -> Silver -> Gold standardization run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StandardizationSettings {
    /// Rolling window used when a series does not declare its own.
    pub default_window: usize,
    /// Stamped on every feature record; part of its idempotence key.
    pub pipeline_version: String,
    /// Lower clamp applied before taking a logarithm.
    pub log_epsilon: f64,
    /// |level_z| at or above this is EXTREME.
    pub level_extreme_cut: f64,
    /// |level_z| at or above this is HIGH/LOW.
    pub level_elevated_cut: f64,
    /// |change_z| at or above this is a STRONG move.
    pub trend_strong_cut: f64,
    /// |change_z| at or above this is a move at all.
    pub trend_mild_cut: f64,
}

impl Default for StandardizationSettings {
    fn default() -> Self {
        Self {
            default_window: 60,
            pipeline_version: "1.0.0".to_string(),
            log_epsilon: 1e-9,
            level_extreme_cut: 2.0,
            level_elevated_cut: 1.0,
            trend_strong_cut: 1.5,
            trend_mild_cut: 0.5,
        }
    }
}

/// Weights of the multi-factor blend. Must sum to 1.0.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct FactorWeights {
    pub market: f64,
    pub momentum: f64,
    pub volatility: f64,
    pub sector: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            market: 0.4,
            momentum: 0.3,
            volatility: 0.2,
            sector: 0.1,
        }
    }
}

impl FactorWeights {
    pub fn sum(&self) -> f64 {
        self.market + self.momentum + self.volatility + self.sector
    }
}

/// Parameters for the Robust Z-Score Engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ZScoreSettings {
    /// Tail fraction clipped on each side before computing mean/std.
    pub winsor_percentile: f64,
    /// Above this volatility-index level MAD is used whatever the regime.
    pub mad_volatility_threshold: f64,
    /// Consistency constant turning a MAD into a normal-equivalent sigma.
    pub mad_scale: f64,
    pub factor_weights: FactorWeights,
    /// Lower bound on the factor blend divisor.
    pub factor_floor: f64,
    /// Trailing points used for the short-window z-score.
    pub short_window: usize,
    /// Trailing points requested for the long-window z-score (one trading year).
    pub full_window: usize,
    /// Points needed before the history counts as complete for confidence.
    pub min_history: usize,
    pub confidence_floor: f64,
    pub confidence_ceiling: f64,
    /// |risk-adjusted signal| needed to emit a directional signal in a normal regime.
    pub base_signal_threshold: f64,
    /// The posture signals are generated for; unsafe regimes suppress them.
    pub strategy_profile: StrategyProfile,
}

impl Default for ZScoreSettings {
    fn default() -> Self {
        Self {
            winsor_percentile: 0.05,
            mad_volatility_threshold: 30.0,
            mad_scale: 1.4826,
            factor_weights: FactorWeights::default(),
            factor_floor: 0.5,
            short_window: 20,
            full_window: 252,
            min_history: 60,
            confidence_floor: 20.0,
            confidence_ceiling: 95.0,
            base_signal_threshold: 2.0,
            strategy_profile: StrategyProfile::Moderate,
        }
    }
}

/// Per-regime scaling multipliers.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RegimeMultipliers {
    pub low: f64,
    pub normal: f64,
    pub high: f64,
    pub crisis: f64,
}

impl Default for RegimeMultipliers {
    fn default() -> Self {
        Self {
            low: 0.8,
            normal: 1.0,
            high: 1.5,
            crisis: 2.0,
        }
    }
}

/// Parameters for the Volatility Regime Detector.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegimeSettings {
    pub static_thresholds: RegimeThresholds,
    /// Minimum historical sample before dynamic percentiles replace the static thresholds.
    pub min_dynamic_sample: usize,
    /// Percentiles (0-100) bounding the low, normal and high regimes.
    pub low_percentile: f64,
    pub median_percentile: f64,
    pub normal_percentile: f64,
    pub high_percentile: f64,
    pub multipliers: RegimeMultipliers,
    /// How many historical index readings to request for the dynamic thresholds.
    pub history_lookback: usize,
}

impl Default for RegimeSettings {
    fn default() -> Self {
        Self {
            static_thresholds: RegimeThresholds::default(),
            min_dynamic_sample: 100,
            low_percentile: 20.0,
            median_percentile: 50.0,
            normal_percentile: 80.0,
            high_percentile: 95.0,
            multipliers: RegimeMultipliers::default(),
            history_lookback: 252,
        }
    }
}

/// Weights of the four sufficiency checks. Must sum to 1.0.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct CheckWeights {
    pub historical_depth: f64,
    pub indicator_completeness: f64,
    pub freshness: f64,
    pub feature_availability: f64,
}

impl Default for CheckWeights {
    fn default() -> Self {
        Self {
            historical_depth: 0.3,
            indicator_completeness: 0.3,
            freshness: 0.2,
            feature_availability: 0.2,
        }
    }
}

impl CheckWeights {
    pub fn sum(&self) -> f64 {
        self.historical_depth + self.indicator_completeness + self.freshness + self.feature_availability
    }
}

/// Parameters for the Data Sufficiency Gate.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SufficiencySettings {
    pub lookback_days: i64,
    pub min_historical_points: usize,
    pub required_indicators: Vec<String>,
    pub min_indicator_coverage: f64,
    #[serde(with = "humantime_serde")]
    pub staleness_threshold: Duration,
    pub freshness_floor: f64,
    pub min_features: usize,
    pub weights: CheckWeights,
    pub sufficient_threshold: f64,
    pub proceed_threshold: f64,
    pub degrade_threshold: f64,
    pub max_degrade_missing: usize,
}

impl Default for SufficiencySettings {
    fn default() -> Self {
        Self {
            lookback_days: 90,
            min_historical_points: 60,
            required_indicators: [
                "sma_20",
                "sma_50",
                "rsi_14",
                "macd_histogram",
                "bollinger_percent_b",
                "realized_volatility_20",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            min_indicator_coverage: 0.75,
            staleness_threshold: Duration::from_secs(24 * 3600),
            freshness_floor: 0.3,
            min_features: 3,
            weights: CheckWeights::default(),
            sufficient_threshold: 0.7,
            proceed_threshold: 0.8,
            degrade_threshold: 0.5,
            max_degrade_missing: 2,
        }
    }
}

/// Parameters for the Parallel Execution Coordinator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParallelSettings {
    /// Upper bound on the worker pool; the pool never exceeds the available cores.
    pub max_workers: usize,
    #[serde(with = "humantime_serde")]
    pub batch_timeout: Duration,
    /// How many crashed workers a single batch may replace.
    pub max_worker_restarts: usize,
}

impl Default for ParallelSettings {
    fn default() -> Self {
        Self {
            max_workers: 4,
            batch_timeout: Duration::from_secs(30),
            max_worker_restarts: 3,
        }
    }
}

/// Parameters for the circuit breaker around the calculation path.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    #[serde(with = "humantime_serde")]
    pub cooldown: Duration,
    /// Concurrent trial calls admitted while half-open.
    pub half_open_max_calls: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
            half_open_max_calls: 1,
        }
    }
}

/// Parameters for the result cache.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    /// Recompute evicted symbols in the background.
    pub refresh_expired: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
            refresh_expired: true,
        }
    }
}

/// Parameters for the startup orchestrator and the steps it runs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    #[serde(with = "humantime_serde")]
    pub step_timeout: Duration,
    /// Symbols warmed up and preloaded into the cache at startup.
    pub watchlist: Vec<String>,
    #[serde(with = "humantime_serde")]
    pub monitoring_interval: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(30),
            watchlist: Vec::new(),
            monitoring_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` wins when set.
    pub level: String,
    /// When set, logs are also written to a daily-rolling file in this directory.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "signal-pipeline.log".to_string(),
        }
    }
}
