use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
pub use settings::{
    BreakerSettings, CacheSettings, CheckWeights, Config, FactorWeights, LoggingSettings,
    OrchestratorSettings, ParallelSettings, RegimeMultipliers, RegimeSettings,
    StandardizationSettings, SufficiencySettings, ZScoreSettings,
};

/// Loads the pipeline configuration from a toml file.
///
/// This function is the primary entry point for this crate. It reads the configuration file,
/// deserializes it into our strongly-typed `Config` struct, validates it, and returns it.
/// Sections and fields missing from the file take their documented defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path.as_ref()))
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}

impl Config {
    /// Rejects settings that would make the pipeline's arithmetic meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

        if self.standardization.default_window < 2 {
            return invalid("standardization.default_window must be at least 2");
        }
        if !(self.standardization.log_epsilon > 0.0) {
            return invalid("standardization.log_epsilon must be positive");
        }
        if self.standardization.level_elevated_cut > self.standardization.level_extreme_cut
            || self.standardization.trend_mild_cut > self.standardization.trend_strong_cut
        {
            return invalid("classification cut points must be ascending");
        }

        let z = &self.zscore;
        if !(z.winsor_percentile > 0.0 && z.winsor_percentile < 0.5) {
            return invalid("zscore.winsor_percentile must be in (0, 0.5)");
        }
        if (z.factor_weights.sum() - 1.0).abs() > 1e-6 {
            return invalid("zscore.factor_weights must sum to 1.0");
        }
        if !(z.factor_floor > 0.0) {
            return invalid("zscore.factor_floor must be positive");
        }
        if z.short_window < 2 || z.full_window < z.short_window || z.min_history == 0 {
            return invalid("zscore windows must satisfy 2 <= short_window <= full_window and min_history > 0");
        }
        if !(z.confidence_floor >= 0.0 && z.confidence_floor <= z.confidence_ceiling && z.confidence_ceiling <= 100.0) {
            return invalid("zscore confidence bounds must satisfy 0 <= floor <= ceiling <= 100");
        }

        let r = &self.regime;
        let t = r.static_thresholds;
        if !(t.low < t.normal && t.normal < t.high) {
            return invalid("regime.static_thresholds must be strictly ascending");
        }
        if !(0.0 < r.low_percentile
            && r.low_percentile <= r.median_percentile
            && r.median_percentile <= r.normal_percentile
            && r.normal_percentile < r.high_percentile
            && r.high_percentile < 100.0)
        {
            return invalid("regime percentiles must be ascending within (0, 100)");
        }

        let s = &self.sufficiency;
        if (s.weights.sum() - 1.0).abs() > 1e-6 {
            return invalid("sufficiency.weights must sum to 1.0");
        }
        if s.min_historical_points == 0 || s.min_features == 0 {
            return invalid("sufficiency minimums must be greater than 0");
        }
        if !(s.degrade_threshold <= s.sufficient_threshold && s.sufficient_threshold <= s.proceed_threshold) {
            return invalid("sufficiency thresholds must satisfy degrade <= sufficient <= proceed");
        }

        if self.parallel.max_workers == 0 {
            return invalid("parallel.max_workers must be greater than 0");
        }
        if self.breaker.failure_threshold == 0 || self.breaker.half_open_max_calls == 0 {
            return invalid("breaker thresholds must be greater than 0");
        }
        if self.cache.sweep_interval.is_zero() {
            return invalid("cache.sweep_interval must be greater than 0");
        }
        if self.orchestrator.monitoring_interval.is_zero() {
            return invalid("orchestrator.monitoring_interval must be greater than 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[zscore]
winsor_percentile = 0.1

[breaker]
cooldown = "5s"

[orchestrator]
watchlist = ["SPY", "QQQ"]
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.zscore.winsor_percentile, 0.1);
        assert_eq!(config.zscore.factor_floor, 0.5);
        assert_eq!(config.breaker.cooldown, Duration::from_secs(5));
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.orchestrator.watchlist, vec!["SPY", "QQQ"]);
        assert_eq!(config.cache.ttl, Duration::from_secs(300));
    }

    #[test]
    fn rejects_weights_that_do_not_sum_to_one() {
        let mut config = Config::default();
        config.sufficiency.weights.freshness = 0.5;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn rejects_a_window_the_feature_calculator_cannot_use() {
        let mut config = Config::default();
        config.standardization.default_window = 1;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
        config.standardization.default_window = 2;
        config.validate().unwrap();
    }

    #[test]
    fn rejects_zero_background_intervals() {
        let mut config = Config::default();
        config.cache.sweep_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.orchestrator.monitoring_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_winsor_percentile_out_of_range() {
        let mut config = Config::default();
        config.zscore.winsor_percentile = 0.5;
        assert!(config.validate().is_err());
    }
}
