use crate::checks;
use crate::error::SufficiencyError;
use crate::source::SufficiencySource;
use chrono::{DateTime, Utc};
use configuration::SufficiencySettings;
use core_types::{CheckOutcome, Recommendation, SufficiencyAssessment, SufficiencyMetadata};

/// Decides whether a symbol has enough trustworthy data to be scored.
///
/// Four checks run concurrently and are combined into a weighted confidence.
/// A check that errors counts as a failed check with zero confidence, so the
/// gate always produces an assessment and never propagates the error.
#[derive(Debug, Clone)]
pub struct SufficiencyGate {
    settings: SufficiencySettings,
}

impl SufficiencyGate {
    pub fn new(settings: SufficiencySettings) -> Self {
        Self { settings }
    }

    pub async fn assess(&self, symbol: &str, source: &dyn SufficiencySource) -> SufficiencyAssessment {
        self.assess_at(symbol, source, Utc::now()).await
    }

    /// As [`assess`](Self::assess), measuring freshness against `now`.
    #[tracing::instrument(skip(self, source, now))]
    pub async fn assess_at(
        &self,
        symbol: &str,
        source: &dyn SufficiencySource,
        now: DateTime<Utc>,
    ) -> SufficiencyAssessment {
        let s = &self.settings;

        let (points, indicators, last_update, features) = tokio::join!(
            source.history_points(symbol, s.lookback_days),
            source.indicator_values(symbol),
            source.last_update(symbol),
            source.available_features(symbol),
        );

        let (depth, historical_points) = match points {
            Ok(count) => (
                checks::historical_depth(count, s.min_historical_points, s.lookback_days),
                count,
            ),
            Err(e) => (failed(symbol, checks::HISTORICAL_DEPTH, e), 0),
        };

        let (completeness, indicator_coverage) = match indicators {
            Ok(values) => checks::indicator_completeness(&values, &s.required_indicators, s.min_indicator_coverage),
            Err(e) => (failed(symbol, checks::INDICATOR_COMPLETENESS, e), 0),
        };

        let (fresh, last_update) = match last_update {
            Ok(ts) => (
                checks::freshness(ts, now, s.staleness_threshold, s.freshness_floor),
                ts,
            ),
            Err(e) => (failed(symbol, checks::FRESHNESS, e), None),
        };

        let availability = match features {
            Ok(names) => checks::feature_availability(&names, s.min_features),
            Err(e) => failed(symbol, checks::FEATURE_AVAILABILITY, e),
        };

        let metadata = SufficiencyMetadata {
            historical_points,
            indicator_coverage,
            last_update,
            quality_score: 0.0,
        };

        let assessment = self.combine(symbol, vec![depth, completeness, fresh, availability], metadata);
        tracing::debug!(
            symbol,
            confidence = assessment.confidence,
            recommendation = %assessment.recommendation,
            missing = ?assessment.missing,
            "Sufficiency assessed"
        );
        assessment
    }

    /// Folds check outcomes into an assessment.
    ///
    /// `checks` are expected in the order historical depth, indicator
    /// completeness, freshness, feature availability; their confidences are
    /// weighted accordingly. Extra outcomes are reported but carry no weight.
    pub fn combine(
        &self,
        symbol: &str,
        checks: Vec<CheckOutcome>,
        mut metadata: SufficiencyMetadata,
    ) -> SufficiencyAssessment {
        let s = &self.settings;
        let weights = [
            s.weights.historical_depth,
            s.weights.indicator_completeness,
            s.weights.freshness,
            s.weights.feature_availability,
        ];

        let confidence = checks
            .iter()
            .zip(weights)
            .map(|(c, w)| w * c.confidence.clamp(0.0, 1.0))
            .sum::<f64>()
            .clamp(0.0, 1.0);

        let missing: Vec<String> = checks
            .iter()
            .filter(|c| !c.sufficient)
            .map(|c| c.name.clone())
            .collect();

        let recommendation = if confidence >= s.proceed_threshold && missing.is_empty() {
            Recommendation::Proceed
        } else if confidence >= s.degrade_threshold && missing.len() <= s.max_degrade_missing {
            Recommendation::Degrade
        } else {
            Recommendation::Skip
        };

        metadata.quality_score = confidence;

        SufficiencyAssessment {
            symbol: symbol.to_string(),
            sufficient: confidence >= s.sufficient_threshold,
            missing,
            confidence,
            recommendation,
            checks,
            metadata,
        }
    }
}

/// A zero-confidence outcome standing in for a check that could not run.
fn failed(symbol: &str, check: &str, error: SufficiencyError) -> CheckOutcome {
    tracing::warn!(symbol, check, error = %error, "Sufficiency check failed");
    CheckOutcome {
        name: check.to_string(),
        sufficient: false,
        confidence: 0.0,
        details: format!("check failed: {error}"),
    }
}
