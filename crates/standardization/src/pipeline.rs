use crate::error::StandardizationError;
use crate::features::RollingFeatureCalculator;
use crate::transform::{MonthlyLevels, TransformEngine};
use crate::units::standardize;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use configuration::StandardizationSettings;
use core_types::{FeatureRecord, RawObservation, SeriesDefinition, StandardObservation, Transform};
use serde::Serialize;
use std::collections::BTreeMap;

/// Storage for the three data layers of a series.
///
/// Upserts are keyed (`StandardObservation::key`, `FeatureRecord::key`), so
/// writing the same rows twice leaves the store unchanged.
#[async_trait]
pub trait SeriesRepository: Send + Sync {
    async fn series_definition(&self, series_id: &str) -> Result<Option<SeriesDefinition>, StandardizationError>;

    async fn raw_observations(&self, series_id: &str) -> Result<Vec<RawObservation>, StandardizationError>;

    /// Returns how many rows were written.
    async fn upsert_standard(&self, observations: Vec<StandardObservation>) -> Result<usize, StandardizationError>;

    /// Returns how many rows were written.
    async fn upsert_features(&self, records: Vec<FeatureRecord>) -> Result<usize, StandardizationError>;
}

/// Summary of one `standardize_series` run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandardizationOutcome {
    pub success: bool,
    pub series_id: String,
    pub observations: usize,
    pub features: usize,
    /// Observations whose unit or transform could not be applied exactly.
    pub degraded: usize,
}

impl StandardizationOutcome {
    pub fn failed(series_id: &str) -> Self {
        Self {
            success: false,
            series_id: series_id.to_string(),
            observations: 0,
            features: 0,
            degraded: 0,
        }
    }
}

/// A Silver observation plus whether its transform fell back to LEVEL.
#[derive(Debug, Clone, PartialEq)]
pub struct SilverRow {
    pub observation: StandardObservation,
    pub transform_fallback: bool,
}

/// Drives a series through Bronze -> Silver -> Gold.
#[derive(Debug, Clone)]
pub struct SeriesStandardizer {
    settings: StandardizationSettings,
    transforms: TransformEngine,
    features: RollingFeatureCalculator,
}

impl SeriesStandardizer {
    pub fn new(settings: StandardizationSettings) -> Self {
        Self {
            transforms: TransformEngine::new(settings.log_epsilon),
            features: RollingFeatureCalculator::new(settings.clone()),
            settings,
        }
    }

    /// Recomputes every standardized observation and feature record for a series.
    ///
    /// Idempotent: re-running over unchanged raw data rewrites identical rows.
    #[tracing::instrument(skip(self, repo))]
    pub async fn standardize_series(
        &self,
        series_id: &str,
        repo: &dyn SeriesRepository,
    ) -> Result<StandardizationOutcome, StandardizationError> {
        let definition = repo
            .series_definition(series_id)
            .await?
            .ok_or_else(|| StandardizationError::UnknownSeries(series_id.to_string()))?;

        let raw = latest_per_period(repo.raw_observations(series_id).await?);
        let rows = self.to_silver(&definition, &raw);
        let degraded = rows.iter().filter(|r| r.observation.quality.is_degraded()).count();

        // Rows that fell back to LEVEL are excluded from the rolling windows.
        let comparable: Vec<StandardObservation> = rows
            .iter()
            .filter(|r| !r.transform_fallback)
            .map(|r| r.observation.clone())
            .collect();
        let window = definition.preferred_window.unwrap_or(self.settings.default_window);
        let features = self.features.compute(&comparable, window)?;

        let standard = rows.into_iter().map(|r| r.observation).collect();

        let observations = repo.upsert_standard(standard).await?;
        let feature_count = repo.upsert_features(features).await?;

        tracing::info!(
            series_id,
            observations,
            features = feature_count,
            degraded,
            window,
            "Series standardized"
        );

        Ok(StandardizationOutcome {
            success: true,
            series_id: series_id.to_string(),
            observations,
            features: feature_count,
            degraded,
        })
    }

    /// Converts ordered raw observations into the series' standard unit and transform.
    pub fn to_silver(&self, definition: &SeriesDefinition, raw: &[RawObservation]) -> Vec<SilverRow> {
        let target = definition.standard_unit;
        let transform = definition.default_transform;

        let levels: Vec<(&RawObservation, _)> = raw
            .iter()
            .filter(|r| {
                let finite = r.value.is_finite();
                if !finite {
                    tracing::warn!(series_id = %r.series_id, period_end = %r.period_end, "Skipping non-finite raw value");
                }
                finite
            })
            .map(|r| (r, standardize(r.value, &r.unit, target)))
            .collect();

        let mut lookup = MonthlyLevels::new();
        for (r, level) in &levels {
            lookup.insert(&definition.series_id, r.period_end, level.value);
        }

        levels
            .into_iter()
            .map(|(r, level)| {
                let out = self
                    .transforms
                    .apply(level.value, transform, r.period_end, &definition.series_id, &lookup);
                let observation = StandardObservation {
                    series_id: definition.series_id.clone(),
                    period_start: month_start(r.period_end),
                    period_end: r.period_end,
                    value: out.value,
                    unit: target,
                    transform,
                    scale: level.scale,
                    precision: precision_for(transform, target.precision_hint()),
                    quality: level.quality.worst(out.quality),
                };
                SilverRow {
                    observation,
                    transform_fallback: out.quality.is_degraded(),
                }
            })
            .collect()
    }
}

/// Keeps the last-released value for each period, ordered by period.
fn latest_per_period(raw: Vec<RawObservation>) -> Vec<RawObservation> {
    let mut by_period: BTreeMap<NaiveDate, RawObservation> = BTreeMap::new();
    for r in raw {
        by_period.insert(r.period_end, r);
    }
    by_period.into_values().collect()
}

fn month_start(period_end: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(period_end.year(), period_end.month(), 1).unwrap_or(period_end)
}

fn precision_for(transform: Transform, unit_hint: u8) -> u8 {
    match transform {
        Transform::Level => unit_hint,
        Transform::Yoy | Transform::Mom => 4,
        Transform::LogLevel => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemorySeriesRepository;
    use chrono::Months;
    use core_types::Unit;

    fn definition(id: &str, unit: Unit, transform: Transform, window: usize) -> SeriesDefinition {
        SeriesDefinition {
            series_id: id.to_string(),
            display_name: id.to_string(),
            category: "macro".to_string(),
            native_unit: "index".to_string(),
            standard_unit: unit,
            default_transform: transform,
            preferred_window: Some(window),
            seasonally_adjusted: true,
        }
    }

    fn monthly(id: &str, unit: &str, values: &[f64]) -> Vec<RawObservation> {
        let start = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| RawObservation {
                series_id: id.to_string(),
                period_end: start + Months::new(i as u32),
                value: *v,
                unit: unit.to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn yoy_series_runs_end_to_end_and_is_idempotent() {
        let repo = InMemorySeriesRepository::new();
        repo.add_definition(definition("CPI", Unit::IndexPoint, Transform::Yoy, 6)).await;
        let values: Vec<f64> = (0..30).map(|i| 250.0 * (1.0 + 0.003 * i as f64 + 0.001 * (i % 4) as f64)).collect();
        repo.append_raw(monthly("CPI", "index", &values)).await;

        let standardizer = SeriesStandardizer::new(StandardizationSettings::default());
        let first = standardizer.standardize_series("CPI", &repo).await.unwrap();

        assert!(first.success);
        assert_eq!(first.observations, 30);
        // The first year has no prior-year month to compare against.
        assert_eq!(first.degraded, 12);
        assert_eq!(first.features, 18 - 7);

        let silver = repo.standard_observations("CPI").await;
        assert!(silver.iter().all(|o| o.unit == Unit::IndexPoint && o.transform == Transform::Yoy));
        let expected = values[12] / values[0] - 1.0;
        assert!((silver[12].value - expected).abs() < 1e-12);

        let gold_before = repo.feature_records("CPI").await;
        let second = standardizer.standardize_series("CPI", &repo).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(repo.standard_observations("CPI").await, silver);
        assert_eq!(repo.feature_records("CPI").await, gold_before);
    }

    #[tokio::test]
    async fn percent_series_keeps_latest_release_per_period() {
        let repo = InMemorySeriesRepository::new();
        repo.add_definition(definition("UNRATE", Unit::PercentDecimal, Transform::Level, 3)).await;
        repo.append_raw(monthly("UNRATE", "percent", &[3.5, 3.6, 3.7, 3.9, 4.0])).await;
        // A revision to the second period.
        let mut revision = monthly("UNRATE", "percent", &[0.0, 3.8]);
        repo.append_raw(revision.drain(1..)).await;

        let outcome = SeriesStandardizer::new(StandardizationSettings::default())
            .standardize_series("UNRATE", &repo)
            .await
            .unwrap();
        assert_eq!(outcome.observations, 5);
        assert_eq!(outcome.features, 1);

        let silver = repo.standard_observations("UNRATE").await;
        assert!((silver[1].value - 0.038).abs() < 1e-12);
        assert_eq!(silver[1].scale, -2);
        assert_eq!(silver[1].period_start, NaiveDate::from_ymd_opt(2020, 2, 1).unwrap());
    }

    #[tokio::test]
    async fn unknown_series_is_an_error() {
        let repo = InMemorySeriesRepository::new();
        let err = SeriesStandardizer::new(StandardizationSettings::default())
            .standardize_series("NOPE", &repo)
            .await
            .unwrap_err();
        assert!(matches!(err, StandardizationError::UnknownSeries(_)));
    }
}
