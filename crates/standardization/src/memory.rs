use crate::error::StandardizationError;
use crate::pipeline::SeriesRepository;
use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::{FeatureRecord, RawObservation, SeriesDefinition, StandardObservation, Transform};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

type StandardKey = (String, NaiveDate, Transform);
type FeatureKey = (String, NaiveDate, Transform, String);

/// A `SeriesRepository` held entirely in memory.
///
/// Used by the CLI's `standardize` command and by tests.
#[derive(Debug, Default)]
pub struct InMemorySeriesRepository {
    definitions: RwLock<HashMap<String, SeriesDefinition>>,
    raw: RwLock<Vec<RawObservation>>,
    standard: RwLock<BTreeMap<StandardKey, StandardObservation>>,
    features: RwLock<BTreeMap<FeatureKey, FeatureRecord>>,
}

impl InMemorySeriesRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_definition(&self, definition: SeriesDefinition) {
        self.definitions
            .write()
            .await
            .insert(definition.series_id.clone(), definition);
    }

    pub async fn append_raw(&self, observations: impl IntoIterator<Item = RawObservation>) {
        self.raw.write().await.extend(observations);
    }

    /// Silver rows for a series, ordered by period.
    pub async fn standard_observations(&self, series_id: &str) -> Vec<StandardObservation> {
        self.standard
            .read()
            .await
            .values()
            .filter(|o| o.series_id == series_id)
            .cloned()
            .collect()
    }

    /// Gold rows for a series, ordered by period.
    pub async fn feature_records(&self, series_id: &str) -> Vec<FeatureRecord> {
        self.features
            .read()
            .await
            .values()
            .filter(|r| r.series_id == series_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SeriesRepository for InMemorySeriesRepository {
    async fn series_definition(&self, series_id: &str) -> Result<Option<SeriesDefinition>, StandardizationError> {
        Ok(self.definitions.read().await.get(series_id).cloned())
    }

    async fn raw_observations(&self, series_id: &str) -> Result<Vec<RawObservation>, StandardizationError> {
        Ok(self
            .raw
            .read()
            .await
            .iter()
            .filter(|r| r.series_id == series_id)
            .cloned()
            .collect())
    }

    async fn upsert_standard(&self, observations: Vec<StandardObservation>) -> Result<usize, StandardizationError> {
        let mut store = self.standard.write().await;
        let written = observations.len();
        for o in observations {
            store.insert(o.key(), o);
        }
        Ok(written)
    }

    async fn upsert_features(&self, records: Vec<FeatureRecord>) -> Result<usize, StandardizationError> {
        let mut store = self.features.write().await;
        let written = records.len();
        for r in records {
            store.insert(r.key(), r);
        }
        Ok(written)
    }
}
