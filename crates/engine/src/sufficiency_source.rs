use crate::providers::HistoricalDataStore;
use analytics::indicators::{feature_snapshot, indicator_snapshot};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use sufficiency::{SufficiencyError, SufficiencySource};

/// Feeds the Sufficiency Gate from a symbol's own price history.
///
/// Indicators and z-score-style features are derived on the fly from the
/// most recent `indicator_lookback` points.
pub struct HistorySufficiencySource {
    store: Arc<dyn HistoricalDataStore>,
    indicator_lookback: usize,
}

impl HistorySufficiencySource {
    pub fn new(store: Arc<dyn HistoricalDataStore>, indicator_lookback: usize) -> Self {
        Self {
            store,
            indicator_lookback,
        }
    }

    async fn recent_values(&self, symbol: &str) -> Result<Vec<f64>, SufficiencyError> {
        let points = self
            .store
            .fetch_history(symbol, self.indicator_lookback)
            .await
            .map_err(|e| SufficiencyError::Source(e.to_string()))?;
        Ok(points.into_iter().map(|p| p.value).collect())
    }
}

#[async_trait]
impl SufficiencySource for HistorySufficiencySource {
    async fn history_points(&self, symbol: &str, lookback_days: i64) -> Result<usize, SufficiencyError> {
        let since = Utc::now() - TimeDelta::days(lookback_days);
        let points = self
            .store
            .fetch_since(symbol, since)
            .await
            .map_err(|e| SufficiencyError::Source(e.to_string()))?;
        Ok(points.iter().filter(|p| p.value.is_finite()).count())
    }

    async fn indicator_values(&self, symbol: &str) -> Result<HashMap<String, Option<f64>>, SufficiencyError> {
        let values = self.recent_values(symbol).await?;
        let snapshot = indicator_snapshot(&values).map_err(|e| SufficiencyError::Indicators(e.to_string()))?;
        Ok(snapshot
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect())
    }

    async fn last_update(&self, symbol: &str) -> Result<Option<DateTime<Utc>>, SufficiencyError> {
        self.store
            .last_updated(symbol)
            .await
            .map_err(|e| SufficiencyError::Source(e.to_string()))
    }

    async fn available_features(&self, symbol: &str) -> Result<Vec<String>, SufficiencyError> {
        let values = self.recent_values(symbol).await?;
        Ok(feature_snapshot(&values)
            .into_iter()
            .filter(|(_, value)| value.is_some())
            .map(|(name, _)| name.to_string())
            .collect())
    }
}
