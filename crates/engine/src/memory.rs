use crate::error::{EngineError, ProviderError};
use crate::providers::{HistoricalDataStore, MarketFactorProvider, VolatilityIndexReader};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{MarketFactors, PricePoint, RawObservation, SeriesDefinition};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

/// A point-in-time dump of everything the pipeline reads, as loaded by the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketSnapshot {
    #[serde(default)]
    pub volatility_index: VolatilitySnapshot,
    #[serde(default)]
    pub symbols: Vec<SymbolSnapshot>,
    /// Economic series to standardize.
    #[serde(default)]
    pub series: Vec<SeriesSnapshot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolatilitySnapshot {
    pub current: Option<f64>,
    #[serde(default)]
    pub history: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolSnapshot {
    pub symbol: String,
    #[serde(default)]
    pub factors: MarketFactors,
    pub prices: Vec<PricePoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesSnapshot {
    pub definition: SeriesDefinition,
    pub observations: Vec<RawObservation>,
}

impl MarketSnapshot {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| EngineError::InvalidInput(format!("{}: {e}", path.as_ref().display())))?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// In-memory implementation of every market-data collaborator.
#[derive(Debug, Default)]
pub struct InMemoryMarketData {
    prices: RwLock<HashMap<String, Vec<PricePoint>>>,
    factors: RwLock<HashMap<String, MarketFactors>>,
    volatility: RwLock<VolatilitySnapshot>,
}

impl InMemoryMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn from_snapshot(snapshot: &MarketSnapshot) -> Self {
        let data = Self::new();
        for s in &snapshot.symbols {
            data.insert_history(&s.symbol, s.prices.clone()).await;
            data.set_factors(&s.symbol, s.factors).await;
        }
        *data.volatility.write().await = snapshot.volatility_index.clone();
        data
    }

    /// Replaces a symbol's history. Points are stored oldest first.
    pub async fn insert_history(&self, symbol: &str, mut points: Vec<PricePoint>) {
        points.sort_by_key(|p| p.timestamp);
        self.prices.write().await.insert(symbol.to_string(), points);
    }

    pub async fn set_factors(&self, symbol: &str, factors: MarketFactors) {
        self.factors.write().await.insert(symbol.to_string(), factors);
    }

    pub async fn set_volatility(&self, current: f64, history: Vec<f64>) {
        *self.volatility.write().await = VolatilitySnapshot {
            current: Some(current),
            history,
        };
    }
}

#[async_trait]
impl HistoricalDataStore for InMemoryMarketData {
    async fn fetch_history(&self, symbol: &str, lookback: usize) -> Result<Vec<PricePoint>, ProviderError> {
        let prices = self.prices.read().await;
        let points = prices
            .get(symbol)
            .ok_or_else(|| ProviderError::NotFound(symbol.to_string()))?;
        Ok(points[points.len().saturating_sub(lookback)..].to_vec())
    }

    async fn fetch_since(&self, symbol: &str, since: DateTime<Utc>) -> Result<Vec<PricePoint>, ProviderError> {
        let prices = self.prices.read().await;
        let points = prices
            .get(symbol)
            .ok_or_else(|| ProviderError::NotFound(symbol.to_string()))?;
        Ok(points.iter().filter(|p| p.timestamp >= since).copied().collect())
    }

    async fn last_updated(&self, symbol: &str) -> Result<Option<DateTime<Utc>>, ProviderError> {
        Ok(self
            .prices
            .read()
            .await
            .get(symbol)
            .and_then(|points| points.last())
            .map(|p| p.timestamp))
    }
}

#[async_trait]
impl MarketFactorProvider for InMemoryMarketData {
    async fn factors(&self, symbol: &str) -> Result<MarketFactors, ProviderError> {
        Ok(self.factors.read().await.get(symbol).copied().unwrap_or_default())
    }
}

#[async_trait]
impl VolatilityIndexReader for InMemoryMarketData {
    async fn current_level(&self) -> Result<f64, ProviderError> {
        self.volatility
            .read()
            .await
            .current
            .ok_or_else(|| ProviderError::Unavailable("no volatility index reading".to_string()))
    }

    async fn history(&self, lookback: usize) -> Result<Vec<f64>, ProviderError> {
        let volatility = self.volatility.read().await;
        let history = &volatility.history;
        Ok(history[history.len().saturating_sub(lookback)..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[tokio::test]
    async fn history_is_trimmed_to_the_lookback() {
        let data = InMemoryMarketData::new();
        let now = Utc::now();
        let points: Vec<PricePoint> = (0..10)
            .rev()
            .map(|i| PricePoint {
                timestamp: now - TimeDelta::days(i),
                value: 100.0 - i as f64,
            })
            .collect();
        data.insert_history("SPY", points).await;

        let recent = data.fetch_history("SPY", 3).await.unwrap();
        assert_eq!(recent.iter().map(|p| p.value).collect::<Vec<_>>(), vec![98.0, 99.0, 100.0]);
        assert_eq!(data.fetch_since("SPY", now - TimeDelta::days(4)).await.unwrap().len(), 5);
        assert_eq!(data.last_updated("SPY").await.unwrap(), Some(now));
        assert!(matches!(data.fetch_history("NOPE", 3).await, Err(ProviderError::NotFound(_))));
    }

    #[test]
    fn snapshot_parses_with_optional_sections() {
        let json = r#"{
            "volatility_index": { "current": 18.5 },
            "symbols": [
                { "symbol": "SPY", "prices": [ { "timestamp": "2024-05-01T00:00:00Z", "value": 510.2 } ] }
            ]
        }"#;
        let snapshot: MarketSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.volatility_index.current, Some(18.5));
        assert_eq!(snapshot.symbols[0].factors, MarketFactors::default());
        assert!(snapshot.series.is_empty());
    }
}
