use crate::error::ProviderError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{MarketFactors, PricePoint};

/// Ordered price history per symbol.
#[async_trait]
pub trait HistoricalDataStore: Send + Sync {
    /// The most recent `lookback` points, oldest first.
    async fn fetch_history(&self, symbol: &str, lookback: usize) -> Result<Vec<PricePoint>, ProviderError>;

    /// Every point at or after `since`, oldest first.
    async fn fetch_since(&self, symbol: &str, since: DateTime<Utc>) -> Result<Vec<PricePoint>, ProviderError>;

    async fn last_updated(&self, symbol: &str) -> Result<Option<DateTime<Utc>>, ProviderError>;
}

/// Beta, momentum, volatility and sector-beta context per symbol.
#[async_trait]
pub trait MarketFactorProvider: Send + Sync {
    async fn factors(&self, symbol: &str) -> Result<MarketFactors, ProviderError>;
}

/// Readings of a market volatility index.
#[async_trait]
pub trait VolatilityIndexReader: Send + Sync {
    async fn current_level(&self) -> Result<f64, ProviderError>;

    /// Up to `lookback` historical readings, oldest first.
    async fn history(&self, lookback: usize) -> Result<Vec<f64>, ProviderError>;
}
