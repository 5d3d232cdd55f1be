use crate::error::SufficiencyError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Everything the gate needs to know about a symbol's data.
#[async_trait]
pub trait SufficiencySource: Send + Sync {
    /// Number of observations in the trailing `lookback_days`.
    async fn history_points(&self, symbol: &str, lookback_days: i64) -> Result<usize, SufficiencyError>;

    /// Most recent value of each indicator the source knows about.
    async fn indicator_values(&self, symbol: &str) -> Result<HashMap<String, Option<f64>>, SufficiencyError>;

    async fn last_update(&self, symbol: &str) -> Result<Option<DateTime<Utc>>, SufficiencyError>;

    /// Names of the precomputed z-score-style features that have a value.
    async fn available_features(&self, symbol: &str) -> Result<Vec<String>, SufficiencyError>;
}
