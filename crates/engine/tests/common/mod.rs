#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use configuration::Config;
use core_types::PricePoint;
use engine::{
    Collaborators, HistoricalDataStore, InMemoryMarketData, ProviderError, ZScoreService,
};
use standardization::InMemorySeriesRepository;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub const PATTERN: [f64; 6] = [100.0, 101.0, 99.0, 102.0, 98.0, 103.0];

/// `PATTERN` repeated `n` times.
pub fn pattern(n: usize) -> Vec<f64> {
    PATTERN.repeat(n)
}

/// Daily points ending today, oldest first.
pub fn daily(values: &[f64]) -> Vec<PricePoint> {
    let now = Utc::now();
    let last = values.len() as i64 - 1;
    values
        .iter()
        .enumerate()
        .map(|(i, &value)| PricePoint {
            timestamp: now - TimeDelta::days(last - i as i64),
            value,
        })
        .collect()
}

/// A healthy history: the pattern followed by `current`.
pub fn history_with_current(repeats: usize, current: f64) -> Vec<PricePoint> {
    let mut values = pattern(repeats);
    values.push(current);
    daily(&values)
}

pub async fn market(volatility: f64) -> Arc<InMemoryMarketData> {
    let market = InMemoryMarketData::new();
    market.set_volatility(volatility, Vec::new()).await;
    Arc::new(market)
}

pub fn service(config: &Config, market: Arc<InMemoryMarketData>) -> ZScoreService {
    let collaborators = Collaborators::in_memory(market, Arc::new(InMemorySeriesRepository::new()));
    ZScoreService::new(config, collaborators).unwrap()
}

/// Wraps the in-memory store, counting the long history reads the scorer makes
/// and optionally failing them.
pub struct InstrumentedStore {
    inner: Arc<InMemoryMarketData>,
    /// Reads longer than this are scoring reads; shorter ones feed the gate.
    scoring_lookback: usize,
    pub scoring_reads: AtomicUsize,
    pub fail_scoring_reads: AtomicBool,
}

impl InstrumentedStore {
    pub fn new(inner: Arc<InMemoryMarketData>, scoring_lookback: usize) -> Self {
        Self {
            inner,
            scoring_lookback,
            scoring_reads: AtomicUsize::new(0),
            fail_scoring_reads: AtomicBool::new(false),
        }
    }

    pub fn reads(&self) -> usize {
        self.scoring_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistoricalDataStore for InstrumentedStore {
    async fn fetch_history(&self, symbol: &str, lookback: usize) -> Result<Vec<PricePoint>, ProviderError> {
        if lookback >= self.scoring_lookback {
            self.scoring_reads.fetch_add(1, Ordering::SeqCst);
            if self.fail_scoring_reads.load(Ordering::SeqCst) {
                return Err(ProviderError::Unavailable("history store offline".to_string()));
            }
        }
        self.inner.fetch_history(symbol, lookback).await
    }

    async fn fetch_since(&self, symbol: &str, since: DateTime<Utc>) -> Result<Vec<PricePoint>, ProviderError> {
        self.inner.fetch_since(symbol, since).await
    }

    async fn last_updated(&self, symbol: &str) -> Result<Option<DateTime<Utc>>, ProviderError> {
        self.inner.last_updated(symbol).await
    }
}

/// A service whose history reads go through `store`.
pub fn instrumented_service(config: &Config, market: Arc<InMemoryMarketData>, store: Arc<InstrumentedStore>) -> ZScoreService {
    let collaborators = Collaborators {
        history: store,
        factors: market.clone(),
        volatility: market,
        series: Arc::new(InMemorySeriesRepository::new()),
    };
    ZScoreService::new(config, collaborators).unwrap()
}

/// Median and MAD computed by sorting, independent of the analytics crate.
pub fn median_and_mad(values: &[f64]) -> (f64, f64) {
    fn median(v: &mut [f64]) -> f64 {
        v.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let n = v.len();
        if n % 2 == 0 {
            (v[n / 2 - 1] + v[n / 2]) / 2.0
        } else {
            v[n / 2]
        }
    }
    let mut sorted = values.to_vec();
    let center = median(&mut sorted);
    let mut deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    (center, median(&mut deviations))
}
