use crate::calculator::{ScoreCalculator, ScoreInput, SymbolScorer};
use crate::coordinator::ParallelCoordinator;
use crate::error::EngineError;
use crate::memory::InMemoryMarketData;
use crate::providers::{HistoricalDataStore, MarketFactorProvider, VolatilityIndexReader};
use crate::sufficiency_source::HistorySufficiencySource;
use configuration::Config;
use core_types::{Recommendation, SufficiencyAssessment, VolatilityRegime, ZScoreResult};
use futures::future::join_all;
use resilience::{BreakerSnapshot, CallSource, CircuitBreaker, LastGoodStore, TtlCache};
use serde::Serialize;
use standardization::{InMemorySeriesRepository, SeriesRepository, SeriesStandardizer, StandardizationOutcome};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use sufficiency::SufficiencyGate;

/// Points of recent history the sufficiency source derives indicators from.
/// Enough for the 50-period SMA and a settled MACD signal line.
const INDICATOR_LOOKBACK: usize = 120;

/// The external collaborators the service reads from.
#[derive(Clone)]
pub struct Collaborators {
    pub history: Arc<dyn HistoricalDataStore>,
    pub factors: Arc<dyn MarketFactorProvider>,
    pub volatility: Arc<dyn VolatilityIndexReader>,
    pub series: Arc<dyn SeriesRepository>,
}

impl Collaborators {
    pub fn in_memory(market: Arc<InMemoryMarketData>, series: Arc<InMemorySeriesRepository>) -> Self {
        Self {
            history: market.clone(),
            factors: market.clone(),
            volatility: market,
            series,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ZScoreOptions {
    /// Serve an unexpired cached result without recomputing.
    pub use_cache: bool,
    /// Route the request through the worker pool instead of the breaker.
    pub use_parallel: bool,
    /// Overrides the volatility-index reader.
    pub volatility_level: Option<f64>,
}

impl Default for ZScoreOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            use_parallel: false,
            volatility_level: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub breaker: BreakerSnapshot,
    pub cached_results: usize,
    pub last_good_results: usize,
}

/// The in-process contract the outer layers call.
///
/// Owns every piece of mutable shared state (breaker, result cache, last-good
/// store); nothing is process-global.
pub struct ZScoreService {
    collaborators: Collaborators,
    standardizer: SeriesStandardizer,
    gate: SufficiencyGate,
    sufficiency_source: HistorySufficiencySource,
    calculator: Arc<ScoreCalculator>,
    coordinator: ParallelCoordinator,
    breaker: CircuitBreaker,
    cache: Arc<TtlCache<String, ZScoreResult>>,
    last_good: LastGoodStore<String, ZScoreResult>,
    full_window: usize,
    regime_lookback: usize,
}

impl ZScoreService {
    pub fn new(config: &Config, collaborators: Collaborators) -> Result<Self, EngineError> {
        Ok(Self {
            standardizer: SeriesStandardizer::new(config.standardization.clone()),
            gate: SufficiencyGate::new(config.sufficiency.clone()),
            sufficiency_source: HistorySufficiencySource::new(collaborators.history.clone(), INDICATOR_LOOKBACK),
            calculator: Arc::new(ScoreCalculator::new(config.zscore.clone(), config.regime.clone())),
            coordinator: ParallelCoordinator::new(config.parallel.clone())?,
            breaker: CircuitBreaker::new("zscore", &config.breaker),
            cache: Arc::new(TtlCache::new(config.cache.ttl)),
            last_good: LastGoodStore::new(),
            full_window: config.zscore.full_window,
            regime_lookback: config.regime.history_lookback,
            collaborators,
        })
    }

    pub fn cache(&self) -> Arc<TtlCache<String, ZScoreResult>> {
        self.cache.clone()
    }

    /// Runs Bronze -> Silver -> Gold for one series. Never fails; a failed run
    /// is reported with `success: false`.
    pub async fn standardize_series(&self, series_id: &str) -> StandardizationOutcome {
        match self
            .standardizer
            .standardize_series(series_id, self.collaborators.series.as_ref())
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(series_id, error = %e, "Standardization failed");
                StandardizationOutcome::failed(series_id)
            }
        }
    }

    pub async fn assess_sufficiency(&self, symbol: &str) -> SufficiencyAssessment {
        self.gate.assess(symbol, &self.sufficiency_source).await
    }

    /// Classifies `level`, or the reader's current level when `None`.
    pub async fn current_regime(&self, level: Option<f64>) -> VolatilityRegime {
        let level = match level {
            Some(level) => level,
            None => match self.collaborators.volatility.current_level().await {
                Ok(level) => level,
                Err(e) => {
                    tracing::warn!(error = %e, "No volatility reading; assuming a normal regime");
                    f64::NAN
                }
            },
        };
        let history = match self.collaborators.volatility.history(self.regime_lookback).await {
            Ok(history) => Some(history),
            Err(e) => {
                tracing::debug!(error = %e, "No volatility history; using static thresholds");
                None
            }
        };
        self.calculator.regimes().classify(level, history.as_deref())
    }

    async fn fetch_input(
        &self,
        symbol: &str,
        regime: &VolatilityRegime,
        assessment: &SufficiencyAssessment,
    ) -> Result<ScoreInput, EngineError> {
        let (points, factors) = tokio::join!(
            self.collaborators.history.fetch_history(symbol, self.full_window + 1),
            self.collaborators.factors.factors(symbol),
        );
        let mut history: Vec<f64> = points?.into_iter().map(|p| p.value).filter(|v| v.is_finite()).collect();
        let current = history.pop().ok_or_else(|| EngineError::NoData(symbol.to_string()))?;
        let factors = factors.unwrap_or_else(|e| {
            tracing::warn!(symbol, error = %e, "Factor context unavailable; using defaults");
            Default::default()
        });

        Ok(ScoreInput {
            symbol: symbol.to_string(),
            history,
            current,
            factors,
            regime: *regime,
            recommendation: assessment.recommendation,
            sufficiency_confidence: assessment.confidence,
        })
    }

    /// Scores one symbol.
    ///
    /// A SKIP assessment returns a neutral zero-confidence result without
    /// scoring. Otherwise the calculation runs behind the circuit breaker; when
    /// it fails the answer degrades to the cheap fallback score, then the last
    /// good result, then a neutral result.
    pub async fn calculate_zscore(&self, symbol: &str, options: ZScoreOptions) -> ZScoreResult {
        let key = symbol.to_string();
        if options.use_cache {
            if let Some(hit) = self.cache.get(&key).await {
                tracing::debug!(symbol, "Serving cached z-score");
                return hit;
            }
        }

        if options.use_parallel {
            let mut batch = self
                .run_batch(&[key.clone()], options.volatility_level, options.use_cache)
                .await;
            if let Some(result) = batch.remove(symbol) {
                return result;
            }
            let regime = self.current_regime(options.volatility_level).await;
            return ZScoreResult::neutral(symbol, regime.regime, Recommendation::Skip);
        }

        let regime = self.current_regime(options.volatility_level).await;
        let assessment = self.assess_sufficiency(symbol).await;
        if assessment.should_skip() {
            tracing::info!(symbol, missing = ?assessment.missing, "Insufficient data; skipping z-score");
            return ZScoreResult::neutral(symbol, regime.regime, Recommendation::Skip);
        }

        let (input, fetch_error) = match self.fetch_input(symbol, &regime, &assessment).await {
            Ok(input) => (Some(input), None),
            Err(e) => (None, Some(e)),
        };
        let last_good = self.last_good.get(&key).await;
        let calculator = self.calculator.as_ref();
        let input_ref = input.as_ref();

        let (result, source) = self
            .breaker
            .call_sourced(
                move || async move {
                    match (input_ref, fetch_error) {
                        (Some(input), _) => calculator.score(input),
                        (None, Some(e)) => Err(e),
                        (None, None) => Err(EngineError::NoData(symbol.to_string())),
                    }
                },
                || match input_ref {
                    Some(input) => calculator.fallback(input),
                    None => match last_good {
                        Some(mut previous) => {
                            tracing::warn!(symbol, "Serving last good z-score");
                            previous.degraded = true;
                            previous
                        }
                        None => ZScoreResult::neutral(symbol, regime.regime, assessment.recommendation),
                    },
                },
            )
            .await;

        if source == CallSource::Primary {
            self.record_success(&result).await;
        }
        tracing::info!(
            symbol,
            z = result.risk_adjusted_signal,
            confidence = result.confidence,
            ?source,
            "Z-score calculated"
        );
        result
    }

    /// Scores many symbols across the worker pool.
    ///
    /// Unexpired cached results are served as they are; only the misses are
    /// scored. SKIP symbols are omitted from the map. Symbols whose data could
    /// not be fetched fall back to their last good result when there is one.
    pub async fn calculate_batch(&self, symbols: &[String], volatility_level: Option<f64>) -> HashMap<String, ZScoreResult> {
        self.run_batch(symbols, volatility_level, true).await
    }

    #[tracing::instrument(skip(self, symbols), fields(symbols = symbols.len()))]
    async fn run_batch(&self, symbols: &[String], volatility_level: Option<f64>, use_cache: bool) -> HashMap<String, ZScoreResult> {
        let mut results = HashMap::new();
        let mut misses = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            if use_cache {
                if let Some(hit) = self.cache.get(symbol).await {
                    results.insert(symbol.clone(), hit);
                    continue;
                }
            }
            misses.push(symbol.clone());
        }
        if misses.is_empty() {
            tracing::debug!(cached = results.len(), "Batch served from cache");
            return results;
        }

        let regime = self.current_regime(volatility_level).await;
        let assessments = join_all(misses.iter().map(|s| self.assess_sufficiency(s))).await;

        let admitted: Vec<SufficiencyAssessment> = assessments
            .into_iter()
            .filter(|a| {
                if a.should_skip() {
                    tracing::info!(symbol = %a.symbol, missing = ?a.missing, "Insufficient data; omitted from batch");
                }
                !a.should_skip()
            })
            .collect();

        let fetched = join_all(admitted.iter().map(|a| self.fetch_input(&a.symbol, &regime, a))).await;
        let mut tasks = Vec::with_capacity(fetched.len());
        for (assessment, input) in admitted.iter().zip(fetched) {
            match input {
                Ok(input) => tasks.push(input),
                Err(e) => {
                    tracing::warn!(symbol = %assessment.symbol, error = %e, "Fetch failed");
                    if let Some(mut previous) = self.last_good.get(&assessment.symbol).await {
                        previous.degraded = true;
                        results.insert(assessment.symbol.clone(), previous);
                    }
                }
            }
        }

        let scorer: Arc<dyn SymbolScorer> = self.calculator.clone();
        let outcome = self.coordinator.run(tasks, scorer).await;
        let fallbacks: HashSet<&String> = outcome.fallbacks.iter().collect();
        for (symbol, result) in &outcome.results {
            if !fallbacks.contains(symbol) {
                self.record_success(result).await;
            }
        }
        tracing::info!(
            cached = symbols.len() - misses.len(),
            scored = outcome.results.len(),
            fallbacks = outcome.fallbacks.len(),
            crashed = outcome.crashed,
            timed_out = outcome.timed_out,
            "Batch complete"
        );

        results.extend(outcome.results);
        results
    }

    async fn record_success(&self, result: &ZScoreResult) {
        self.cache.set(result.symbol.clone(), result.clone()).await;
        self.last_good.record_success(result.symbol.clone(), result.clone()).await;
    }

    /// Checks that every symbol's history can be read. Returns how many can.
    pub async fn warm_up(&self, symbols: &[String]) -> usize {
        let reads = join_all(symbols.iter().map(|s| self.collaborators.history.last_updated(s))).await;
        symbols
            .iter()
            .zip(reads)
            .filter(|(symbol, read)| match read {
                Ok(Some(_)) => true,
                Ok(None) => {
                    tracing::warn!(symbol = %symbol, "No history to warm up");
                    false
                }
                Err(e) => {
                    tracing::warn!(symbol = %symbol, error = %e, "History unavailable during warmup");
                    false
                }
            })
            .count()
    }

    /// Computes and caches every symbol. Returns how many were cached.
    pub async fn preload_cache(&self, symbols: &[String]) -> usize {
        self.calculate_batch(symbols, None).await.len()
    }

    pub async fn health(&self) -> ServiceHealth {
        ServiceHealth {
            breaker: self.breaker.snapshot(),
            cached_results: self.cache.len().await,
            last_good_results: self.last_good.len().await,
        }
    }
}
