mod common;

use common::*;
use configuration::Config;
use core_types::{Recommendation, Regime, ZScoreMethod};
use engine::ZScoreOptions;
use resilience::BreakerPhase;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn fresh() -> ZScoreOptions {
    ZScoreOptions {
        use_cache: false,
        ..Default::default()
    }
}

#[tokio::test]
async fn spike_over_sixty_points_scores_high_with_full_confidence() {
    let market = market(15.0).await;
    market.insert_history("SPY", history_with_current(10, 150.0)).await;
    let service = service(&Config::default(), market);

    let assessment = service.assess_sufficiency("SPY").await;
    assert_eq!(assessment.recommendation, Recommendation::Proceed);

    let result = service.calculate_zscore("SPY", fresh()).await;
    assert_eq!(result.method, ZScoreMethod::Winsorized);
    assert!(result.z_long.is_finite() && result.z_long > 10.0);
    assert!(result.confidence >= 80.0 && result.confidence <= 100.0);
    assert!(!result.degraded);
}

#[tokio::test]
async fn crisis_reading_switches_to_mad() {
    let market = market(35.0).await;
    market.insert_history("SPY", history_with_current(10, 150.0)).await;
    let service = service(&Config::default(), market);

    let regime = service.current_regime(None).await;
    assert_eq!(regime.regime, Regime::Crisis);
    assert_eq!(regime.multiplier, 2.0);

    let result = service.calculate_zscore("SPY", fresh()).await;
    assert_eq!(result.method, ZScoreMethod::Mad);
    assert_eq!(result.regime, Regime::Crisis);

    let (center, mad) = median_and_mad(&pattern(10));
    let expected = (150.0 - center) / (mad * 1.4826);
    assert!((result.z_long - expected).abs() < 1e-9);
}

#[tokio::test]
async fn batch_omits_symbols_the_gate_skips() {
    let market = market(18.0).await;
    for symbol in ["SPY", "QQQ", "IWM", "DIA"] {
        market.insert_history(symbol, history_with_current(12, 104.0)).await;
    }
    market.insert_history("X", daily(&pattern(2)[..10])).await;
    let service = service(&Config::default(), market);

    assert_eq!(service.assess_sufficiency("X").await.recommendation, Recommendation::Skip);
    for symbol in ["SPY", "QQQ", "IWM", "DIA"] {
        assert_ne!(service.assess_sufficiency(symbol).await.recommendation, Recommendation::Skip);
    }

    let symbols: Vec<String> = ["SPY", "QQQ", "X", "IWM", "DIA"].iter().map(|s| s.to_string()).collect();
    let results = service.calculate_batch(&symbols, None).await;
    assert_eq!(results.len(), 4);
    assert!(!results.contains_key("X"));
    assert!(results.values().all(|r| r.confidence > 0.0));

    // The single-symbol path answers with a neutral SKIP instead.
    let skipped = service.calculate_zscore("X", fresh()).await;
    assert_eq!(skipped.recommendation, Recommendation::Skip);
    assert_eq!(skipped.confidence, 0.0);
}

#[tokio::test(start_paused = true)]
async fn cached_results_are_served_until_the_ttl_lapses() {
    let config = Config::default();
    assert_eq!(config.cache.ttl, Duration::from_secs(300));

    let market = market(15.0).await;
    market.insert_history("SPY", history_with_current(10, 150.0)).await;
    let store = Arc::new(InstrumentedStore::new(market.clone(), config.zscore.full_window + 1));
    let service = instrumented_service(&config, market, store.clone());

    let first = service.calculate_zscore("SPY", ZScoreOptions::default()).await;
    assert_eq!(store.reads(), 1);

    tokio::time::advance(Duration::from_secs(299)).await;
    let second = service.calculate_zscore("SPY", ZScoreOptions::default()).await;
    assert_eq!(store.reads(), 1);
    assert_eq!(first, second);

    tokio::time::advance(Duration::from_secs(1)).await;
    service.calculate_zscore("SPY", ZScoreOptions::default()).await;
    assert_eq!(store.reads(), 2);
}

#[tokio::test]
async fn open_breaker_stops_invoking_the_calculation() {
    let mut config = Config::default();
    config.breaker.failure_threshold = 3;
    config.breaker.cooldown = Duration::from_secs(600);

    let market = market(15.0).await;
    market.insert_history("SPY", history_with_current(10, 150.0)).await;
    let store = Arc::new(InstrumentedStore::new(market.clone(), config.zscore.full_window + 1));
    let service = instrumented_service(&config, market, store.clone());

    let good = service.calculate_zscore("SPY", fresh()).await;
    assert!(!good.degraded);

    store.fail_scoring_reads.store(true, Ordering::SeqCst);
    for _ in 0..3 {
        let result = service.calculate_zscore("SPY", fresh()).await;
        // Falls back to the last good result.
        assert!(result.degraded);
        assert_eq!(result.z_long, good.z_long);
    }
    let health = service.health().await;
    assert_eq!(health.breaker.phase, BreakerPhase::Open);
    let primary_calls = health.breaker.stats.primary_calls;

    for _ in 0..5 {
        let result = service.calculate_zscore("SPY", fresh()).await;
        assert!(result.degraded);
    }
    let health = service.health().await;
    assert_eq!(health.breaker.stats.primary_calls, primary_calls);
    assert_eq!(health.breaker.stats.short_circuits, 5);
}

#[tokio::test]
async fn parallel_option_routes_through_the_worker_pool() {
    let market = market(15.0).await;
    market.insert_history("SPY", history_with_current(10, 150.0)).await;
    let service = service(&Config::default(), market);

    let options = ZScoreOptions {
        use_cache: false,
        use_parallel: true,
        volatility_level: None,
    };
    let result = service.calculate_zscore("SPY", options).await;
    assert_eq!(result.symbol, "SPY");
    assert!(!result.degraded);
    // The breaker is bypassed on the pool path.
    assert_eq!(service.health().await.breaker.stats.primary_calls, 0);
    assert_eq!(service.health().await.cached_results, 1);
}

#[tokio::test]
async fn batch_reads_through_the_result_cache() {
    let config = Config::default();
    let market = market(15.0).await;
    market.insert_history("SPY", history_with_current(10, 150.0)).await;
    market.insert_history("QQQ", history_with_current(10, 97.0)).await;
    let store = Arc::new(InstrumentedStore::new(market.clone(), config.zscore.full_window + 1));
    let service = instrumented_service(&config, market, store.clone());

    let single = service.calculate_zscore("SPY", ZScoreOptions::default()).await;
    assert_eq!(store.reads(), 1);

    let spy = vec!["SPY".to_string()];
    let first = service.calculate_batch(&spy, None).await;
    let second = service.calculate_batch(&spy, None).await;
    assert_eq!(store.reads(), 1);
    assert_eq!(first["SPY"], single);
    assert_eq!(second["SPY"], single);

    // Only the miss is scored.
    let both = vec!["SPY".to_string(), "QQQ".to_string()];
    let mixed = service.calculate_batch(&both, None).await;
    assert_eq!(mixed.len(), 2);
    assert_eq!(store.reads(), 2);

    // Bypassing the cache on the pool path scores again.
    let options = ZScoreOptions {
        use_cache: false,
        use_parallel: true,
        volatility_level: None,
    };
    service.calculate_zscore("SPY", options).await;
    assert_eq!(store.reads(), 3);
}
