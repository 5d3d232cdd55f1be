mod common;

use chrono::NaiveDate;
use common::*;
use configuration::Config;
use core_types::{RawObservation, SeriesDefinition, Transform, Unit};
use engine::pipeline::{CACHE_PRELOAD, MONITORING, SCHEDULER, WARMUP};
use engine::{Collaborators, InMemoryMarketData, SignalPipeline, StepStatus, ZScoreService};
use standardization::InMemorySeriesRepository;
use std::sync::Arc;
use std::time::Duration;

fn watchlist_config(symbols: &[&str]) -> Config {
    let mut config = Config::default();
    config.orchestrator.watchlist = symbols.iter().map(|s| s.to_string()).collect();
    config
}

#[tokio::test]
async fn startup_warms_preloads_and_schedules() {
    let config = watchlist_config(&["SPY", "QQQ"]);
    let market = market(16.0).await;
    market.insert_history("SPY", history_with_current(12, 101.5)).await;
    market.insert_history("QQQ", history_with_current(12, 97.0)).await;

    let pipeline = SignalPipeline::new(Arc::new(service(&config, market)), &config);
    let report = pipeline.start().await.unwrap();

    assert!(report.all_succeeded());
    assert_eq!(report.steps.len(), 4);
    let wave_of = |name: &str| report.steps.iter().find(|s| s.name == name).unwrap().wave;
    assert_eq!(wave_of(WARMUP), 0);
    assert_eq!(wave_of(MONITORING), 0);
    assert_eq!(wave_of(CACHE_PRELOAD), 1);
    assert_eq!(wave_of(SCHEDULER), 2);

    assert_eq!(pipeline.service().health().await.cached_results, 2);
    // Sweeper, refresher and monitor.
    assert_eq!(pipeline.background_tasks().await, 3);

    pipeline.shutdown().await;
    assert_eq!(pipeline.background_tasks().await, 0);
}

#[tokio::test]
async fn failed_warmup_still_lets_later_steps_run() {
    let config = watchlist_config(&["NOPE"]);
    let pipeline = SignalPipeline::new(Arc::new(service(&config, market(16.0).await)), &config);

    let report = pipeline.start().await.unwrap();
    assert!(matches!(report.status_of(WARMUP), Some(StepStatus::Failed(_))));
    assert_eq!(report.status_of(CACHE_PRELOAD), Some(&StepStatus::Succeeded));
    assert_eq!(report.status_of(SCHEDULER), Some(&StepStatus::Succeeded));
    pipeline.shutdown().await;
}

#[tokio::test]
async fn series_standardization_runs_end_to_end() {
    let series = Arc::new(InMemorySeriesRepository::new());
    series
        .add_definition(SeriesDefinition {
            series_id: "UNRATE".to_string(),
            display_name: "Unemployment Rate".to_string(),
            category: "labor".to_string(),
            native_unit: "percent".to_string(),
            standard_unit: Unit::PercentDecimal,
            default_transform: Transform::Level,
            preferred_window: Some(12),
            seasonally_adjusted: true,
        })
        .await;
    series
        .append_raw((0..24).map(|i| RawObservation {
            series_id: "UNRATE".to_string(),
            period_end: NaiveDate::from_ymd_opt(2022 + i / 12, (i % 12) as u32 + 1, 28).unwrap(),
            value: 3.5 + 0.1 * (i % 5) as f64,
            unit: "percent".to_string(),
        }))
        .await;

    let config = Config::default();
    let collaborators = Collaborators::in_memory(Arc::new(InMemoryMarketData::new()), series.clone());
    let service = ZScoreService::new(&config, collaborators).unwrap();

    let outcome = service.standardize_series("UNRATE").await;
    assert!(outcome.success);
    assert_eq!(outcome.observations, 24);
    // Each feature needs window + 1 earlier periods.
    assert_eq!(outcome.features, 24 - 13);
    assert_eq!(outcome.degraded, 0);

    let stored = series.standard_observations("UNRATE").await;
    assert!(stored.iter().all(|o| o.unit == Unit::PercentDecimal && o.value < 0.1));

    // Re-running is idempotent.
    assert_eq!(service.standardize_series("UNRATE").await, outcome);
    assert_eq!(series.feature_records("UNRATE").await.len(), 11);

    assert!(!service.standardize_series("MISSING").await.success);
}

#[tokio::test]
async fn expired_entries_are_refreshed_in_the_background() {
    let config = watchlist_config(&["SPY"]);
    let market = market(16.0).await;
    market.insert_history("SPY", history_with_current(12, 101.5)).await;
    let store = Arc::new(InstrumentedStore::new(market.clone(), config.zscore.full_window + 1));
    let service = Arc::new(instrumented_service(&config, market, store.clone()));

    // The preload runs on the worker pool, so it runs against the real clock.
    let pipeline = SignalPipeline::new(service.clone(), &config);
    assert!(pipeline.start().await.unwrap().all_succeeded());
    assert_eq!(store.reads(), 1);
    assert_eq!(service.health().await.breaker.stats.primary_calls, 0);

    tokio::time::pause();
    tokio::time::advance(config.cache.ttl + config.cache.sweep_interval).await;
    for _ in 0..100 {
        if store.reads() == 2 && service.health().await.cached_results == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(store.reads(), 2);
    assert_eq!(service.health().await.breaker.stats.primary_calls, 1);
    assert!(service.cache().get(&"SPY".to_string()).await.is_some());
    pipeline.shutdown().await;
}
