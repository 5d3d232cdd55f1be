use crate::error::{EngineError, OrchestratorError};
use crate::orchestrator::{Orchestrator, StartupReport, Step};
use crate::service::{ZScoreOptions, ZScoreService};
use configuration::{CacheSettings, Config, OrchestratorSettings};
use resilience::spawn_sweeper;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

pub const WARMUP: &str = "warmup";
pub const CACHE_PRELOAD: &str = "cache_preload";
pub const SCHEDULER: &str = "scheduler";
pub const MONITORING: &str = "monitoring";

/// Owns the z-score service and the background tasks started for it.
pub struct SignalPipeline {
    service: Arc<ZScoreService>,
    settings: OrchestratorSettings,
    cache_settings: CacheSettings,
    background: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl SignalPipeline {
    pub fn new(service: Arc<ZScoreService>, config: &Config) -> Self {
        Self {
            service,
            settings: config.orchestrator.clone(),
            cache_settings: config.cache.clone(),
            background: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn service(&self) -> Arc<ZScoreService> {
        self.service.clone()
    }

    /// warmup -> cache_preload -> scheduler, with monitoring alongside.
    pub fn orchestrator(&self) -> Orchestrator {
        let limit = self.settings.step_timeout;
        let watchlist = self.settings.watchlist.clone();
        let mut orchestrator = Orchestrator::new();

        let service = self.service.clone();
        let symbols = watchlist.clone();
        orchestrator.add(Step::new(WARMUP, &[], limit, move || async move {
            let ready = service.warm_up(&symbols).await;
            tracing::info!(ready, requested = symbols.len(), "Data warmup finished");
            if ready == 0 && !symbols.is_empty() {
                return Err(EngineError::NoData("no watchlist symbol has history".to_string()));
            }
            Ok(())
        }));

        let service = self.service.clone();
        orchestrator.add(Step::new(CACHE_PRELOAD, &[WARMUP], limit, move || async move {
            let cached = service.preload_cache(&watchlist).await;
            tracing::info!(cached, "Cache preloaded");
            Ok(())
        }));

        let service = self.service.clone();
        let cache_settings = self.cache_settings.clone();
        let background = self.background.clone();
        orchestrator.add(Step::new(SCHEDULER, &[CACHE_PRELOAD], limit, move || async move {
            let mut handles = spawn_scheduler(service, &cache_settings);
            background.lock().await.append(&mut handles);
            Ok(())
        }));

        let service = self.service.clone();
        let every = self.settings.monitoring_interval;
        let background = self.background.clone();
        orchestrator.add(Step::new(MONITORING, &[], limit, move || async move {
            let handle = spawn_monitor(service, every);
            background.lock().await.push(handle);
            Ok(())
        }));

        orchestrator
    }

    pub async fn start(&self) -> Result<StartupReport, OrchestratorError> {
        self.orchestrator().run().await
    }

    /// Background tasks currently owned by the pipeline.
    pub async fn background_tasks(&self) -> usize {
        self.background.lock().await.len()
    }

    pub async fn shutdown(&self) {
        let mut handles = self.background.lock().await;
        for handle in handles.drain(..) {
            handle.abort();
        }
        tracing::info!("Pipeline background tasks stopped");
    }
}

/// Starts the cache sweeper and, when enabled, the task that recomputes
/// evicted symbols.
fn spawn_scheduler(service: Arc<ZScoreService>, settings: &CacheSettings) -> Vec<JoinHandle<()>> {
    if !settings.refresh_expired {
        return vec![spawn_sweeper(service.cache(), settings.sweep_interval, None)];
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let sweeper = spawn_sweeper(service.cache(), settings.sweep_interval, Some(tx));
    let refresher = tokio::spawn(async move {
        while let Some(symbol) = rx.recv().await {
            let options = ZScoreOptions {
                use_cache: false,
                ..Default::default()
            };
            let result = service.calculate_zscore(&symbol, options).await;
            tracing::debug!(symbol = %symbol, confidence = result.confidence, "Refreshed expired z-score");
        }
    });
    vec![sweeper, refresher]
}

fn spawn_monitor(service: Arc<ZScoreService>, every: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = interval(every);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            timer.tick().await;
            let health = service.health().await;
            tracing::info!(
                breaker = ?health.breaker.phase,
                consecutive_failures = health.breaker.consecutive_failures,
                short_circuits = health.breaker.stats.short_circuits,
                cached = health.cached_results,
                last_good = health.last_good_results,
                "Service health"
            );
        }
    })
}
