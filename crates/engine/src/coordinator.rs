use crate::calculator::{ScoreInput, SymbolScorer};
use crate::error::EngineError;
use configuration::ParallelSettings;
use core_types::ZScoreResult;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};

/// What a worker reports back to the coordinator.
enum WorkerEvent {
    Completed {
        result: ZScoreResult,
        fallback: bool,
    },
    /// The scorer panicked on `task`; `remaining` never ran.
    Crashed {
        worker: usize,
        task: ScoreInput,
        remaining: Vec<ScoreInput>,
    },
    Finished,
}

/// Results of one batch, keyed by symbol.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub results: HashMap<String, ZScoreResult>,
    /// Symbols answered by the scorer's fallback instead of a full score.
    pub fallbacks: Vec<String>,
    pub crashed: usize,
    pub restarts: usize,
    /// The deadline passed before every worker reported; `results` is partial.
    pub timed_out: bool,
}

/// Fans per-symbol scoring out over a fixed-size worker pool.
pub struct ParallelCoordinator {
    pool: Arc<ThreadPool>,
    workers: usize,
    settings: ParallelSettings,
}

impl ParallelCoordinator {
    pub fn new(settings: ParallelSettings) -> Result<Self, EngineError> {
        let workers = settings.max_workers.min(num_cpus::get()).max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("zscore-worker-{i}"))
            .build()
            .map_err(|e| EngineError::WorkerPool(e.to_string()))?;
        tracing::info!(workers, "Parallel coordinator ready");
        Ok(Self {
            pool: Arc::new(pool),
            workers,
            settings,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Scores every task, returning whatever completed before the batch deadline.
    ///
    /// Tasks are split into one contiguous chunk per worker. A worker whose
    /// scorer panics is replaced by a new job carrying the rest of its chunk,
    /// up to `max_worker_restarts` times per batch; beyond that the remaining
    /// tasks get the scorer's fallback.
    pub async fn run(&self, tasks: Vec<ScoreInput>, scorer: Arc<dyn SymbolScorer>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        if tasks.is_empty() {
            return outcome;
        }

        let deadline = Instant::now() + self.settings.batch_timeout;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let chunk_size = tasks.len().div_ceil(self.workers);

        let mut active = 0;
        let mut tasks = tasks.into_iter().peekable();
        while tasks.peek().is_some() {
            let chunk: Vec<ScoreInput> = tasks.by_ref().take(chunk_size).collect();
            self.dispatch(active, chunk, scorer.clone(), tx.clone());
            active += 1;
        }
        let mut next_worker = active;

        while active > 0 {
            let event = match timeout_at(deadline, rx.recv()).await {
                Ok(Some(event)) => event,
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        completed = outcome.results.len(),
                        pending_workers = active,
                        timeout = ?self.settings.batch_timeout,
                        "Batch deadline passed; returning partial results"
                    );
                    outcome.timed_out = true;
                    break;
                }
            };

            match event {
                WorkerEvent::Completed { result, fallback } => {
                    if fallback {
                        outcome.fallbacks.push(result.symbol.clone());
                    }
                    outcome.results.insert(result.symbol.clone(), result);
                }
                WorkerEvent::Crashed { worker, task, remaining } => {
                    outcome.crashed += 1;
                    outcome.fallbacks.push(task.symbol.clone());
                    let fallback = guarded_fallback(scorer.as_ref(), &task);
                    outcome.results.insert(fallback.symbol.clone(), fallback);
                    active -= 1;

                    if remaining.is_empty() {
                        continue;
                    }
                    if outcome.restarts < self.settings.max_worker_restarts {
                        outcome.restarts += 1;
                        tracing::warn!(
                            worker,
                            replacement = next_worker,
                            symbol = %task.symbol,
                            remaining = remaining.len(),
                            "Worker crashed; restarting with the rest of its chunk"
                        );
                        self.dispatch(next_worker, remaining, scorer.clone(), tx.clone());
                        next_worker += 1;
                        active += 1;
                    } else {
                        tracing::warn!(
                            worker,
                            symbol = %task.symbol,
                            remaining = remaining.len(),
                            "Worker restart limit reached; serving fallbacks for the rest of its chunk"
                        );
                        for task in remaining {
                            outcome.fallbacks.push(task.symbol.clone());
                            let fallback = guarded_fallback(scorer.as_ref(), &task);
                            outcome.results.insert(fallback.symbol.clone(), fallback);
                        }
                    }
                }
                WorkerEvent::Finished => active -= 1,
            }
        }

        outcome
    }

    fn dispatch(
        &self,
        worker: usize,
        chunk: Vec<ScoreInput>,
        scorer: Arc<dyn SymbolScorer>,
        tx: mpsc::UnboundedSender<WorkerEvent>,
    ) {
        self.pool.spawn(move || {
            let mut chunk = chunk.into_iter();
            while let Some(task) = chunk.next() {
                // A closed channel means the batch has already returned.
                let sent = match catch_unwind(AssertUnwindSafe(|| scorer.score(&task))) {
                    Ok(Ok(result)) => tx.send(WorkerEvent::Completed {
                        result,
                        fallback: false,
                    }),
                    Ok(Err(e)) => {
                        tracing::warn!(worker, symbol = %task.symbol, error = %e, "Scoring failed; using fallback");
                        tx.send(WorkerEvent::Completed {
                            result: guarded_fallback(scorer.as_ref(), &task),
                            fallback: true,
                        })
                    }
                    Err(_) => {
                        let _ = tx.send(WorkerEvent::Crashed {
                            worker,
                            task,
                            remaining: chunk.by_ref().collect(),
                        });
                        return;
                    }
                };
                if sent.is_err() {
                    return;
                }
            }
            let _ = tx.send(WorkerEvent::Finished);
        });
    }
}

/// The scorer's fallback, or a neutral result if the fallback itself panics.
fn guarded_fallback(scorer: &dyn SymbolScorer, task: &ScoreInput) -> ZScoreResult {
    catch_unwind(AssertUnwindSafe(|| scorer.fallback(task))).unwrap_or_else(|_| {
        tracing::error!(symbol = %task.symbol, "Fallback scorer panicked; serving a neutral result");
        ZScoreResult::neutral(&task.symbol, task.regime.regime, task.recommendation)
    })
}
