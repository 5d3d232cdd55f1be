//! Dependency-ordered startup.
//!
//! Steps are grouped into waves: every step in a wave has all of its
//! dependencies in earlier waves, and the steps of one wave run concurrently.
//! Startup is best-effort. A failed, panicked or timed-out step is recorded
//! and its dependents still run. Only a broken dependency graph aborts.

use crate::error::{EngineError, OrchestratorError};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::time::{timeout, Instant};

type StepFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), EngineError>> + Send>;

pub struct Step {
    name: String,
    depends_on: Vec<String>,
    timeout: Duration,
    run: StepFn,
}

impl Step {
    pub fn new<F, Fut>(name: impl Into<String>, depends_on: &[&str], timeout: Duration, run: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), EngineError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
            timeout,
            run: Box::new(move || run().boxed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed(String),
    TimedOut,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub name: String,
    pub status: StepStatus,
    pub duration: Duration,
    pub wave: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StartupReport {
    pub steps: Vec<StepReport>,
    pub duration: Duration,
}

impl StartupReport {
    pub fn all_succeeded(&self) -> bool {
        self.steps.iter().all(|s| s.status == StepStatus::Succeeded)
    }

    pub fn status_of(&self, name: &str) -> Option<&StepStatus> {
        self.steps.iter().find(|s| s.name == name).map(|s| &s.status)
    }
}

#[derive(Default)]
pub struct Orchestrator {
    steps: Vec<Step>,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, step: Step) -> &mut Self {
        self.steps.push(step);
        self
    }

    /// Groups step names into waves, preserving declaration order within a wave.
    pub fn execution_plan(&self) -> Result<Vec<Vec<String>>, OrchestratorError> {
        let mut declared = HashSet::new();
        for step in &self.steps {
            if !declared.insert(step.name.as_str()) {
                return Err(OrchestratorError::DuplicateStep(step.name.clone()));
            }
        }
        for step in &self.steps {
            if let Some(missing) = step.depends_on.iter().find(|d| !declared.contains(d.as_str())) {
                return Err(OrchestratorError::UnknownDependency {
                    step: step.name.clone(),
                    dependency: missing.clone(),
                });
            }
        }

        let mut done: HashSet<&str> = HashSet::new();
        let mut pending: Vec<&Step> = self.steps.iter().collect();
        let mut waves = Vec::new();

        while !pending.is_empty() {
            let (ready, blocked): (Vec<&Step>, Vec<&Step>) = pending
                .into_iter()
                .partition(|s| s.depends_on.iter().all(|d| done.contains(d.as_str())));
            if ready.is_empty() {
                return Err(OrchestratorError::CircularDependency(
                    blocked.iter().map(|s| s.name.clone()).collect(),
                ));
            }
            done.extend(ready.iter().map(|s| s.name.as_str()));
            waves.push(ready.iter().map(|s| s.name.clone()).collect());
            pending = blocked;
        }
        Ok(waves)
    }

    /// Runs every step, wave by wave.
    #[tracing::instrument(skip(self), fields(steps = self.steps.len()))]
    pub async fn run(self) -> Result<StartupReport, OrchestratorError> {
        let plan = self.execution_plan().inspect_err(|e| {
            tracing::error!(error = %e, "Invalid startup configuration; aborting");
        })?;

        let started = Instant::now();
        let dependencies: HashMap<String, Vec<String>> = self
            .steps
            .iter()
            .map(|s| (s.name.clone(), s.depends_on.clone()))
            .collect();
        let mut steps: HashMap<String, Step> = self.steps.into_iter().map(|s| (s.name.clone(), s)).collect();
        let mut failed: HashSet<String> = HashSet::new();
        let mut report = StartupReport::default();

        for (wave, names) in plan.into_iter().enumerate() {
            let runs = names.iter().filter_map(|name| steps.remove(name)).map(|step| {
                let blocked_by: Vec<&String> = dependencies
                    .get(&step.name)
                    .into_iter()
                    .flatten()
                    .filter(|d| failed.contains(*d))
                    .collect();
                if !blocked_by.is_empty() {
                    tracing::warn!(step = %step.name, ?blocked_by, "Dependency did not succeed; attempting anyway");
                }
                run_step(step, wave)
            });
            let results = join_all(runs.collect::<Vec<_>>()).await;

            for result in results {
                match &result.status {
                    StepStatus::Succeeded => {
                        tracing::info!(step = %result.name, wave, duration = ?result.duration, "Startup step succeeded")
                    }
                    StepStatus::Failed(reason) => {
                        tracing::warn!(step = %result.name, wave, %reason, "Startup step failed");
                        failed.insert(result.name.clone());
                    }
                    StepStatus::TimedOut => {
                        tracing::warn!(step = %result.name, wave, "Startup step timed out");
                        failed.insert(result.name.clone());
                    }
                }
                report.steps.push(result);
            }
        }

        report.duration = started.elapsed();
        tracing::info!(
            duration = ?report.duration,
            all_succeeded = report.all_succeeded(),
            "Startup complete"
        );
        Ok(report)
    }
}

async fn run_step(step: Step, wave: usize) -> StepReport {
    let started = Instant::now();
    let Step {
        name,
        timeout: limit,
        run,
        ..
    } = step;

    let outcome = timeout(limit, AssertUnwindSafe(async move { run().await }).catch_unwind()).await;
    let status = match outcome {
        Ok(Ok(Ok(()))) => StepStatus::Succeeded,
        Ok(Ok(Err(e))) => StepStatus::Failed(e.to_string()),
        Ok(Err(_)) => StepStatus::Failed("step panicked".to_string()),
        Err(_) => StepStatus::TimedOut,
    };

    StepReport {
        name,
        status,
        duration: started.elapsed(),
        wave,
    }
}
