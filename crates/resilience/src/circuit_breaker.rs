//! Three-state circuit breaker around a fallible async computation.
//!
//! Closed: calls go to the primary; consecutive failures are counted.
//! Open: calls go straight to the fallback until the cooldown has elapsed.
//! Half-open: a limited number of trial calls decide whether to close again
//! or re-open.

use configuration::BreakerSettings;
use futures::FutureExt;
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed { consecutive_failures: u32 },
    Open { opened_at: Instant },
    HalfOpen { trials_in_flight: u32 },
}

/// The state without its bookkeeping, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerPhase {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BreakerStats {
    /// Calls that reached the primary computation.
    pub primary_calls: u64,
    pub successes: u64,
    pub failures: u64,
    /// Calls answered by the fallback without reaching the primary.
    pub short_circuits: u64,
    pub fallbacks: u64,
    pub times_opened: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub phase: BreakerPhase,
    pub consecutive_failures: u32,
    pub stats: BreakerStats,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    stats: BreakerStats,
}

/// Which side of the breaker produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallSource {
    Primary,
    Fallback,
}

enum Admission {
    Normal,
    Trial,
    Rejected,
}

/// Holds a half-open trial slot until the trial reports an outcome.
/// A trial dropped before that (timeout, abort) re-opens the circuit.
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl TrialGuard<'_> {
    fn settle(mut self) {
        self.armed = false;
    }
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.on_abandoned_trial();
        }
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    cooldown: Duration,
    half_open_max_calls: u32,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, settings: &BreakerSettings) -> Self {
        Self {
            name: name.into(),
            failure_threshold: settings.failure_threshold.max(1),
            cooldown: settings.cooldown,
            half_open_max_calls: settings.half_open_max_calls.max(1),
            inner: Mutex::new(Inner {
                state: BreakerState::Closed { consecutive_failures: 0 },
                stats: BreakerStats::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `primary` if the breaker admits it, otherwise `fallback`.
    ///
    /// An `Err` or a panic from the primary counts as a failure and is answered
    /// with the fallback, so the caller always receives a value.
    pub async fn call<T, E, Fut, P, F>(&self, primary: P, fallback: F) -> T
    where
        P: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        F: FnOnce() -> T,
    {
        self.call_sourced(primary, fallback).await.0
    }

    /// Like [`call`](Self::call), also reporting which side answered.
    pub async fn call_sourced<T, E, Fut, P, F>(&self, primary: P, fallback: F) -> (T, CallSource)
    where
        P: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        F: FnOnce() -> T,
    {
        let admission = self.admit();
        if let Admission::Rejected = admission {
            {
                let mut inner = self.lock();
                inner.stats.short_circuits += 1;
                inner.stats.fallbacks += 1;
            }
            tracing::debug!(breaker = %self.name, "Circuit open; serving fallback");
            return (fallback(), CallSource::Fallback);
        }

        let trial = matches!(admission, Admission::Trial);
        let guard = TrialGuard {
            breaker: self,
            armed: trial,
        };
        let outcome = AssertUnwindSafe(async { primary().await }).catch_unwind().await;
        guard.settle();

        match outcome {
            Ok(Ok(value)) => {
                self.on_success(trial);
                (value, CallSource::Primary)
            }
            Ok(Err(e)) => {
                tracing::warn!(breaker = %self.name, error = %e, "Primary call failed; serving fallback");
                self.on_failure(trial);
                (fallback(), CallSource::Fallback)
            }
            Err(_) => {
                tracing::warn!(breaker = %self.name, "Primary call panicked; serving fallback");
                self.on_failure(trial);
                (fallback(), CallSource::Fallback)
            }
        }
    }

    fn admit(&self) -> Admission {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed { .. } => Admission::Normal,
            BreakerState::Open { opened_at } => {
                if opened_at.elapsed() >= self.cooldown {
                    inner.state = BreakerState::HalfOpen { trials_in_flight: 1 };
                    tracing::info!(breaker = %self.name, "Cooldown elapsed; circuit half-open");
                    Admission::Trial
                } else {
                    Admission::Rejected
                }
            }
            BreakerState::HalfOpen { trials_in_flight } => {
                if trials_in_flight < self.half_open_max_calls {
                    inner.state = BreakerState::HalfOpen {
                        trials_in_flight: trials_in_flight + 1,
                    };
                    Admission::Trial
                } else {
                    Admission::Rejected
                }
            }
        }
    }

    fn on_success(&self, trial: bool) {
        let mut inner = self.lock();
        inner.stats.primary_calls += 1;
        inner.stats.successes += 1;
        match inner.state {
            BreakerState::Closed { .. } => {
                inner.state = BreakerState::Closed { consecutive_failures: 0 };
            }
            BreakerState::HalfOpen { .. } if trial => {
                inner.state = BreakerState::Closed { consecutive_failures: 0 };
                tracing::info!(breaker = %self.name, "Trial call succeeded; circuit closed");
            }
            // A call admitted before the circuit opened does not close it.
            _ => {}
        }
    }

    fn on_failure(&self, trial: bool) {
        let mut inner = self.lock();
        inner.stats.primary_calls += 1;
        inner.stats.failures += 1;
        inner.stats.fallbacks += 1;
        match inner.state {
            BreakerState::Closed { consecutive_failures } => {
                let failures = consecutive_failures + 1;
                if failures >= self.failure_threshold {
                    inner.state = BreakerState::Open { opened_at: Instant::now() };
                    inner.stats.times_opened += 1;
                    tracing::warn!(
                        breaker = %self.name,
                        failures,
                        cooldown = ?self.cooldown,
                        "Failure threshold reached; circuit opened"
                    );
                } else {
                    inner.state = BreakerState::Closed {
                        consecutive_failures: failures,
                    };
                }
            }
            BreakerState::HalfOpen { .. } if trial => {
                inner.state = BreakerState::Open { opened_at: Instant::now() };
                inner.stats.times_opened += 1;
                tracing::warn!(breaker = %self.name, "Trial call failed; circuit re-opened");
            }
            _ => {}
        }
    }

    fn on_abandoned_trial(&self) {
        let mut inner = self.lock();
        if let BreakerState::HalfOpen { .. } = inner.state {
            inner.state = BreakerState::Open { opened_at: Instant::now() };
            inner.stats.times_opened += 1;
            tracing::warn!(breaker = %self.name, "Trial call abandoned; circuit re-opened");
        }
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        let (phase, consecutive_failures) = match inner.state {
            BreakerState::Closed { consecutive_failures } => (BreakerPhase::Closed, consecutive_failures),
            BreakerState::Open { .. } => (BreakerPhase::Open, self.failure_threshold),
            BreakerState::HalfOpen { .. } => (BreakerPhase::HalfOpen, 0),
        };
        BreakerSnapshot {
            name: self.name.clone(),
            phase,
            consecutive_failures,
            stats: inner.stats,
        }
    }
}
