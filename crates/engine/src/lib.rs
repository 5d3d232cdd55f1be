//! # Engine
//!
//! The orchestration layer. It wires standardization, sufficiency gating, robust
//! scoring and the resilience primitives into one service, and sequences that
//! service's startup.
//!
//! ## Architectural Principles
//!
//! - **Collaborators behind Traits:** price history, factor context and the
//!   volatility index are read through async traits (`providers`), so the service
//!   runs the same against the in-memory implementations (`memory`) and any
//!   external store.
//! - **Gate before Score:** a SKIP from the Sufficiency Gate means the scorer is
//!   never invoked for that symbol in that cycle.
//! - **Always Answer:** the single-symbol path is wrapped by the circuit breaker and
//!   the batch path by the coordinator's crash handling; both degrade to a
//!   fallback result instead of returning an error. The only fatal error is a
//!   broken startup dependency graph.
//!
//! ## Public API
//!
//! - `ZScoreService`: `standardize_series`, `assess_sufficiency`, `calculate_zscore`,
//!   `calculate_batch`.
//! - `SignalPipeline`: owns the service and boots it through the `Orchestrator`.
//! - `ParallelCoordinator`: per-symbol scoring across a fixed worker pool.
//! - `ScoreCalculator` / `SymbolScorer`: the per-symbol computation and its fallback.

pub mod calculator;
pub mod coordinator;
pub mod error;
pub mod memory;
pub mod orchestrator;
pub mod pipeline;
pub mod providers;
pub mod service;
pub mod sufficiency_source;

pub use calculator::{ScoreCalculator, ScoreInput, SymbolScorer};
pub use coordinator::{BatchOutcome, ParallelCoordinator};
pub use error::{EngineError, OrchestratorError, ProviderError};
pub use memory::{InMemoryMarketData, MarketSnapshot, SeriesSnapshot, SymbolSnapshot, VolatilitySnapshot};
pub use orchestrator::{Orchestrator, StartupReport, Step, StepReport, StepStatus};
pub use pipeline::SignalPipeline;
pub use providers::{HistoricalDataStore, MarketFactorProvider, VolatilityIndexReader};
pub use service::{Collaborators, ServiceHealth, ZScoreOptions, ZScoreService};
pub use sufficiency_source::HistorySufficiencySource;
