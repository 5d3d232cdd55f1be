//! # Resilience
//!
//! Failure containment for the calculation path.
//!
//! ## Architectural Principles
//!
//! - **Owned State:** the breaker, the cache and the last-good store are plain values
//!   owned by whoever constructs them (the z-score service), shared by `Arc` handle.
//!   Nothing here is process-global.
//! - **Always Answer:** `CircuitBreaker::call` requires a fallback and always returns a
//!   value; failures and panics in the primary are logged and counted, never propagated.
//!
//! ## Public API
//!
//! - `CircuitBreaker`: closed / open / half-open state machine with stats.
//! - `TtlCache` and `spawn_sweeper`: short-TTL result cache with background eviction.
//! - `LastGoodStore`: the last successful value per key.

pub mod cache;
pub mod circuit_breaker;

pub use cache::{spawn_sweeper, LastGoodStore, TtlCache};
pub use circuit_breaker::{
    BreakerPhase, BreakerSnapshot, BreakerState, BreakerStats, CallSource, CircuitBreaker,
};
