//! # Sufficiency
//!
//! The Data Sufficiency Gate: a pre-check that decides whether enough good
//! data exists for a symbol to trust a z-score calculation.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** the checks are pure functions; data arrives through the
//!   `SufficiencySource` trait, implemented by the engine over its providers.
//! - **Structured Verdicts:** the gate never returns an error. A failing check
//!   becomes a zero-confidence, missing component of the assessment.
//!
//! ## Public API
//!
//! - `SufficiencyGate`: runs and combines the checks into PROCEED / DEGRADE / SKIP.
//! - `SufficiencySource`: the data the checks need.
//! - `checks`: the individual check functions.

pub mod checks;
pub mod error;
pub mod gate;
pub mod source;

pub use error::SufficiencyError;
pub use gate::SufficiencyGate;
pub use source::SufficiencySource;
