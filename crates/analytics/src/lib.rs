//! # Analytics
//!
//! The statistical core of the signal pipeline: robust z-scores, volatility
//! regime classification, and the indicator set used to judge whether a
//! symbol's data is complete enough to score.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** This is a pure logic crate. It has no knowledge of external systems.
//!   It depends only on `core-types` and the typed settings in `configuration`.
//! - **Stateless Calculation:** `RobustZScoreEngine` and `VolatilityRegimeDetector` hold
//!   only their settings. Every method is a function of its arguments, and no input
//!   slice is ever mutated.
//! - **Never Divide by Zero:** degenerate inputs (too few points, zero dispersion,
//!   non-finite values) produce a z-score of zero rather than an error.
//!
//! ## Public API
//!
//! - `RobustZScoreEngine`: winsorized and MAD z-scores, factor adjustment, confidence.
//! - `VolatilityRegimeDetector`: static/dynamic regime classification and strategy advice.
//! - `stats`: the descriptive statistics both are built on.
//! - `indicators`: technical indicators and z-score-style features over a price series.

// Declare the modules that constitute this crate.
pub mod error;
pub mod indicators;
pub mod regime;
pub mod stats;
pub mod zscore;

// Re-export the key components to create a clean, public-facing API.
pub use error::AnalyticsError;
pub use regime::{is_safe_for, regime_for, StrategyRecommendation, VolatilityRegimeDetector};
pub use zscore::{RobustZScore, RobustZScoreEngine};
