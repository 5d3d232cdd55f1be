//! # Standardization
//!
//! Moves economic series through the three data layers: raw published values
//! (Bronze), values in a canonical unit with a named transform applied
//! (Silver), and rolling-window features with qualitative classifications
//! (Gold).
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** unit conversion, transforms and feature engineering are pure
//!   functions of their inputs. Only `SeriesStandardizer::standardize_series` touches
//!   storage, and only through the `SeriesRepository` trait.
//! - **Never Fail on Data:** unknown units pass through and missing prior periods fall
//!   back to LEVEL. Both are recorded as degraded quality rather than raised as errors.
//! - **Idempotent:** every write is an upsert on a deterministic key.

pub mod error;
pub mod features;
pub mod memory;
pub mod pipeline;
pub mod transform;
pub mod units;

pub use error::StandardizationError;
pub use features::{multi_signal, RollingFeatureCalculator};
pub use memory::InMemorySeriesRepository;
pub use pipeline::{SeriesRepository, SeriesStandardizer, SilverRow, StandardizationOutcome};
pub use transform::{MonthlyLevels, PriorValueLookup, TransformEngine, TransformOutput};
pub use units::{standardize, StandardizedValue};
