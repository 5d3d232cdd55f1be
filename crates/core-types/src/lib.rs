//! # Core Types
//!
//! The shared vocabulary of the signal pipeline: series reference data, the
//! Bronze/Silver/Gold observation layers, regime and z-score results, and the
//! sufficiency verdicts. Every other crate in the workspace depends on this one
//! and on nothing else at this layer.

pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{
    DataQuality, LevelClass, MultiSignal, Recommendation, Regime, SignalDirection,
    StrategyProfile, ThresholdSource, Transform, TrendClass, Unit, ZScoreMethod,
};
pub use error::CoreError;
pub use structs::{
    CheckOutcome, FactorLoadings, FeatureProvenance, FeatureRecord, MarketFactors, PricePoint,
    RawObservation, RegimeThresholds, SeriesDefinition, StandardObservation,
    SufficiencyAssessment, SufficiencyMetadata, VolatilityRegime, ZScoreResult,
};
