use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The canonical units a standardized observation can be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    /// Percentages stored as decimals (5% -> 0.05).
    PercentDecimal,
    /// Base US dollars.
    Usd,
    /// Plain counts (persons, units, contracts).
    Count,
    /// Index points, never rescaled.
    IndexPoint,
}

impl Unit {
    /// The unit string a value already in this unit is tagged with.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Unit::PercentDecimal => "decimal",
            Unit::Usd => "usd",
            Unit::Count => "count",
            Unit::IndexPoint => "index",
        }
    }

    /// Suggested number of decimal places when the value is displayed downstream.
    pub fn precision_hint(&self) -> u8 {
        match self {
            Unit::PercentDecimal => 4,
            Unit::Usd | Unit::Count => 0,
            Unit::IndexPoint => 2,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

impl FromStr for Unit {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "decimal" | "percent_decimal" => Ok(Unit::PercentDecimal),
            "usd" => Ok(Unit::Usd),
            "count" => Ok(Unit::Count),
            "index" | "index_point" => Ok(Unit::IndexPoint),
            other => Err(CoreError::UnknownCode {
                kind: "unit",
                value: other.to_string(),
            }),
        }
    }
}

/// The named transforms that turn a standardized level into the series' reported value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Transform {
    Level,
    Yoy,
    Mom,
    LogLevel,
}

impl Transform {
    /// The stable code used as part of the upsert key.
    pub fn code(&self) -> &'static str {
        match self {
            Transform::Level => "LEVEL",
            Transform::Yoy => "YOY",
            Transform::Mom => "MOM",
            Transform::LogLevel => "LOG_LEVEL",
        }
    }

    /// How many months back a transform needs to look, if any.
    pub fn lookback_months(&self) -> Option<u32> {
        match self {
            Transform::Yoy => Some(12),
            Transform::Mom => Some(1),
            Transform::Level | Transform::LogLevel => None,
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Transform {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LEVEL" => Ok(Transform::Level),
            "YOY" => Ok(Transform::Yoy),
            "MOM" => Ok(Transform::Mom),
            "LOG_LEVEL" | "LOG" => Ok(Transform::LogLevel),
            other => Err(CoreError::UnknownCode {
                kind: "transform",
                value: other.to_string(),
            }),
        }
    }
}

/// Whether a derived value could be produced exactly as requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    #[default]
    Exact,
    /// An unrecognized unit was passed through or a transform fell back to LEVEL.
    Degraded,
}

impl DataQuality {
    pub fn is_degraded(&self) -> bool {
        matches!(self, DataQuality::Degraded)
    }

    /// Combines two quality flags, keeping the worse of the two.
    pub fn worst(self, other: DataQuality) -> DataQuality {
        if self.is_degraded() || other.is_degraded() {
            DataQuality::Degraded
        } else {
            DataQuality::Exact
        }
    }
}

/// Qualitative bucket for a level z-score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LevelClass {
    ExtremeLow,
    Low,
    Normal,
    High,
    ExtremeHigh,
}

/// Qualitative bucket for a change z-score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendClass {
    StrongDown,
    Down,
    Flat,
    Up,
    StrongUp,
}

/// The composite reading of a level bucket combined with a trend bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MultiSignal {
    /// Elevated level that is still rising.
    Overheating,
    /// Elevated level that has started to fall.
    Cooling,
    /// Depressed level that has started to rise.
    Recovering,
    /// Depressed level that is still falling.
    Deteriorating,
    /// Normal level with a strong upward change.
    Accelerating,
    /// Normal level with a strong downward change.
    Decelerating,
    Stable,
}

/// Qualitative volatility state derived from a volatility index reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Low,
    Normal,
    High,
    Crisis,
}

impl Regime {
    pub fn is_stressed(&self) -> bool {
        matches!(self, Regime::High | Regime::Crisis)
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Regime::Low => "low",
            Regime::Normal => "normal",
            Regime::High => "high",
            Regime::Crisis => "crisis",
        };
        f.write_str(s)
    }
}

/// Where the regime cut points came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdSource {
    Static,
    Dynamic,
}

/// Signal-generation posture recommended for a regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyProfile {
    Conservative,
    Moderate,
    Aggressive,
}

/// The Sufficiency Gate's verdict on whether a calculation should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Proceed,
    Degrade,
    Skip,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Recommendation::Proceed => "PROCEED",
            Recommendation::Degrade => "DEGRADE",
            Recommendation::Skip => "SKIP",
        };
        f.write_str(s)
    }
}

/// The dispersion estimator a z-score was computed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZScoreMethod {
    Winsorized,
    Mad,
    /// Plain mean/std, used only by the degraded fallback path.
    Simple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalDirection {
    Long,
    Short,
    Neutral,
}
