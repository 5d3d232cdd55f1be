//! The four independent sufficiency checks.
//!
//! Each check is a pure function of its inputs and returns a
//! [`CheckOutcome`] with a confidence in `[0, 1]`.

use chrono::{DateTime, Utc};
use core_types::CheckOutcome;
use std::collections::HashMap;
use std::time::Duration;

pub const HISTORICAL_DEPTH: &str = "historical_depth";
pub const INDICATOR_COMPLETENESS: &str = "indicator_completeness";
pub const FRESHNESS: &str = "freshness";
pub const FEATURE_AVAILABILITY: &str = "feature_availability";

fn ratio(count: usize, minimum: usize) -> f64 {
    if minimum == 0 {
        1.0
    } else {
        (count as f64 / minimum as f64).min(1.0)
    }
}

pub fn historical_depth(points: usize, minimum: usize, lookback_days: i64) -> CheckOutcome {
    CheckOutcome {
        name: HISTORICAL_DEPTH.to_string(),
        sufficient: points >= minimum,
        confidence: ratio(points, minimum),
        details: format!("{points} points in the last {lookback_days} days (minimum {minimum})"),
    }
}

/// Coverage of `required` by non-null, finite values. Also returns how many were present.
pub fn indicator_completeness(
    values: &HashMap<String, Option<f64>>,
    required: &[String],
    min_coverage: f64,
) -> (CheckOutcome, usize) {
    let missing: Vec<&str> = required
        .iter()
        .filter(|name| !matches!(values.get(name.as_str()), Some(Some(v)) if v.is_finite()))
        .map(String::as_str)
        .collect();
    let present = required.len() - missing.len();
    let coverage = if required.is_empty() {
        1.0
    } else {
        present as f64 / required.len() as f64
    };

    let details = if missing.is_empty() {
        format!("all {} required indicators present", required.len())
    } else {
        format!("{present}/{} indicators present; missing {}", required.len(), missing.join(", "))
    };

    let outcome = CheckOutcome {
        name: INDICATOR_COMPLETENESS.to_string(),
        sufficient: coverage >= min_coverage,
        confidence: coverage,
        details,
    };
    (outcome, present)
}

/// Full confidence up to `threshold`; beyond it confidence decays linearly,
/// reaching `floor` no later than twice the threshold.
pub fn freshness(
    last_update: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    threshold: Duration,
    floor: f64,
) -> CheckOutcome {
    let Some(last_update) = last_update else {
        return CheckOutcome {
            name: FRESHNESS.to_string(),
            sufficient: false,
            confidence: 0.0,
            details: "no update timestamp available".to_string(),
        };
    };

    let age_hours = ((now - last_update).num_seconds().max(0) as f64) / 3600.0;
    let threshold_hours = threshold.as_secs_f64() / 3600.0;

    let (sufficient, confidence) = if age_hours <= threshold_hours {
        (true, 1.0)
    } else if threshold_hours <= 0.0 {
        (false, floor)
    } else {
        let decayed = 1.0 - (age_hours - threshold_hours) / threshold_hours;
        (false, decayed.max(floor))
    };

    CheckOutcome {
        name: FRESHNESS.to_string(),
        sufficient,
        confidence,
        details: format!("last update {age_hours:.1}h ago (threshold {threshold_hours:.0}h)"),
    }
}

pub fn feature_availability(available: &[String], minimum: usize) -> CheckOutcome {
    CheckOutcome {
        name: FEATURE_AVAILABILITY.to_string(),
        sufficient: available.len() >= minimum,
        confidence: ratio(available.len(), minimum),
        details: if available.is_empty() {
            "no precomputed features available".to_string()
        } else {
            format!("{} features available: {}", available.len(), available.join(", "))
        },
    }
}
