use core_types::{DataQuality, Unit};

/// A raw value expressed in its series' canonical unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StandardizedValue {
    pub value: f64,
    /// Power of ten the raw value was multiplied by.
    pub scale: i32,
    pub quality: DataQuality,
}

impl StandardizedValue {
    fn scaled(raw: f64, scale: i32) -> Self {
        let factor = 10f64.powi(scale.abs());
        Self {
            value: if scale < 0 { raw / factor } else { raw * factor },
            scale,
            quality: DataQuality::Exact,
        }
    }

    fn unchanged(raw: f64, quality: DataQuality) -> Self {
        Self {
            value: raw,
            scale: 0,
            quality,
        }
    }
}

/// Converts `value`, published in `raw_unit`, into `target`.
///
/// Unit strings are matched case-insensitively with spaces and hyphens
/// treated as underscores. Unrecognised units never fail: the value is
/// passed through unchanged and flagged [`DataQuality::Degraded`].
pub fn standardize(value: f64, raw_unit: &str, target: Unit) -> StandardizedValue {
    let unit = normalize(raw_unit);

    let scale = match (target, unit.as_str()) {
        (Unit::PercentDecimal, "decimal" | "percent_decimal" | "ratio" | "fraction") => Some(0),
        (Unit::PercentDecimal, "percent" | "%" | "pct" | "percentage" | "percent_change") => Some(-2),
        (Unit::PercentDecimal, "bps" | "basis_points" | "basis_point") => Some(-4),

        (Unit::Usd, "usd" | "dollars" | "$") => Some(0),
        (Unit::Usd, "thousands" | "thousands_usd" | "usd_thousands" | "thousands_of_dollars") => Some(3),
        (Unit::Usd, "millions" | "millions_usd" | "usd_millions" | "millions_of_dollars") => Some(6),
        (Unit::Usd, "billions" | "billions_usd" | "usd_billions" | "billions_of_dollars") => Some(9),

        (Unit::Count, "count" | "persons" | "number" | "units") => Some(0),
        (Unit::Count, "thousands" | "thousands_of_persons" | "thousands_of_units") => Some(3),
        (Unit::Count, "millions" | "millions_of_persons") => Some(6),

        (Unit::IndexPoint, "index" | "index_point" | "index_points" | "points") => Some(0),

        _ => None,
    };

    match scale {
        Some(0) => StandardizedValue::unchanged(value, DataQuality::Exact),
        Some(scale) => StandardizedValue::scaled(value, scale),
        None => {
            tracing::warn!(raw_unit, target = %target, "Unrecognised unit; passing value through unchanged");
            StandardizedValue::unchanged(value, DataQuality::Degraded)
        }
    }
}

fn normalize(raw_unit: &str) -> String {
    raw_unit
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn percent_becomes_decimal() {
        let s = standardize(5.25, "Percent", Unit::PercentDecimal);
        assert!((s.value - 0.0525).abs() < 1e-15);
        assert_eq!(s.scale, -2);
        assert_eq!(s.quality, DataQuality::Exact);
    }

    #[test]
    fn basis_points_become_decimal() {
        let s = standardize(25.0, "basis points", Unit::PercentDecimal);
        assert!((s.value - 0.0025).abs() < 1e-15);
        assert_eq!(s.scale, -4);
    }

    #[test]
    fn dollar_scales_multiply_to_base_units() {
        assert_eq!(standardize(1.5, "billions", Unit::Usd).value, 1.5e9);
        assert_eq!(standardize(2.0, "Millions", Unit::Usd).value, 2.0e6);
        assert_eq!(standardize(3.0, "thousands", Unit::Usd).value, 3.0e3);
    }

    #[test]
    fn count_thousands_multiply_by_one_thousand() {
        let s = standardize(150.5, "thousands", Unit::Count);
        assert_eq!(s.value, 150_500.0);
        assert_eq!(s.scale, 3);
    }

    #[test]
    fn unknown_unit_passes_through_degraded() {
        let s = standardize(42.0, "furlongs", Unit::Count);
        assert_eq!(s.value, 42.0);
        assert_eq!(s.scale, 0);
        assert!(s.quality.is_degraded());
    }

    #[test]
    fn unit_that_does_not_fit_the_target_is_degraded() {
        let s = standardize(4.0, "percent", Unit::Usd);
        assert_eq!(s.value, 4.0);
        assert!(s.quality.is_degraded());
    }

    proptest! {
        #[test]
        fn canonical_values_are_left_alone(value in -1.0e12f64..1.0e12, idx in 0usize..4) {
            let target = [Unit::PercentDecimal, Unit::Usd, Unit::Count, Unit::IndexPoint][idx];
            let s = standardize(value, target.canonical_name(), target);
            prop_assert_eq!(s.value, value);
            prop_assert_eq!(s.quality, DataQuality::Exact);
        }

        #[test]
        fn standardize_is_deterministic(value in -1.0e9f64..1.0e9, unit in "[a-z %]{0,12}") {
            let a = standardize(value, &unit, Unit::PercentDecimal);
            let b = standardize(value, &unit, Unit::PercentDecimal);
            prop_assert_eq!(a, b);
        }
    }
}
