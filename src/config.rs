//! Inference thresholds.
//!
//! The defaults reproduce the fixed decision table of the column inferencer. Every threshold is
//! a missing-fraction (or, for the categorical check, a distinct-fraction) in `[0, 1]`, compared
//! with a strict `<`.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Thresholds and parser preferences for column type inference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceOptions {
    /// Commit to `Int64` when the integer attempt's missing-fraction is below this.
    pub integer_max_missing: f64,
    /// Commit to `Bool` when the boolean attempt's missing-fraction is below this.
    pub boolean_max_missing: f64,
    /// Commit to `DateTime` when the date attempt's missing-fraction is below this.
    pub date_max_missing: f64,
    /// Commit to `Duration` when the duration attempt's missing-fraction is below this.
    pub duration_max_missing: f64,
    /// Tag as `Categorical` when `distinct / len` is below this.
    pub categorical_max_cardinality: f64,
    /// The best remaining candidate is only used when its missing-fraction is below this.
    pub fallback_max_missing: f64,
    /// Read ambiguous numeric dates such as `10/11/12` as day-first.
    pub day_first: bool,
}

pub const DEFAULT_INTEGER_MAX_MISSING: f64 = 0.10;
pub const DEFAULT_BOOLEAN_MAX_MISSING: f64 = 0.20;
pub const DEFAULT_DATE_MAX_MISSING: f64 = 0.10;
pub const DEFAULT_DURATION_MAX_MISSING: f64 = 0.10;
pub const DEFAULT_CATEGORICAL_MAX_CARDINALITY: f64 = 0.40;
pub const DEFAULT_FALLBACK_MAX_MISSING: f64 = 0.50;

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            integer_max_missing: DEFAULT_INTEGER_MAX_MISSING,
            boolean_max_missing: DEFAULT_BOOLEAN_MAX_MISSING,
            date_max_missing: DEFAULT_DATE_MAX_MISSING,
            duration_max_missing: DEFAULT_DURATION_MAX_MISSING,
            categorical_max_cardinality: DEFAULT_CATEGORICAL_MAX_CARDINALITY,
            fallback_max_missing: DEFAULT_FALLBACK_MAX_MISSING,
            day_first: true,
        }
    }
}

impl InferenceOptions {
    /// Load options from JSON; missing keys keep their defaults.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let opts: Self = serde_json::from_str(s)?;
        opts.validate()?;
        Ok(opts)
    }

    /// Reject thresholds outside `[0, 1]` (NaN included).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let thresholds = [
            ("integer_max_missing", self.integer_max_missing),
            ("boolean_max_missing", self.boolean_max_missing),
            ("date_max_missing", self.date_max_missing),
            ("duration_max_missing", self.duration_max_missing),
            ("categorical_max_cardinality", self.categorical_max_cardinality),
            ("fallback_max_missing", self.fallback_max_missing),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let opts = InferenceOptions::from_json_str(r#"{"boolean_max_missing": 0.3}"#).unwrap();
        assert_eq!(opts.boolean_max_missing, 0.3);
        assert_eq!(opts.integer_max_missing, DEFAULT_INTEGER_MAX_MISSING);
        assert!(opts.day_first);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let err = InferenceOptions::from_json_str(r#"{"fallback_max_missing": 1.5}"#).unwrap_err();
        match err {
            ConfigError::InvalidThreshold { name, value } => {
                assert_eq!(name, "fallback_max_missing");
                assert_eq!(value, 1.5);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn nan_threshold_is_rejected() {
        let opts = InferenceOptions {
            date_max_missing: f64::NAN,
            ..InferenceOptions::default()
        };
        assert!(opts.validate().is_err());
    }
}
