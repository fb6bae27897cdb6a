//! Pipeline configuration.
//!
//! Escalation thresholds are explicit constants rather than inferred from the
//! data. Every field has a default so a partial JSON file is enough.

use crate::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Inclusive bounds for one fact column. `None` leaves that side open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeBound {
    pub table: String,
    pub column: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl RangeBound {
    pub fn new(table: &str, column: &str, min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
            min,
            max,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |lo| value >= lo) && self.max.map_or(true, |hi| value <= hi)
    }

    pub fn describe(&self) -> String {
        match (self.min, self.max) {
            (Some(lo), Some(hi)) => format!("[{}, {}]", lo, hi),
            (Some(lo), None) => format!(">= {}", lo),
            (None, Some(hi)) => format!("<= {}", hi),
            (None, None) => "unbounded".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bypass the rule engine entirely
    pub skip_validation: bool,

    /// Fraction of violating rows in a table above which range findings become errors
    pub range_error_fraction: f64,

    /// Missing + duplicate timestamps in one group at which a gap finding becomes an error
    pub temporal_gap_error_count: usize,

    /// `|power_kw|` at or below this leaves `cop_proxy` null
    pub cop_power_epsilon_kw: f64,

    /// Lower bound of electric / (heating + cooling) over a run
    pub plausibility_min_electric_ratio: f64,

    /// Upper bound of electric / (heating + cooling) over a run
    pub plausibility_max_electric_ratio: f64,

    /// Fraction of excluded runs above which extraction exclusions become an error
    pub max_excluded_run_fraction: f64,

    pub range_bounds: Vec<RangeBound>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            skip_validation: false,
            range_error_fraction: 0.05,
            temporal_gap_error_count: 24,
            cop_power_epsilon_kw: 1e-9,
            plausibility_min_electric_ratio: 0.2,
            plausibility_max_electric_ratio: 10.0,
            max_excluded_run_fraction: 0.5,
            range_bounds: default_range_bounds(),
        }
    }
}

pub fn default_range_bounds() -> Vec<RangeBound> {
    let zone = "fact_zone_conditions";
    let hvac = "fact_hvac";
    let meters = "fact_meters";
    let weather = "fact_weather";
    vec![
        RangeBound::new(zone, "air_temp_c", Some(10.0), Some(35.0)),
        RangeBound::new(zone, "co2_ppm", Some(400.0), Some(2500.0)),
        RangeBound::new(zone, "rh_pct", Some(0.0), Some(100.0)),
        RangeBound::new(hvac, "power_kw", Some(0.0), None),
        RangeBound::new(hvac, "heating_kw", Some(0.0), None),
        RangeBound::new(hvac, "cooling_kw", Some(0.0), None),
        RangeBound::new(meters, "electric_kwh", Some(0.0), None),
        RangeBound::new(meters, "heating_kwh", Some(0.0), None),
        RangeBound::new(meters, "cooling_kwh", Some(0.0), None),
        RangeBound::new(weather, "drybulb_c", Some(-30.0), Some(40.0)),
        RangeBound::new(weather, "relhum_pct", Some(0.0), Some(100.0)),
        RangeBound::new(weather, "ghi_w_m2", Some(0.0), None),
    ]
}

impl PipelineConfig {
    /// Load a JSON configuration file; absent fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let fractions = [
            ("range_error_fraction", self.range_error_fraction),
            ("max_excluded_run_fraction", self.max_excluded_run_fraction),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(EtlError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.temporal_gap_error_count == 0 {
            return Err(EtlError::Config(
                "temporal_gap_error_count must be at least 1".to_string(),
            ));
        }
        if !(self.cop_power_epsilon_kw >= 0.0) {
            return Err(EtlError::Config(format!(
                "cop_power_epsilon_kw must be non-negative, got {}",
                self.cop_power_epsilon_kw
            )));
        }
        if !(self.plausibility_min_electric_ratio > 0.0
            && self.plausibility_min_electric_ratio < self.plausibility_max_electric_ratio)
        {
            return Err(EtlError::Config(format!(
                "plausibility ratio bounds must satisfy 0 < min < max, got [{}, {}]",
                self.plausibility_min_electric_ratio, self.plausibility_max_electric_ratio
            )));
        }
        for bound in &self.range_bounds {
            if let (Some(lo), Some(hi)) = (bound.min, bound.max) {
                if lo > hi {
                    return Err(EtlError::Config(format!(
                        "range bound {}.{} has min {} above max {}",
                        bound.table, bound.column, lo, hi
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "temporal_gap_error_count": 6 }"#).unwrap();
        assert_eq!(config.temporal_gap_error_count, 6);
        assert_eq!(config.range_error_fraction, 0.05);
        assert_eq!(config.range_bounds.len(), default_range_bounds().len());
    }

    #[test]
    fn test_rejects_inverted_ratio_bounds() {
        let config = PipelineConfig {
            plausibility_min_electric_ratio: 5.0,
            plausibility_max_electric_ratio: 1.0,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(EtlError::Config(_))));
    }

    #[test]
    fn test_range_bound_is_inclusive() {
        let bound = RangeBound::new("fact_zone_conditions", "air_temp_c", Some(10.0), Some(35.0));
        assert!(bound.contains(10.0));
        assert!(bound.contains(35.0));
        assert!(!bound.contains(45.0));
        assert_eq!(bound.describe(), "[10, 35]");
    }
}
