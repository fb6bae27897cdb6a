//! Per-column inclusive range checks on the fact frames.

use super::{row_refs, ValidationTables};
use crate::config::{PipelineConfig, RangeBound};
use crate::error::Result;
use crate::report::{Finding, RuleFamily, Severity};
use polars::prelude::*;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone)]
pub struct RangeRule {
    bounds: Vec<RangeBound>,
    error_fraction: f64,
}

struct ColumnViolations<'a> {
    bound: &'a RangeBound,
    refs: Vec<String>,
    observed_min: Option<f64>,
    observed_max: Option<f64>,
}

impl RangeRule {
    pub fn new(bounds: Vec<RangeBound>, error_fraction: f64) -> Self {
        Self {
            bounds,
            error_fraction,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.range_bounds.clone(), config.range_error_fraction)
    }

    /// One finding per (table, column) with violations. Severity is decided per
    /// table from the share of rows violating any bound.
    pub fn evaluate(&self, tables: &ValidationTables) -> Result<Vec<Finding>> {
        let mut by_table: BTreeMap<&str, Vec<&RangeBound>> = BTreeMap::new();
        for bound in &self.bounds {
            by_table.entry(bound.table.as_str()).or_default().push(bound);
        }

        let mut findings = Vec::new();
        for bound in &self.bounds {
            // Tables are visited in configuration order
            let table = bound.table.as_str();
            let Some(table_bounds) = by_table.remove(table) else {
                continue;
            };
            // Missing tables or columns are reported by the completeness rule
            let Some(df) = tables.frames.get(table) else {
                continue;
            };
            if df.height() == 0 {
                continue;
            }

            let mut violations = Vec::new();
            for bound in table_bounds {
                if !df.get_column_names().contains(&bound.column.as_str()) {
                    continue;
                }
                if let Some(v) = column_violations(df, bound)? {
                    violations.push(v);
                }
            }

            let violating_rows: HashSet<&String> =
                violations.iter().flat_map(|v| v.refs.iter()).collect();
            let fraction = violating_rows.len() as f64 / df.height() as f64;
            let severity = if fraction > self.error_fraction {
                Severity::Error
            } else {
                Severity::Warning
            };

            for v in violations {
                let observed = match (v.observed_min, v.observed_max) {
                    (Some(lo), Some(hi)) => format!(", observed {} to {}", lo, hi),
                    _ => String::new(),
                };
                findings.push(Finding::new(
                    RuleFamily::Range,
                    severity,
                    format!("range.{}.{}", table, v.bound.column),
                    format!(
                        "{} of {} rows in {}.{} outside {}{} ({:.1}% of table rows violate a bound)",
                        v.refs.len(),
                        df.height(),
                        table,
                        v.bound.column,
                        v.bound.describe(),
                        observed,
                        fraction * 100.0
                    ),
                    v.refs,
                ));
            }
        }
        Ok(findings)
    }
}

fn violation_predicate(bound: &RangeBound) -> Option<Expr> {
    let column = bound.column.as_str();
    let below = bound.min.map(|lo| col(column).lt(lit(lo)));
    let above = bound.max.map(|hi| col(column).gt(lit(hi)));
    match (below, above) {
        (Some(below), Some(above)) => Some(below.or(above)),
        (Some(below), None) => Some(below),
        (None, Some(above)) => Some(above),
        (None, None) => None,
    }
}

fn column_violations<'a>(df: &DataFrame, bound: &'a RangeBound) -> Result<Option<ColumnViolations<'a>>> {
    let Some(predicate) = violation_predicate(bound) else {
        return Ok(None);
    };
    let column = bound.column.as_str();
    let violating = df
        .clone()
        .lazy()
        .filter(predicate)
        .select([col("row_ref"), col(column)])
        .collect()?;
    if violating.height() == 0 {
        return Ok(None);
    }
    let values = violating.column(column)?.f64()?;
    Ok(Some(ColumnViolations {
        bound,
        refs: row_refs(&violating)?,
        observed_min: values.min(),
        observed_max: values.max(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::star_schema::{StarSchema, TableFrames};

    fn zone_frame(temps: &[f64]) -> DataFrame {
        let refs: Vec<String> = (0..temps.len()).map(|i| format!("run/zones.csv#{}", i)).collect();
        df! {
            "air_temp_c" => temps,
            "co2_ppm" => vec![500.0; temps.len()],
            "row_ref" => refs
        }
        .unwrap()
    }

    fn evaluate_zone(temps: &[f64], error_fraction: f64) -> Vec<Finding> {
        let schema = StarSchema::default();
        let mut frames = TableFrames::default();
        frames.insert("fact_zone_conditions", zone_frame(temps));
        let rule = RangeRule::new(
            vec![
                RangeBound::new("fact_zone_conditions", "air_temp_c", Some(10.0), Some(35.0)),
                RangeBound::new("fact_zone_conditions", "co2_ppm", Some(400.0), Some(2500.0)),
            ],
            error_fraction,
        );
        rule.evaluate(&ValidationTables {
            schema: &schema,
            frames: &frames,
        })
        .unwrap()
    }

    #[test]
    fn test_single_violation_is_warning() {
        let mut temps = vec![21.0; 99];
        temps.push(45.0);
        let findings = evaluate_zone(&temps, 0.05);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert_eq!(findings[0].rule_name, "range.fact_zone_conditions.air_temp_c");
        assert_eq!(findings[0].affected_row_refs, vec!["run/zones.csv#99".to_string()]);
    }

    #[test]
    fn test_escalates_past_fraction() {
        let findings = evaluate_zone(&[45.0, 5.0, 21.0, 21.0], 0.05);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Error);
        assert_eq!(findings[0].affected_row_refs.len(), 2);
    }

    #[test]
    fn test_bounds_are_inclusive() {
        assert!(evaluate_zone(&[10.0, 35.0], 0.05).is_empty());
    }
}
