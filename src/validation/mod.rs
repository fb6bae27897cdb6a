//! Rule engine over the built star schema.
//!
//! The rule set is closed and fixed. Every rule runs on every invocation,
//! whatever the earlier rules found, so the report is always complete.

mod plausibility;
mod range;
mod schema_rule;
mod temporal;

pub use plausibility::PlausibilityRule;
pub use range::RangeRule;
pub use temporal::TemporalRule;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::report::{Finding, RuleFamily};
use crate::star_schema::{StarSchema, TableFrames};
use tracing::{debug, info, warn};

/// Read-only view handed to every rule.
pub struct ValidationTables<'a> {
    pub schema: &'a StarSchema,
    pub frames: &'a TableFrames,
}

#[derive(Debug, Clone)]
pub enum ValidationRule {
    SchemaCompleteness,
    Range(RangeRule),
    TemporalCoverage(TemporalRule),
    EnergyPlausibility(PlausibilityRule),
}

impl ValidationRule {
    pub fn name(&self) -> &'static str {
        match self {
            ValidationRule::SchemaCompleteness => "schema_completeness",
            ValidationRule::Range(_) => "range",
            ValidationRule::TemporalCoverage(_) => "temporal_coverage",
            ValidationRule::EnergyPlausibility(_) => "energy_plausibility",
        }
    }

    pub fn family(&self) -> RuleFamily {
        match self {
            ValidationRule::SchemaCompleteness => RuleFamily::Schema,
            ValidationRule::Range(_) => RuleFamily::Range,
            ValidationRule::TemporalCoverage(_) => RuleFamily::Temporal,
            ValidationRule::EnergyPlausibility(_) => RuleFamily::Plausibility,
        }
    }

    pub fn evaluate(&self, tables: &ValidationTables) -> Result<Vec<Finding>> {
        match self {
            ValidationRule::SchemaCompleteness => schema_rule::evaluate(tables),
            ValidationRule::Range(rule) => rule.evaluate(tables),
            ValidationRule::TemporalCoverage(rule) => Ok(rule.evaluate(tables)),
            ValidationRule::EnergyPlausibility(rule) => rule.evaluate(tables),
        }
    }
}

pub struct Validator {
    rules: Vec<ValidationRule>,
}

impl Validator {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            rules: vec![
                ValidationRule::SchemaCompleteness,
                ValidationRule::Range(RangeRule::from_config(config)),
                ValidationRule::TemporalCoverage(TemporalRule::from_config(config)),
                ValidationRule::EnergyPlausibility(PlausibilityRule::from_config(config)),
            ],
        }
    }

    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    /// Evaluate all rules. A rule that fails to run becomes an error finding
    /// of its own family instead of aborting the rest.
    pub fn validate(&self, schema: &StarSchema) -> Vec<Finding> {
        let mut findings = Vec::new();
        let frames = match schema.to_frames() {
            Ok(frames) => frames,
            Err(e) => {
                warn!("Could not materialize tables: {}", e);
                findings.push(Finding::error(
                    RuleFamily::Schema,
                    "schema.materialize",
                    format!("tables could not be materialized: {}", e),
                    Vec::new(),
                ));
                TableFrames::default()
            }
        };
        findings.extend(self.validate_frames(schema, &frames));
        findings
    }

    /// Evaluate all rules against already materialized frames.
    pub fn validate_frames(&self, schema: &StarSchema, frames: &TableFrames) -> Vec<Finding> {
        let tables = ValidationTables { schema, frames };
        let mut findings = Vec::new();
        for rule in &self.rules {
            match rule.evaluate(&tables) {
                Ok(rule_findings) => {
                    debug!("Rule {} produced {} findings", rule.name(), rule_findings.len());
                    findings.extend(rule_findings);
                }
                Err(e) => {
                    warn!("Rule {} failed: {}", rule.name(), e);
                    findings.push(Finding::error(
                        rule.family(),
                        format!("{}.evaluation", rule.name()),
                        format!("rule could not be evaluated: {}", e),
                        Vec::new(),
                    ));
                }
            }
        }
        info!("Validation produced {} findings", findings.len());
        findings
    }
}

/// Reference for a whole (entity, scenario) group rather than a single row.
pub(crate) fn group_ref(
    table: &str,
    entity_column: &str,
    entity_key: u32,
    scenario_key: u32,
) -> String {
    format!(
        "{}/{}={}/scenario_key={}",
        table, entity_column, entity_key, scenario_key
    )
}

/// Values of the `row_ref` column, in row order.
pub(crate) fn row_refs(df: &polars::prelude::DataFrame) -> Result<Vec<String>> {
    let column = df.column("row_ref")?.str()?;
    Ok(column
        .into_iter()
        .enumerate()
        .map(|(i, r)| r.map(str::to_string).unwrap_or_else(|| format!("#{}", i)))
        .collect())
}
