//! Energy plausibility heuristics. Findings are warnings only.

use super::{group_ref, ValidationTables};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::report::{Finding, RuleFamily};
use crate::star_schema::{energy_summary, FactMeter, FactRow};

#[derive(Debug, Clone)]
pub struct PlausibilityRule {
    min_electric_ratio: f64,
    max_electric_ratio: f64,
}

impl PlausibilityRule {
    pub fn new(min_electric_ratio: f64, max_electric_ratio: f64) -> Self {
        Self {
            min_electric_ratio,
            max_electric_ratio,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.plausibility_min_electric_ratio,
            config.plausibility_max_electric_ratio,
        )
    }

    pub fn evaluate(&self, tables: &ValidationTables) -> Result<Vec<Finding>> {
        let Some(meters) = tables.frames.get(FactMeter::TABLE) else {
            return Ok(Vec::new());
        };
        let dims = &tables.schema.dimensions;
        let summaries = energy_summary(meters, dims)?;

        let mut findings = Vec::new();
        for (&(building_key, scenario_key), _) in dims.run_grids() {
            let label = format!(
                "{}/{}",
                dims.building(building_key)
                    .map(|b| b.building_id.as_str())
                    .unwrap_or("?"),
                dims.scenario(scenario_key)
                    .map(|s| s.scenario_id.as_str())
                    .unwrap_or("?")
            );
            let refs = vec![group_ref(
                FactMeter::TABLE,
                FactMeter::ENTITY_COLUMN,
                building_key,
                scenario_key,
            )];
            let summary = summaries
                .iter()
                .find(|s| s.building_key == building_key && s.scenario_key == scenario_key);

            let Some(summary) = summary else {
                findings.push(Finding::warning(
                    RuleFamily::Plausibility,
                    "plausibility.total_energy",
                    format!("{}: no meter readings, total period energy is 0", label),
                    refs,
                ));
                continue;
            };

            let total = summary.total_energy_kwh();
            if total <= 0.0 {
                findings.push(Finding::warning(
                    RuleFamily::Plausibility,
                    "plausibility.total_energy",
                    format!("{}: total period energy is {:.3} kWh", label, total),
                    refs,
                ));
                continue;
            }

            match summary.electric_ratio() {
                None => findings.push(Finding::warning(
                    RuleFamily::Plausibility,
                    "plausibility.electric_ratio",
                    format!(
                        "{}: {:.1} kWh electric with no heating or cooling energy",
                        label, summary.total_electric_kwh
                    ),
                    refs,
                )),
                Some(ratio)
                    if ratio < self.min_electric_ratio || ratio > self.max_electric_ratio =>
                {
                    findings.push(Finding::warning(
                        RuleFamily::Plausibility,
                        "plausibility.electric_ratio",
                        format!(
                            "{}: electric / (heating + cooling) = {:.3}, expected within [{}, {}]",
                            label, ratio, self.min_electric_ratio, self.max_electric_ratio
                        ),
                        refs,
                    ))
                }
                Some(_) => {}
            }
        }
        Ok(findings)
    }
}
