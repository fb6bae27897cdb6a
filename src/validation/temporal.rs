//! Temporal coverage: every (entity, scenario) group must hold exactly the
//! hourly grid declared by its building's run.

use super::{group_ref, ValidationTables};
use crate::config::PipelineConfig;
use crate::context::DimensionContext;
use crate::report::{Finding, RuleFamily, Severity};
use crate::star_schema::{FactRow, SurrogateKey};
use chrono::NaiveDateTime;
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
pub struct TemporalRule {
    error_count: usize,
}

/// Observed vs expected timestamps of one group.
struct Coverage<'a> {
    expected: &'a [NaiveDateTime],
    observed: BTreeMap<NaiveDateTime, Vec<String>>,
}

impl<'a> Coverage<'a> {
    fn missing(&self) -> Vec<NaiveDateTime> {
        self.expected
            .iter()
            .filter(|ts| !self.observed.contains_key(ts))
            .copied()
            .collect()
    }

    fn duplicates(&self) -> Vec<(NaiveDateTime, &[String])> {
        self.observed
            .iter()
            .filter(|(_, refs)| refs.len() > 1)
            .map(|(ts, refs)| (*ts, refs.as_slice()))
            .collect()
    }

    fn unexpected(&self) -> Vec<(NaiveDateTime, &[String])> {
        let expected: BTreeSet<&NaiveDateTime> = self.expected.iter().collect();
        self.observed
            .iter()
            .filter(|(ts, _)| !expected.contains(ts))
            .map(|(ts, refs)| (*ts, refs.as_slice()))
            .collect()
    }
}

fn format_timestamps(timestamps: impl Iterator<Item = NaiveDateTime>) -> String {
    format!(
        "[{}]",
        timestamps.map(|ts| ts.format("%Y-%m-%d %H:%M:%S")).join(", ")
    )
}

impl TemporalRule {
    pub fn new(error_count: usize) -> Self {
        Self { error_count }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.temporal_gap_error_count)
    }

    pub fn evaluate(&self, tables: &ValidationTables) -> Vec<Finding> {
        let schema = tables.schema;
        let dims = &schema.dimensions;
        let buildings: Vec<(SurrogateKey, SurrogateKey)> = dims
            .buildings
            .iter()
            .map(|b| (b.building_key, b.building_key))
            .collect();

        let mut findings = Vec::new();
        findings.extend(self.check_table(&schema.fact_zone_conditions, &[], dims));
        findings.extend(self.check_table(&schema.fact_hvac, &[], dims));
        findings.extend(self.check_table(&schema.fact_meters, &buildings, dims));
        findings.extend(self.check_table(&schema.fact_weather, &buildings, dims));
        findings
    }

    /// `entities` pairs each entity key with its owning building key and gets a
    /// group for every scenario its building was simulated under, even without
    /// rows. Other groups exist only where readings were observed.
    fn check_table<F: FactRow>(
        &self,
        rows: &[F],
        entities: &[(SurrogateKey, SurrogateKey)],
        dims: &DimensionContext,
    ) -> Vec<Finding> {
        let mut groups: BTreeMap<(SurrogateKey, SurrogateKey), Coverage> = BTreeMap::new();
        for &(entity_key, building_key) in entities {
            for (&(b, scenario_key), grid) in dims.run_grids() {
                if b == building_key {
                    groups.insert(
                        (entity_key, scenario_key),
                        Coverage {
                            expected: grid.as_slice(),
                            observed: BTreeMap::new(),
                        },
                    );
                }
            }
        }

        for row in rows {
            let grain = row.grain();
            let coverage = groups
                .entry((grain.entity_key, grain.scenario_key))
                .or_insert_with(|| Coverage {
                    expected: row
                        .building_key(dims)
                        .and_then(|b| dims.expected_grid(b, grain.scenario_key))
                        .unwrap_or(&[]),
                    observed: BTreeMap::new(),
                });
            coverage
                .observed
                .entry(row.timestamp())
                .or_default()
                .push(row.row_ref().to_string());
        }

        let mut findings = Vec::new();
        for ((entity_key, scenario_key), coverage) in &groups {
            let missing = coverage.missing();
            let duplicates = coverage.duplicates();
            let unexpected = coverage.unexpected();
            let issues = missing.len() + duplicates.len() + unexpected.len();
            if issues == 0 {
                continue;
            }

            let group = group_ref(F::TABLE, F::ENTITY_COLUMN, *entity_key, *scenario_key);
            let mut refs: Vec<String> = missing
                .iter()
                .map(|ts| format!("{}@{}", group, ts.format("%Y-%m-%dT%H:%M:%S")))
                .collect();
            refs.extend(duplicates.iter().flat_map(|(_, r)| r.iter().cloned()));
            refs.extend(unexpected.iter().flat_map(|(_, r)| r.iter().cloned()));

            let mut parts = Vec::new();
            if !missing.is_empty() {
                parts.push(format!(
                    "{} missing {}",
                    missing.len(),
                    format_timestamps(missing.iter().copied())
                ));
            }
            if !duplicates.is_empty() {
                parts.push(format!(
                    "{} duplicated {}",
                    duplicates.len(),
                    format_timestamps(duplicates.iter().map(|(ts, _)| *ts))
                ));
            }
            if !unexpected.is_empty() {
                parts.push(format!(
                    "{} off-grid {}",
                    unexpected.len(),
                    format_timestamps(unexpected.iter().map(|(ts, _)| *ts))
                ));
            }

            let severity = if issues >= self.error_count {
                Severity::Error
            } else {
                Severity::Warning
            };
            findings.push(Finding::new(
                RuleFamily::Temporal,
                severity,
                format!("temporal.{}", F::TABLE),
                format!(
                    "{} {}={} scenario_key={} ({} expected hours): {}",
                    F::TABLE,
                    F::ENTITY_COLUMN,
                    entity_key,
                    scenario_key,
                    coverage.expected.len(),
                    parts.join("; ")
                ),
                refs,
            ));
        }
        findings
    }
}
