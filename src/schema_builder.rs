//! Fact table construction.
//!
//! Natural keys are swapped for surrogate keys, derived metrics are computed
//! per row and the grain contract is checked. Defects are returned as
//! findings so one broken run never stops the others from being built.

use crate::config::PipelineConfig;
use crate::context::DimensionContext;
use crate::records::{
    RowRef, SimulationRun, HVAC_FILE, METERS_FILE, WEATHER_FILE, ZONES_FILE,
};
use crate::report::{Finding, RuleFamily};
use crate::star_schema::{
    FactHvac, FactMeter, FactRow, FactWeather, FactZoneCondition, GrainKey, StarSchema,
    SurrogateKey,
};
use itertools::Itertools;
use std::collections::{BTreeSet, HashMap};
use tracing::{info, warn};

/// Built schema plus the defects found while building it.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub schema: StarSchema,
    pub defects: Vec<Finding>,
}

/// `air_temp_C - setpoint_C`, unclamped.
pub fn temp_deviation(air_temp_c: f64, setpoint_c: f64) -> f64 {
    air_temp_c - setpoint_c
}

/// Thermal output over electric power; null when power is within `epsilon` of zero.
pub fn cop_proxy(heating_kw: f64, cooling_kw: f64, power_kw: f64, epsilon: f64) -> Option<f64> {
    if !power_kw.is_finite() || power_kw.abs() <= epsilon {
        return None;
    }
    let cop = (heating_kw + cooling_kw) / power_kw;
    cop.is_finite().then_some(cop)
}

/// Rows of one (table, run) whose keys did not resolve.
struct Unresolved {
    table: &'static str,
    run_id: String,
    refs: Vec<String>,
    reasons: BTreeSet<String>,
}

impl Unresolved {
    fn new(table: &'static str, run_id: &str) -> Self {
        Self {
            table,
            run_id: run_id.to_string(),
            refs: Vec::new(),
            reasons: BTreeSet::new(),
        }
    }

    fn record(&mut self, row_ref: &RowRef, missing: Vec<String>) {
        self.refs.push(row_ref.to_string());
        self.reasons.extend(missing);
    }

    fn into_finding(self) -> Option<Finding> {
        if self.refs.is_empty() {
            return None;
        }
        Some(Finding::error(
            RuleFamily::ReferentialIntegrity,
            format!("referential_integrity.{}", self.table),
            format!(
                "{} rows of run {} reference unresolved keys: {}",
                self.refs.len(),
                self.run_id,
                self.reasons.iter().join(", ")
            ),
            self.refs,
        ))
    }
}

fn resolve(
    key: Option<SurrogateKey>,
    label: impl FnOnce() -> String,
    missing: &mut Vec<String>,
) -> Option<SurrogateKey> {
    if key.is_none() {
        missing.push(label());
    }
    key
}

pub struct SchemaBuilder {
    cop_power_epsilon_kw: f64,
}

impl SchemaBuilder {
    pub fn new(cop_power_epsilon_kw: f64) -> Self {
        Self {
            cop_power_epsilon_kw,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.cop_power_epsilon_kw)
    }

    /// Build the four fact tables. Takes ownership of the dimension context,
    /// which travels on inside the schema.
    pub fn build(&self, dims: DimensionContext, runs: &[SimulationRun]) -> BuildOutput {
        let mut schema = StarSchema::default();
        let mut defects = Vec::new();

        for run in runs {
            let meta = &run.metadata;
            let run_building = dims.building_key(&meta.building_id);
            let scenario = dims.scenario_key(&meta.scenario_id);
            let run_id = run.run_id.as_str();

            let mut unresolved = Unresolved::new(FactZoneCondition::TABLE, run_id);
            for (row, r) in run.zones.iter().enumerate() {
                let row_ref = RowRef::new(run_id, ZONES_FILE, row);
                let mut missing = Vec::new();
                let time_key = resolve(
                    dims.time_key(&r.timestamp),
                    || format!("timestamp {}", r.timestamp),
                    &mut missing,
                );
                let zone_key = resolve(
                    dims.zone_key(&r.building_id, &r.zone_id),
                    || format!("zone {}/{}", r.building_id, r.zone_id),
                    &mut missing,
                );
                let scenario_key =
                    resolve(scenario, || format!("scenario {}", meta.scenario_id), &mut missing);
                match (time_key, zone_key, scenario_key) {
                    (Some(time_key), Some(zone_key), Some(scenario_key)) => {
                        schema.fact_zone_conditions.push(FactZoneCondition {
                            time_key,
                            zone_key,
                            scenario_key,
                            timestamp: r.timestamp,
                            air_temp_c: r.air_temp_c,
                            setpoint_c: r.setpoint_c,
                            co2_ppm: r.co2_ppm,
                            rh_pct: r.rh_pct,
                            temp_deviation: temp_deviation(r.air_temp_c, r.setpoint_c),
                            row_ref,
                        })
                    }
                    _ => unresolved.record(&row_ref, missing),
                }
            }
            defects.extend(unresolved.into_finding());

            let mut unresolved = Unresolved::new(FactHvac::TABLE, run_id);
            for (row, r) in run.hvac.iter().enumerate() {
                let row_ref = RowRef::new(run_id, HVAC_FILE, row);
                let mut missing = Vec::new();
                let time_key = resolve(
                    dims.time_key(&r.timestamp),
                    || format!("timestamp {}", r.timestamp),
                    &mut missing,
                );
                let ahu_key = resolve(
                    dims.ahu_key(&r.building_id, &r.ahu_id),
                    || format!("ahu {}/{}", r.building_id, r.ahu_id),
                    &mut missing,
                );
                let scenario_key =
                    resolve(scenario, || format!("scenario {}", meta.scenario_id), &mut missing);
                match (time_key, ahu_key, scenario_key) {
                    (Some(time_key), Some(ahu_key), Some(scenario_key)) => {
                        schema.fact_hvac.push(FactHvac {
                            time_key,
                            ahu_key,
                            scenario_key,
                            timestamp: r.timestamp,
                            supply_temp_c: r.supply_temp_c,
                            return_temp_c: r.return_temp_c,
                            power_kw: r.power_kw,
                            cooling_kw: r.cooling_kw,
                            heating_kw: r.heating_kw,
                            cop_proxy: cop_proxy(
                                r.heating_kw,
                                r.cooling_kw,
                                r.power_kw,
                                self.cop_power_epsilon_kw,
                            ),
                            row_ref,
                        })
                    }
                    _ => unresolved.record(&row_ref, missing),
                }
            }
            defects.extend(unresolved.into_finding());

            let mut unresolved = Unresolved::new(FactMeter::TABLE, run_id);
            for (row, r) in run.meters.iter().enumerate() {
                let row_ref = RowRef::new(run_id, METERS_FILE, row);
                let mut missing = Vec::new();
                let time_key = resolve(
                    dims.time_key(&r.timestamp),
                    || format!("timestamp {}", r.timestamp),
                    &mut missing,
                );
                let building_key = resolve(
                    dims.building_key(&r.building_id),
                    || format!("building {}", r.building_id),
                    &mut missing,
                );
                let scenario_key =
                    resolve(scenario, || format!("scenario {}", meta.scenario_id), &mut missing);
                match (time_key, building_key, scenario_key) {
                    (Some(time_key), Some(building_key), Some(scenario_key)) => {
                        schema.fact_meters.push(FactMeter {
                            time_key,
                            building_key,
                            scenario_key,
                            timestamp: r.timestamp,
                            electric_kwh: r.electric_kwh,
                            heating_kwh: r.heating_kwh,
                            cooling_kwh: r.cooling_kwh,
                            row_ref,
                        })
                    }
                    _ => unresolved.record(&row_ref, missing),
                }
            }
            defects.extend(unresolved.into_finding());

            // Weather belongs to the run's building
            let mut unresolved = Unresolved::new(FactWeather::TABLE, run_id);
            for (row, r) in run.weather.iter().enumerate() {
                let row_ref = RowRef::new(run_id, WEATHER_FILE, row);
                let mut missing = Vec::new();
                let time_key = resolve(
                    dims.time_key(&r.timestamp),
                    || format!("timestamp {}", r.timestamp),
                    &mut missing,
                );
                let building_key = resolve(
                    run_building,
                    || format!("building {}", meta.building_id),
                    &mut missing,
                );
                let scenario_key =
                    resolve(scenario, || format!("scenario {}", meta.scenario_id), &mut missing);
                match (time_key, building_key, scenario_key) {
                    (Some(time_key), Some(building_key), Some(scenario_key)) => {
                        schema.fact_weather.push(FactWeather {
                            time_key,
                            building_key,
                            scenario_key,
                            timestamp: r.timestamp,
                            drybulb_c: r.drybulb_c,
                            relhum_pct: r.relhum_pct,
                            ghi_w_m2: r.ghi_w_m2,
                            row_ref,
                        })
                    }
                    _ => unresolved.record(&row_ref, missing),
                }
            }
            defects.extend(unresolved.into_finding());
        }

        defects.extend(check_grain(&schema.fact_zone_conditions));
        defects.extend(check_grain(&schema.fact_hvac));
        defects.extend(check_grain(&schema.fact_meters));
        defects.extend(check_grain(&schema.fact_weather));

        schema.dimensions = dims;
        info!(
            "Built fact tables: {} zone, {} hvac, {} meter, {} weather rows",
            schema.fact_zone_conditions.len(),
            schema.fact_hvac.len(),
            schema.fact_meters.len(),
            schema.fact_weather.len()
        );
        if !defects.is_empty() {
            warn!("Schema build produced {} defects", defects.len());
        }

        BuildOutput { schema, defects }
    }
}

/// One error per row colliding with an earlier row on the same grain tuple.
/// Both rows stay in the table.
pub fn check_grain<F: FactRow>(rows: &[F]) -> Vec<Finding> {
    let mut first_seen: HashMap<GrainKey, &RowRef> = HashMap::new();
    let mut findings = Vec::new();
    for row in rows {
        let grain = row.grain();
        match first_seen.get(&grain) {
            Some(first) => findings.push(Finding::error(
                RuleFamily::Schema,
                format!("grain.{}", F::TABLE),
                format!(
                    "duplicate {} row for (timestamp {}, {} {}, scenario_key {})",
                    F::TABLE,
                    row.timestamp(),
                    F::ENTITY_COLUMN,
                    grain.entity_key,
                    grain.scenario_key
                ),
                vec![first.to_string(), row.row_ref().to_string()],
            )),
            None => {
                first_seen.insert(grain, row.row_ref());
            }
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cop_proxy_guards_zero_power() {
        assert_eq!(cop_proxy(10.0, 5.0, 0.0, 1e-9), None);
        assert_eq!(cop_proxy(10.0, 5.0, 1e-12, 1e-9), None);
        assert_eq!(cop_proxy(10.0, 5.0, f64::NAN, 1e-9), None);
        assert_eq!(cop_proxy(10.0, 5.0, 5.0, 1e-9), Some(3.0));
        assert_eq!(cop_proxy(0.0, 0.0, 2.0, 1e-9), Some(0.0));
    }

    #[test]
    fn test_temp_deviation_is_unclamped() {
        assert_eq!(temp_deviation(45.0, 21.0), 24.0);
        assert_eq!(temp_deviation(18.5, 21.0), -2.5);
    }
}
