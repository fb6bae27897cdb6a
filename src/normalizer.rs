//! Dimension normalization across all runs of one invocation.

use crate::context::{DimensionContext, KeyMap};
use crate::error::{EtlError, Result};
use crate::records::{RowRef, SimulationRun, METADATA_FILE, ZONES_FILE};
use crate::star_schema::{DimAhu, DimBuilding, DimScenario, DimTime, DimZone, SurrogateKey};
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Same natural key seen with two different attribute values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeConflict {
    pub dimension: &'static str,
    pub natural_key: String,
    pub attribute: &'static str,
    pub first_value: String,
    pub first_ref: String,
    pub conflicting_value: String,
    pub conflicting_ref: String,
}

impl AttributeConflict {
    pub fn message(&self) -> String {
        format!(
            "{} '{}' has conflicting {}: '{}' ({}) vs '{}' ({})",
            self.dimension,
            self.natural_key,
            self.attribute,
            self.first_value,
            self.first_ref,
            self.conflicting_value,
            self.conflicting_ref
        )
    }

    pub fn row_refs(&self) -> Vec<String> {
        vec![self.first_ref.clone(), self.conflicting_ref.clone()]
    }
}

/// First value seen per (dimension, natural key, attribute).
#[derive(Default)]
struct AttributeLedger {
    seen: BTreeMap<(&'static str, String, &'static str), (String, String)>,
    reported: BTreeSet<(&'static str, String, &'static str, String)>,
    conflicts: Vec<AttributeConflict>,
}

impl AttributeLedger {
    fn observe(
        &mut self,
        dimension: &'static str,
        natural_key: &str,
        attribute: &'static str,
        value: String,
        source: String,
    ) {
        let slot = (dimension, natural_key.to_string(), attribute);
        match self.seen.get(&slot) {
            None => {
                self.seen.insert(slot, (value, source));
            }
            Some((first_value, first_ref)) if *first_value != value => {
                // One conflict per distinct deviating value
                let marker = (dimension, natural_key.to_string(), attribute, value.clone());
                if self.reported.insert(marker) {
                    self.conflicts.push(AttributeConflict {
                        dimension,
                        natural_key: natural_key.to_string(),
                        attribute,
                        first_value: first_value.clone(),
                        first_ref: first_ref.clone(),
                        conflicting_value: value,
                        conflicting_ref: source,
                    });
                }
            }
            Some(_) => {}
        }
    }
}

/// Assigns surrogate keys and builds dimension rows.
#[derive(Debug, Default, Clone)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Attribute conflicts across the batch, checked in run-id order.
    pub fn find_conflicts(&self, runs: &[SimulationRun]) -> Vec<AttributeConflict> {
        let mut ledger = AttributeLedger::default();
        for run in sorted_by_run_id(runs) {
            let meta = &run.metadata;
            let source = format!("{}/{}", run.run_id, METADATA_FILE);
            let building = meta.building_id.as_str();
            ledger.observe(
                "dim_building",
                building,
                "building_name",
                meta.building_name.clone(),
                source.clone(),
            );
            ledger.observe(
                "dim_building",
                building,
                "location",
                meta.location.clone(),
                source.clone(),
            );
            ledger.observe(
                "dim_building",
                building,
                "floor_area_m2",
                meta.floor_area_m2.to_string(),
                source.clone(),
            );
            // A run without a description does not contradict one that has it
            if let Some(description) = &meta.description {
                ledger.observe(
                    "dim_scenario",
                    &meta.scenario_id,
                    "description",
                    description.clone(),
                    source.clone(),
                );
            }
            for (row, zone) in run.zones.iter().enumerate() {
                ledger.observe(
                    "dim_zone",
                    &format!("{}/{}", meta.building_id, zone.zone_id),
                    "zone_name",
                    zone.zone_name.clone(),
                    RowRef::new(&run.run_id, ZONES_FILE, row).to_string(),
                );
            }
        }
        ledger.conflicts
    }

    /// Build the dimension context for the whole batch.
    ///
    /// Keys depend only on the set of natural keys, never on run order.
    /// Zones and AHUs are registered under the building of the run's metadata.
    pub fn normalize(&self, runs: &[SimulationRun]) -> Result<DimensionContext> {
        let conflicts = self.find_conflicts(runs);
        if !conflicts.is_empty() {
            let messages: Vec<String> = conflicts.iter().map(|c| c.message()).collect();
            return Err(EtlError::ReferentialIntegrity(messages.join("; ")));
        }
        let runs = sorted_by_run_id(runs);

        let building_keys =
            KeyMap::from_natural_keys(runs.iter().map(|r| r.metadata.building_id.clone()));
        let scenario_keys =
            KeyMap::from_natural_keys(runs.iter().map(|r| r.metadata.scenario_id.clone()));
        let zone_keys = KeyMap::from_natural_keys(runs.iter().flat_map(|r| {
            r.zones
                .iter()
                .map(|z| (r.metadata.building_id.clone(), z.zone_id.clone()))
        }));
        let ahu_keys = KeyMap::from_natural_keys(runs.iter().flat_map(|r| {
            r.hvac
                .iter()
                .map(|h| (r.metadata.building_id.clone(), h.ahu_id.clone()))
        }));

        let mut grids: BTreeMap<(SurrogateKey, SurrogateKey), BTreeSet<NaiveDateTime>> =
            BTreeMap::new();
        for run in &runs {
            let (Some(b), Some(s)) = (
                building_keys.get(run.metadata.building_id.as_str()),
                scenario_keys.get(run.metadata.scenario_id.as_str()),
            ) else {
                continue;
            };
            grids
                .entry((b, s))
                .or_default()
                .extend(run.metadata.hourly_grid()?);
        }
        let time_keys = KeyMap::from_natural_keys(grids.values().flatten().copied());

        // First occurrence wins; conflicts were ruled out above.
        let mut building_attrs = BTreeMap::new();
        let mut scenario_descriptions: BTreeMap<String, String> = BTreeMap::new();
        let mut zone_names = BTreeMap::new();
        for run in &runs {
            let meta = &run.metadata;
            building_attrs
                .entry(meta.building_id.clone())
                .or_insert_with(|| {
                    (
                        meta.building_name.clone(),
                        meta.location.clone(),
                        meta.floor_area_m2,
                    )
                });
            let known = scenario_descriptions.contains_key(&meta.scenario_id);
            match (&meta.description, known) {
                (Some(d), _) => {
                    scenario_descriptions.insert(meta.scenario_id.clone(), d.clone());
                }
                (None, false) => {
                    scenario_descriptions
                        .insert(meta.scenario_id.clone(), meta.scenario_description());
                }
                (None, true) => {}
            }
            for zone in &run.zones {
                zone_names
                    .entry((meta.building_id.clone(), zone.zone_id.clone()))
                    .or_insert_with(|| zone.zone_name.clone());
            }
        }

        let buildings: Vec<DimBuilding> = building_keys
            .iter()
            .filter_map(|(id, key)| {
                building_attrs
                    .get(id)
                    .map(|(name, location, area)| DimBuilding {
                        building_key: key,
                        building_id: id.clone(),
                        building_name: name.clone(),
                        location: location.clone(),
                        floor_area_m2: *area,
                    })
            })
            .collect();

        let scenarios: Vec<DimScenario> = scenario_keys
            .iter()
            .map(|(id, key)| DimScenario {
                scenario_key: key,
                scenario_id: id.clone(),
                description: scenario_descriptions.get(id).cloned().unwrap_or_default(),
            })
            .collect();

        let zones: Vec<DimZone> = zone_keys
            .iter()
            .filter_map(|((building_id, zone_id), key)| {
                let building_key = building_keys.get(building_id.as_str())?;
                Some(DimZone {
                    zone_key: key,
                    building_key,
                    building_id: building_id.clone(),
                    zone_id: zone_id.clone(),
                    zone_name: zone_names
                        .get(&(building_id.clone(), zone_id.clone()))
                        .cloned()
                        .unwrap_or_default(),
                })
            })
            .collect();

        let ahus: Vec<DimAhu> = ahu_keys
            .iter()
            .filter_map(|((building_id, ahu_id), key)| {
                let building_key = building_keys.get(building_id.as_str())?;
                Some(DimAhu {
                    ahu_key: key,
                    building_key,
                    building_id: building_id.clone(),
                    ahu_id: ahu_id.clone(),
                })
            })
            .collect();

        let times: Vec<DimTime> = time_keys
            .iter()
            .map(|(ts, key)| DimTime::from_timestamp(key, *ts))
            .collect();

        let run_grids = grids
            .into_iter()
            .map(|(k, grid)| (k, grid.into_iter().collect()))
            .collect();

        info!(
            "Normalized {} runs: {} buildings, {} scenarios, {} zones, {} AHUs, {} hours",
            runs.len(),
            buildings.len(),
            scenarios.len(),
            zones.len(),
            ahus.len(),
            times.len()
        );
        debug!("Run grids: {:?}", run_grids_summary(&run_grids));

        Ok(DimensionContext {
            buildings,
            scenarios,
            zones,
            ahus,
            times,
            building_keys,
            scenario_keys,
            zone_keys,
            ahu_keys,
            time_keys,
            run_grids,
        })
    }
}

fn sorted_by_run_id(runs: &[SimulationRun]) -> Vec<&SimulationRun> {
    let mut sorted: Vec<&SimulationRun> = runs.iter().collect();
    sorted.sort_by(|a, b| a.run_id.cmp(&b.run_id));
    sorted
}

fn run_grids_summary(
    grids: &BTreeMap<(SurrogateKey, SurrogateKey), Vec<NaiveDateTime>>,
) -> Vec<((SurrogateKey, SurrogateKey), usize)> {
    grids.iter().map(|(k, g)| (*k, g.len())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{RunMetadata, ZoneReading};
    use chrono::NaiveDate;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    fn run(building: &str, scenario: &str, hours: u32) -> SimulationRun {
        SimulationRun {
            run_id: format!("run_{}_{}", building, scenario),
            metadata: RunMetadata {
                building_id: building.to_string(),
                scenario_id: scenario.to_string(),
                building_name: format!("Building {}", building),
                location: "Tallinn, Estonia".to_string(),
                floor_area_m2: 4000.0,
                description: None,
                start_timestamp: start(),
                duration_hours: hours,
            },
            zones: vec![ZoneReading {
                timestamp: start(),
                building_id: building.to_string(),
                zone_id: "Z1".to_string(),
                zone_name: "Office".to_string(),
                air_temp_c: 21.0,
                setpoint_c: 21.0,
                co2_ppm: 500.0,
                rh_pct: 40.0,
            }],
            hvac: Vec::new(),
            meters: Vec::new(),
            weather: Vec::new(),
        }
    }

    #[test]
    fn test_keys_are_sorted_and_shared() {
        let runs = vec![run("B2", "RETRO", 2), run("B1", "BASE", 2), run("B1", "RETRO", 2)];
        let ctx = Normalizer::new().normalize(&runs).unwrap();
        assert_eq!(ctx.building_key("B1"), Some(1));
        assert_eq!(ctx.building_key("B2"), Some(2));
        assert_eq!(ctx.scenario_key("BASE"), Some(1));
        assert_eq!(ctx.scenario_key("RETRO"), Some(2));
        assert_eq!(ctx.zone_key("B2", "Z1"), Some(2));
        assert_eq!(ctx.zone(2).map(|z| z.building_key), Some(2));
        assert_eq!(ctx.times.len(), 2);
        assert_eq!(ctx.expected_grid(1, 2).map(|g| g.len()), Some(2));
        assert_eq!(ctx.scenarios[0].description, "Scenario BASE");
    }

    #[test]
    fn test_floor_area_conflict_is_rejected() {
        let mut other = run("B1", "RETRO", 2);
        other.metadata.floor_area_m2 = 3500.0;
        let runs = vec![run("B1", "BASE", 2), other];

        let conflicts = Normalizer::new().find_conflicts(&runs);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].attribute, "floor_area_m2");
        assert_eq!(conflicts[0].first_ref, "run_B1_BASE/metadata.json");

        let err = Normalizer::new().normalize(&runs).unwrap_err();
        assert!(matches!(err, EtlError::ReferentialIntegrity(_)));
    }

    #[test]
    fn test_scenario_description_conflict_is_rejected() {
        let mut first = run("B1", "BASE", 1);
        first.metadata.description = Some("Baseline".to_string());
        let mut second = run("B2", "BASE", 1);
        second.metadata.description = Some("Reference case".to_string());
        let runs = vec![first, second];

        let conflicts = Normalizer::new().find_conflicts(&runs);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].dimension, "dim_scenario");
        assert_eq!(conflicts[0].attribute, "description");
        assert_eq!(conflicts[0].first_value, "Baseline");
        assert_eq!(conflicts[0].conflicting_value, "Reference case");
        assert!(matches!(
            Normalizer::new().normalize(&runs),
            Err(EtlError::ReferentialIntegrity(_))
        ));
    }

    #[test]
    fn test_zone_name_conflict_is_rejected() {
        let mut renamed = run("B1", "RETRO", 1);
        renamed.zones[0].zone_name = "Open office".to_string();
        let runs = vec![run("B1", "BASE", 1), renamed];

        let conflicts = Normalizer::new().find_conflicts(&runs);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].attribute, "zone_name");
        assert_eq!(conflicts[0].first_ref, "run_B1_BASE/zones.csv#0");
        assert_eq!(conflicts[0].conflicting_ref, "run_B1_RETRO/zones.csv#0");
        assert!(Normalizer::new().normalize(&runs).is_err());
    }

    #[test]
    fn test_missing_description_is_not_a_conflict() {
        let mut described = run("B2", "BASE", 1);
        described.metadata.description = Some("Baseline".to_string());
        let runs = vec![run("B1", "BASE", 1), described];
        let ctx = Normalizer::new().normalize(&runs).unwrap();
        assert_eq!(ctx.scenarios[0].description, "Baseline");
    }

    #[test]
    fn test_zero_duration_contributes_no_hours() {
        let ctx = Normalizer::new().normalize(&[run("B1", "BASE", 0)]).unwrap();
        assert!(ctx.times.is_empty());
        assert_eq!(ctx.buildings.len(), 1);
    }
}
