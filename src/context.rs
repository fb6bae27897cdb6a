//! Per-invocation dimension context.
//!
//! Built once by the normalizer and then only read: the schema builder
//! resolves natural keys through it, the validator reads the expected run grids.

use crate::star_schema::{DimAhu, DimBuilding, DimScenario, DimTime, DimZone, SurrogateKey};
use chrono::NaiveDateTime;
use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};

/// Natural key to surrogate key, assigned 1..=n in ascending natural-key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMap<K: Ord> {
    keys: BTreeMap<K, SurrogateKey>,
}

impl<K: Ord> Default for KeyMap<K> {
    fn default() -> Self {
        Self {
            keys: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone> KeyMap<K> {
    /// Duplicates collapse; input order is irrelevant.
    pub fn from_natural_keys(natural_keys: impl IntoIterator<Item = K>) -> Self {
        let distinct: BTreeSet<K> = natural_keys.into_iter().collect();
        let keys = distinct
            .into_iter()
            .zip(1..)
            .collect::<BTreeMap<K, SurrogateKey>>();
        Self { keys }
    }

    pub fn get<Q>(&self, natural_key: &Q) -> Option<SurrogateKey>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.keys.get(natural_key).copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Entries in surrogate-key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, SurrogateKey)> {
        self.keys.iter().map(|(k, v)| (k, *v))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DimensionContext {
    pub buildings: Vec<DimBuilding>,
    pub scenarios: Vec<DimScenario>,
    pub zones: Vec<DimZone>,
    pub ahus: Vec<DimAhu>,
    pub times: Vec<DimTime>,

    pub(crate) building_keys: KeyMap<String>,
    pub(crate) scenario_keys: KeyMap<String>,
    pub(crate) zone_keys: KeyMap<(String, String)>,
    pub(crate) ahu_keys: KeyMap<(String, String)>,
    pub(crate) time_keys: KeyMap<NaiveDateTime>,

    /// Expected hourly grid per (building_key, scenario_key) run
    pub(crate) run_grids: BTreeMap<(SurrogateKey, SurrogateKey), Vec<NaiveDateTime>>,
}

impl DimensionContext {
    pub fn building_key(&self, building_id: &str) -> Option<SurrogateKey> {
        self.building_keys.get(building_id)
    }

    pub fn scenario_key(&self, scenario_id: &str) -> Option<SurrogateKey> {
        self.scenario_keys.get(scenario_id)
    }

    pub fn zone_key(&self, building_id: &str, zone_id: &str) -> Option<SurrogateKey> {
        self.zone_keys
            .get(&(building_id.to_string(), zone_id.to_string()))
    }

    pub fn ahu_key(&self, building_id: &str, ahu_id: &str) -> Option<SurrogateKey> {
        self.ahu_keys.get(&(building_id.to_string(), ahu_id.to_string()))
    }

    pub fn time_key(&self, timestamp: &NaiveDateTime) -> Option<SurrogateKey> {
        self.time_keys.get(timestamp)
    }

    // Rows are stored in key order, so key k sits at index k - 1.

    pub fn building(&self, key: SurrogateKey) -> Option<&DimBuilding> {
        row_at(&self.buildings, key)
    }

    pub fn scenario(&self, key: SurrogateKey) -> Option<&DimScenario> {
        row_at(&self.scenarios, key)
    }

    pub fn zone(&self, key: SurrogateKey) -> Option<&DimZone> {
        row_at(&self.zones, key)
    }

    pub fn ahu(&self, key: SurrogateKey) -> Option<&DimAhu> {
        row_at(&self.ahus, key)
    }

    pub fn time(&self, key: SurrogateKey) -> Option<&DimTime> {
        row_at(&self.times, key)
    }

    /// Hourly grid declared by the run(s) of this building and scenario.
    pub fn expected_grid(
        &self,
        building_key: SurrogateKey,
        scenario_key: SurrogateKey,
    ) -> Option<&[NaiveDateTime]> {
        self.run_grids
            .get(&(building_key, scenario_key))
            .map(|grid| grid.as_slice())
    }

    pub fn run_grids(
        &self,
    ) -> impl Iterator<Item = (&(SurrogateKey, SurrogateKey), &Vec<NaiveDateTime>)> {
        self.run_grids.iter()
    }

    pub fn building_keys(&self) -> &KeyMap<String> {
        &self.building_keys
    }

    pub fn scenario_keys(&self) -> &KeyMap<String> {
        &self.scenario_keys
    }

    pub fn zone_keys(&self) -> &KeyMap<(String, String)> {
        &self.zone_keys
    }

    pub fn ahu_keys(&self) -> &KeyMap<(String, String)> {
        &self.ahu_keys
    }

    pub fn time_keys(&self) -> &KeyMap<NaiveDateTime> {
        &self.time_keys
    }

    pub fn dimension_row_count(&self) -> usize {
        self.buildings.len()
            + self.scenarios.len()
            + self.zones.len()
            + self.ahus.len()
            + self.times.len()
    }
}

fn row_at<T>(rows: &[T], key: SurrogateKey) -> Option<&T> {
    (key as usize).checked_sub(1).and_then(|i| rows.get(i))
}
