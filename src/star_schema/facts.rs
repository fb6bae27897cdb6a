//! Fact rows and their grain contract.

use super::SurrogateKey;
use crate::context::DimensionContext;
use crate::records::RowRef;
use chrono::NaiveDateTime;

/// (time, entity, scenario) tuple that must be unique per fact table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GrainKey {
    pub time_key: SurrogateKey,
    pub entity_key: SurrogateKey,
    pub scenario_key: SurrogateKey,
}

/// Common view over the four fact tables used by grain and coverage checks.
pub trait FactRow {
    const TABLE: &'static str;
    const ENTITY_COLUMN: &'static str;

    fn grain(&self) -> GrainKey;
    fn timestamp(&self) -> NaiveDateTime;
    fn row_ref(&self) -> &RowRef;

    /// Building owning the row's entity; its run grid is the expected coverage.
    fn building_key(&self, dims: &DimensionContext) -> Option<SurrogateKey>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactZoneCondition {
    pub time_key: SurrogateKey,
    pub zone_key: SurrogateKey,
    pub scenario_key: SurrogateKey,
    pub timestamp: NaiveDateTime,
    pub air_temp_c: f64,
    pub setpoint_c: f64,
    pub co2_ppm: f64,
    pub rh_pct: f64,
    pub temp_deviation: f64,
    pub row_ref: RowRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactHvac {
    pub time_key: SurrogateKey,
    pub ahu_key: SurrogateKey,
    pub scenario_key: SurrogateKey,
    pub timestamp: NaiveDateTime,
    pub supply_temp_c: f64,
    pub return_temp_c: f64,
    pub power_kw: f64,
    pub cooling_kw: f64,
    pub heating_kw: f64,
    pub cop_proxy: Option<f64>,
    pub row_ref: RowRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactMeter {
    pub time_key: SurrogateKey,
    pub building_key: SurrogateKey,
    pub scenario_key: SurrogateKey,
    pub timestamp: NaiveDateTime,
    pub electric_kwh: f64,
    pub heating_kwh: f64,
    pub cooling_kwh: f64,
    pub row_ref: RowRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactWeather {
    pub time_key: SurrogateKey,
    pub building_key: SurrogateKey,
    pub scenario_key: SurrogateKey,
    pub timestamp: NaiveDateTime,
    pub drybulb_c: f64,
    pub relhum_pct: f64,
    pub ghi_w_m2: f64,
    pub row_ref: RowRef,
}

impl FactRow for FactZoneCondition {
    const TABLE: &'static str = "fact_zone_conditions";
    const ENTITY_COLUMN: &'static str = "zone_key";

    fn grain(&self) -> GrainKey {
        GrainKey {
            time_key: self.time_key,
            entity_key: self.zone_key,
            scenario_key: self.scenario_key,
        }
    }

    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    fn row_ref(&self) -> &RowRef {
        &self.row_ref
    }

    fn building_key(&self, dims: &DimensionContext) -> Option<SurrogateKey> {
        dims.zone(self.zone_key).map(|z| z.building_key)
    }
}

impl FactRow for FactHvac {
    const TABLE: &'static str = "fact_hvac";
    const ENTITY_COLUMN: &'static str = "ahu_key";

    fn grain(&self) -> GrainKey {
        GrainKey {
            time_key: self.time_key,
            entity_key: self.ahu_key,
            scenario_key: self.scenario_key,
        }
    }

    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    fn row_ref(&self) -> &RowRef {
        &self.row_ref
    }

    fn building_key(&self, dims: &DimensionContext) -> Option<SurrogateKey> {
        dims.ahu(self.ahu_key).map(|a| a.building_key)
    }
}

impl FactRow for FactMeter {
    const TABLE: &'static str = "fact_meters";
    const ENTITY_COLUMN: &'static str = "building_key";

    fn grain(&self) -> GrainKey {
        GrainKey {
            time_key: self.time_key,
            entity_key: self.building_key,
            scenario_key: self.scenario_key,
        }
    }

    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    fn row_ref(&self) -> &RowRef {
        &self.row_ref
    }

    fn building_key(&self, _dims: &DimensionContext) -> Option<SurrogateKey> {
        Some(self.building_key)
    }
}

impl FactRow for FactWeather {
    const TABLE: &'static str = "fact_weather";
    const ENTITY_COLUMN: &'static str = "building_key";

    fn grain(&self) -> GrainKey {
        GrainKey {
            time_key: self.time_key,
            entity_key: self.building_key,
            scenario_key: self.scenario_key,
        }
    }

    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    fn row_ref(&self) -> &RowRef {
        &self.row_ref
    }

    fn building_key(&self, _dims: &DimensionContext) -> Option<SurrogateKey> {
        Some(self.building_key)
    }
}
