//! Star schema produced by one pipeline invocation.

pub mod dimensions;
pub mod facts;
pub mod frames;
pub mod summary;
pub mod table_schema;

use crate::context::DimensionContext;
use crate::error::Result;
use std::collections::BTreeMap;

pub use dimensions::{DimAhu, DimBuilding, DimScenario, DimTime, DimZone};
pub use facts::{FactHvac, FactMeter, FactRow, FactWeather, FactZoneCondition, GrainKey};
pub use frames::TableFrames;
pub use summary::{energy_summary, EnergySummary};
pub use table_schema::{ColumnRole, ColumnSpec, ColumnType, TableSchema, ALL_TABLES};

/// Dense integer id assigned to a dimension natural key.
pub type SurrogateKey = u32;

/// Dimension and fact tables. Immutable once the builder hands it over.
#[derive(Debug, Clone, Default)]
pub struct StarSchema {
    pub dimensions: DimensionContext,
    pub fact_zone_conditions: Vec<FactZoneCondition>,
    pub fact_hvac: Vec<FactHvac>,
    pub fact_meters: Vec<FactMeter>,
    pub fact_weather: Vec<FactWeather>,
}

impl StarSchema {
    /// Row count per output table, keyed by table name.
    pub fn table_row_counts(&self) -> BTreeMap<&'static str, usize> {
        let dims = &self.dimensions;
        BTreeMap::from([
            ("dim_building", dims.buildings.len()),
            ("dim_scenario", dims.scenarios.len()),
            ("dim_zone", dims.zones.len()),
            ("dim_ahu", dims.ahus.len()),
            ("dim_time", dims.times.len()),
            (FactZoneCondition::TABLE, self.fact_zone_conditions.len()),
            (FactHvac::TABLE, self.fact_hvac.len()),
            (FactMeter::TABLE, self.fact_meters.len()),
            (FactWeather::TABLE, self.fact_weather.len()),
        ])
    }

    pub fn fact_row_count(&self) -> usize {
        self.fact_zone_conditions.len()
            + self.fact_hvac.len()
            + self.fact_meters.len()
            + self.fact_weather.len()
    }

    /// Materialize every table as a polars frame named after the table.
    pub fn to_frames(&self) -> Result<TableFrames> {
        frames::build_frames(self)
    }
}
