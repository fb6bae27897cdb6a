//! Explicit column lists for every output table.
//!
//! The typed rows in `dimensions` and `facts` are the source of truth; these
//! descriptors are what the columnar frames are checked against.

use polars::prelude::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int64,
    Float64,
    Utf8,
    Boolean,
    Timestamp,
}

impl ColumnType {
    pub fn matches(&self, dtype: &DataType) -> bool {
        match self {
            ColumnType::Int64 => matches!(dtype, DataType::Int64),
            ColumnType::Float64 => matches!(dtype, DataType::Float64),
            ColumnType::Utf8 => matches!(dtype, DataType::String),
            ColumnType::Boolean => matches!(dtype, DataType::Boolean),
            ColumnType::Timestamp => matches!(dtype, DataType::Datetime(_, _)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// Surrogate or foreign key
    Key,
    Timestamp,
    /// Descriptive dimension attribute or natural key
    Attribute,
    /// Raw measured value
    Measure,
    /// Computed during transform, may be null
    Derived,
    /// Source row identifier
    Lineage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub dtype: ColumnType,
    pub role: ColumnRole,
}

impl ColumnSpec {
    const fn new(name: &'static str, dtype: ColumnType, role: ColumnRole) -> Self {
        Self { name, dtype, role }
    }

    /// Critical columns must never be null.
    pub fn is_critical(&self) -> bool {
        matches!(
            self.role,
            ColumnRole::Key | ColumnRole::Timestamp | ColumnRole::Measure
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub name: &'static str,
    /// Uniqueness contract; empty for dimensions keyed only by their surrogate
    pub grain: &'static [&'static str],
    pub columns: &'static [ColumnSpec],
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    pub fn is_fact(&self) -> bool {
        self.name.starts_with("fact_")
    }
}

use ColumnRole::*;
use ColumnType::*;

pub const DIM_BUILDING: TableSchema = TableSchema {
    name: "dim_building",
    grain: &["building_key"],
    columns: &[
        ColumnSpec::new("building_key", Int64, Key),
        ColumnSpec::new("building_id", Utf8, Attribute),
        ColumnSpec::new("building_name", Utf8, Attribute),
        ColumnSpec::new("location", Utf8, Attribute),
        ColumnSpec::new("floor_area_m2", Float64, Attribute),
    ],
};

pub const DIM_SCENARIO: TableSchema = TableSchema {
    name: "dim_scenario",
    grain: &["scenario_key"],
    columns: &[
        ColumnSpec::new("scenario_key", Int64, Key),
        ColumnSpec::new("scenario_id", Utf8, Attribute),
        ColumnSpec::new("description", Utf8, Attribute),
    ],
};

pub const DIM_ZONE: TableSchema = TableSchema {
    name: "dim_zone",
    grain: &["zone_key"],
    columns: &[
        ColumnSpec::new("zone_key", Int64, Key),
        ColumnSpec::new("building_key", Int64, Key),
        ColumnSpec::new("building_id", Utf8, Attribute),
        ColumnSpec::new("zone_id", Utf8, Attribute),
        ColumnSpec::new("zone_name", Utf8, Attribute),
    ],
};

pub const DIM_AHU: TableSchema = TableSchema {
    name: "dim_ahu",
    grain: &["ahu_key"],
    columns: &[
        ColumnSpec::new("ahu_key", Int64, Key),
        ColumnSpec::new("building_key", Int64, Key),
        ColumnSpec::new("building_id", Utf8, Attribute),
        ColumnSpec::new("ahu_id", Utf8, Attribute),
    ],
};

pub const DIM_TIME: TableSchema = TableSchema {
    name: "dim_time",
    grain: &["time_key"],
    columns: &[
        ColumnSpec::new("time_key", Int64, Key),
        ColumnSpec::new("timestamp", ColumnType::Timestamp, ColumnRole::Timestamp),
        ColumnSpec::new("year", Int64, Attribute),
        ColumnSpec::new("month", Int64, Attribute),
        ColumnSpec::new("day", Int64, Attribute),
        ColumnSpec::new("hour", Int64, Attribute),
        ColumnSpec::new("dow", Int64, Attribute),
        ColumnSpec::new("is_weekend", Boolean, Attribute),
    ],
};

pub const FACT_ZONE_CONDITIONS: TableSchema = TableSchema {
    name: "fact_zone_conditions",
    grain: &["time_key", "zone_key", "scenario_key"],
    columns: &[
        ColumnSpec::new("time_key", Int64, Key),
        ColumnSpec::new("zone_key", Int64, Key),
        ColumnSpec::new("scenario_key", Int64, Key),
        ColumnSpec::new("timestamp", ColumnType::Timestamp, ColumnRole::Timestamp),
        ColumnSpec::new("air_temp_c", Float64, Measure),
        ColumnSpec::new("setpoint_c", Float64, Measure),
        ColumnSpec::new("co2_ppm", Float64, Measure),
        ColumnSpec::new("rh_pct", Float64, Measure),
        ColumnSpec::new("temp_deviation", Float64, Derived),
        ColumnSpec::new("row_ref", Utf8, Lineage),
    ],
};

pub const FACT_HVAC: TableSchema = TableSchema {
    name: "fact_hvac",
    grain: &["time_key", "ahu_key", "scenario_key"],
    columns: &[
        ColumnSpec::new("time_key", Int64, Key),
        ColumnSpec::new("ahu_key", Int64, Key),
        ColumnSpec::new("scenario_key", Int64, Key),
        ColumnSpec::new("timestamp", ColumnType::Timestamp, ColumnRole::Timestamp),
        ColumnSpec::new("supply_temp_c", Float64, Measure),
        ColumnSpec::new("return_temp_c", Float64, Measure),
        ColumnSpec::new("power_kw", Float64, Measure),
        ColumnSpec::new("cooling_kw", Float64, Measure),
        ColumnSpec::new("heating_kw", Float64, Measure),
        ColumnSpec::new("cop_proxy", Float64, Derived),
        ColumnSpec::new("row_ref", Utf8, Lineage),
    ],
};

pub const FACT_METERS: TableSchema = TableSchema {
    name: "fact_meters",
    grain: &["time_key", "building_key", "scenario_key"],
    columns: &[
        ColumnSpec::new("time_key", Int64, Key),
        ColumnSpec::new("building_key", Int64, Key),
        ColumnSpec::new("scenario_key", Int64, Key),
        ColumnSpec::new("timestamp", ColumnType::Timestamp, ColumnRole::Timestamp),
        ColumnSpec::new("electric_kwh", Float64, Measure),
        ColumnSpec::new("heating_kwh", Float64, Measure),
        ColumnSpec::new("cooling_kwh", Float64, Measure),
        ColumnSpec::new("row_ref", Utf8, Lineage),
    ],
};

pub const FACT_WEATHER: TableSchema = TableSchema {
    name: "fact_weather",
    grain: &["time_key", "building_key", "scenario_key"],
    columns: &[
        ColumnSpec::new("time_key", Int64, Key),
        ColumnSpec::new("building_key", Int64, Key),
        ColumnSpec::new("scenario_key", Int64, Key),
        ColumnSpec::new("timestamp", ColumnType::Timestamp, ColumnRole::Timestamp),
        ColumnSpec::new("drybulb_c", Float64, Measure),
        ColumnSpec::new("relhum_pct", Float64, Measure),
        ColumnSpec::new("ghi_w_m2", Float64, Measure),
        ColumnSpec::new("row_ref", Utf8, Lineage),
    ],
};

/// All output tables, dimensions first.
pub const ALL_TABLES: [&TableSchema; 9] = [
    &DIM_BUILDING,
    &DIM_SCENARIO,
    &DIM_ZONE,
    &DIM_AHU,
    &DIM_TIME,
    &FACT_ZONE_CONDITIONS,
    &FACT_HVAC,
    &FACT_METERS,
    &FACT_WEATHER,
];

pub fn table_schema(name: &str) -> Option<&'static TableSchema> {
    ALL_TABLES.iter().copied().find(|t| t.name == name)
}
