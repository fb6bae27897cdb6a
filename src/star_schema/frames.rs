//! Columnar view of the star schema.
//!
//! Non-finite floats become nulls here, so the completeness check sees them
//! as missing values.

use super::table_schema::{self, TableSchema};
use super::{StarSchema, SurrogateKey};
use crate::error::{EtlError, Result};
use chrono::NaiveDateTime;
use polars::prelude::*;
use std::collections::BTreeMap;

/// Frames keyed by table name.
#[derive(Debug, Clone, Default)]
pub struct TableFrames {
    frames: BTreeMap<String, DataFrame>,
}

impl TableFrames {
    pub fn insert(&mut self, name: &str, frame: DataFrame) {
        self.frames.insert(name.to_string(), frame);
    }

    pub fn get(&self, name: &str) -> Option<&DataFrame> {
        self.frames.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<DataFrame> {
        self.frames.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DataFrame)> {
        self.frames.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut DataFrame)> {
        self.frames.iter_mut()
    }

    pub fn names(&self) -> Vec<&str> {
        self.frames.keys().map(|k| k.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Accumulates typed columns in declaration order.
struct FrameBuilder {
    columns: Vec<Series>,
}

impl FrameBuilder {
    fn new() -> Self {
        Self { columns: Vec::new() }
    }

    fn keys(mut self, name: &str, values: impl Iterator<Item = SurrogateKey>) -> Self {
        let values: Vec<i64> = values.map(i64::from).collect();
        self.columns.push(Series::new(name, values));
        self
    }

    fn ints(mut self, name: &str, values: impl Iterator<Item = i64>) -> Self {
        let values: Vec<i64> = values.collect();
        self.columns.push(Series::new(name, values));
        self
    }

    fn floats(self, name: &str, values: impl Iterator<Item = f64>) -> Self {
        self.optional_floats(name, values.map(Some))
    }

    fn optional_floats(mut self, name: &str, values: impl Iterator<Item = Option<f64>>) -> Self {
        let values: Vec<Option<f64>> = values.map(|v| v.filter(|x| x.is_finite())).collect();
        self.columns.push(Series::new(name, values));
        self
    }

    fn strings(mut self, name: &str, values: impl Iterator<Item = String>) -> Self {
        let values: Vec<String> = values.collect();
        self.columns.push(Series::new(name, values));
        self
    }

    fn bools(mut self, name: &str, values: impl Iterator<Item = bool>) -> Self {
        let values: Vec<bool> = values.collect();
        self.columns.push(Series::new(name, values));
        self
    }

    fn timestamps(
        mut self,
        name: &str,
        values: impl Iterator<Item = NaiveDateTime>,
    ) -> Result<Self> {
        let millis: Vec<i64> = values.map(|ts| ts.and_utc().timestamp_millis()).collect();
        let series = Series::new(name, millis)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
        self.columns.push(series);
        Ok(self)
    }

    fn finish(self, schema: &TableSchema) -> Result<DataFrame> {
        let df = DataFrame::new(self.columns)?;
        conform(schema, &df)?;
        Ok(df)
    }
}

/// Check a frame carries exactly the declared columns with the declared types.
pub fn conform(schema: &TableSchema, df: &DataFrame) -> Result<()> {
    let names: Vec<&str> = df.get_column_names();
    if names != schema.column_names() {
        return Err(EtlError::Schema(format!(
            "{} columns {:?} do not match declared {:?}",
            schema.name,
            names,
            schema.column_names()
        )));
    }
    for column in schema.columns {
        let series = df.column(column.name)?;
        if !column.dtype.matches(series.dtype()) {
            return Err(EtlError::Schema(format!(
                "{}.{} has type {}, expected {:?}",
                schema.name,
                column.name,
                series.dtype(),
                column.dtype
            )));
        }
    }
    Ok(())
}

pub(crate) fn build_frames(schema: &StarSchema) -> Result<TableFrames> {
    let dims = &schema.dimensions;
    let mut frames = TableFrames::default();

    let buildings = &dims.buildings;
    let df = FrameBuilder::new()
        .keys("building_key", buildings.iter().map(|b| b.building_key))
        .strings("building_id", buildings.iter().map(|b| b.building_id.clone()))
        .strings("building_name", buildings.iter().map(|b| b.building_name.clone()))
        .strings("location", buildings.iter().map(|b| b.location.clone()))
        .floats("floor_area_m2", buildings.iter().map(|b| b.floor_area_m2))
        .finish(&table_schema::DIM_BUILDING)?;
    frames.insert(table_schema::DIM_BUILDING.name, df);

    let scenarios = &dims.scenarios;
    let df = FrameBuilder::new()
        .keys("scenario_key", scenarios.iter().map(|s| s.scenario_key))
        .strings("scenario_id", scenarios.iter().map(|s| s.scenario_id.clone()))
        .strings("description", scenarios.iter().map(|s| s.description.clone()))
        .finish(&table_schema::DIM_SCENARIO)?;
    frames.insert(table_schema::DIM_SCENARIO.name, df);

    let zones = &dims.zones;
    let df = FrameBuilder::new()
        .keys("zone_key", zones.iter().map(|z| z.zone_key))
        .keys("building_key", zones.iter().map(|z| z.building_key))
        .strings("building_id", zones.iter().map(|z| z.building_id.clone()))
        .strings("zone_id", zones.iter().map(|z| z.zone_id.clone()))
        .strings("zone_name", zones.iter().map(|z| z.zone_name.clone()))
        .finish(&table_schema::DIM_ZONE)?;
    frames.insert(table_schema::DIM_ZONE.name, df);

    let ahus = &dims.ahus;
    let df = FrameBuilder::new()
        .keys("ahu_key", ahus.iter().map(|a| a.ahu_key))
        .keys("building_key", ahus.iter().map(|a| a.building_key))
        .strings("building_id", ahus.iter().map(|a| a.building_id.clone()))
        .strings("ahu_id", ahus.iter().map(|a| a.ahu_id.clone()))
        .finish(&table_schema::DIM_AHU)?;
    frames.insert(table_schema::DIM_AHU.name, df);

    let times = &dims.times;
    let df = FrameBuilder::new()
        .keys("time_key", times.iter().map(|t| t.time_key))
        .timestamps("timestamp", times.iter().map(|t| t.timestamp))?
        .ints("year", times.iter().map(|t| i64::from(t.year)))
        .ints("month", times.iter().map(|t| i64::from(t.month)))
        .ints("day", times.iter().map(|t| i64::from(t.day)))
        .ints("hour", times.iter().map(|t| i64::from(t.hour)))
        .ints("dow", times.iter().map(|t| i64::from(t.dow)))
        .bools("is_weekend", times.iter().map(|t| t.is_weekend))
        .finish(&table_schema::DIM_TIME)?;
    frames.insert(table_schema::DIM_TIME.name, df);

    let rows = &schema.fact_zone_conditions;
    let df = FrameBuilder::new()
        .keys("time_key", rows.iter().map(|r| r.time_key))
        .keys("zone_key", rows.iter().map(|r| r.zone_key))
        .keys("scenario_key", rows.iter().map(|r| r.scenario_key))
        .timestamps("timestamp", rows.iter().map(|r| r.timestamp))?
        .floats("air_temp_c", rows.iter().map(|r| r.air_temp_c))
        .floats("setpoint_c", rows.iter().map(|r| r.setpoint_c))
        .floats("co2_ppm", rows.iter().map(|r| r.co2_ppm))
        .floats("rh_pct", rows.iter().map(|r| r.rh_pct))
        .floats("temp_deviation", rows.iter().map(|r| r.temp_deviation))
        .strings("row_ref", rows.iter().map(|r| r.row_ref.to_string()))
        .finish(&table_schema::FACT_ZONE_CONDITIONS)?;
    frames.insert(table_schema::FACT_ZONE_CONDITIONS.name, df);

    let rows = &schema.fact_hvac;
    let df = FrameBuilder::new()
        .keys("time_key", rows.iter().map(|r| r.time_key))
        .keys("ahu_key", rows.iter().map(|r| r.ahu_key))
        .keys("scenario_key", rows.iter().map(|r| r.scenario_key))
        .timestamps("timestamp", rows.iter().map(|r| r.timestamp))?
        .floats("supply_temp_c", rows.iter().map(|r| r.supply_temp_c))
        .floats("return_temp_c", rows.iter().map(|r| r.return_temp_c))
        .floats("power_kw", rows.iter().map(|r| r.power_kw))
        .floats("cooling_kw", rows.iter().map(|r| r.cooling_kw))
        .floats("heating_kw", rows.iter().map(|r| r.heating_kw))
        .optional_floats("cop_proxy", rows.iter().map(|r| r.cop_proxy))
        .strings("row_ref", rows.iter().map(|r| r.row_ref.to_string()))
        .finish(&table_schema::FACT_HVAC)?;
    frames.insert(table_schema::FACT_HVAC.name, df);

    let rows = &schema.fact_meters;
    let df = FrameBuilder::new()
        .keys("time_key", rows.iter().map(|r| r.time_key))
        .keys("building_key", rows.iter().map(|r| r.building_key))
        .keys("scenario_key", rows.iter().map(|r| r.scenario_key))
        .timestamps("timestamp", rows.iter().map(|r| r.timestamp))?
        .floats("electric_kwh", rows.iter().map(|r| r.electric_kwh))
        .floats("heating_kwh", rows.iter().map(|r| r.heating_kwh))
        .floats("cooling_kwh", rows.iter().map(|r| r.cooling_kwh))
        .strings("row_ref", rows.iter().map(|r| r.row_ref.to_string()))
        .finish(&table_schema::FACT_METERS)?;
    frames.insert(table_schema::FACT_METERS.name, df);

    let rows = &schema.fact_weather;
    let df = FrameBuilder::new()
        .keys("time_key", rows.iter().map(|r| r.time_key))
        .keys("building_key", rows.iter().map(|r| r.building_key))
        .keys("scenario_key", rows.iter().map(|r| r.scenario_key))
        .timestamps("timestamp", rows.iter().map(|r| r.timestamp))?
        .floats("drybulb_c", rows.iter().map(|r| r.drybulb_c))
        .floats("relhum_pct", rows.iter().map(|r| r.relhum_pct))
        .floats("ghi_w_m2", rows.iter().map(|r| r.ghi_w_m2))
        .strings("row_ref", rows.iter().map(|r| r.row_ref.to_string()))
        .finish(&table_schema::FACT_WEATHER)?;
    frames.insert(table_schema::FACT_WEATHER.name, df);

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_schema_materializes_every_table() {
        let frames = StarSchema::default().to_frames().unwrap();
        assert_eq!(frames.len(), table_schema::ALL_TABLES.len());
        for table in table_schema::ALL_TABLES {
            let df = frames.get(table.name).unwrap();
            assert_eq!(df.height(), 0);
            assert_eq!(df.width(), table.columns.len());
        }
    }

    #[test]
    fn test_conform_rejects_wrong_columns() {
        let df = df! { "building_key" => &[1i64] }.unwrap();
        let err = conform(&table_schema::DIM_BUILDING, &df).unwrap_err();
        assert!(matches!(err, EtlError::Schema(_)));
    }
}
