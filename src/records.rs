//! Raw per-run records as handed over by the extraction collaborator.
//!
//! Field names follow the extract files (`air_temp_C`, `ghi_W_m2`, ...) on the
//! serde side and snake_case on the Rust side.

use crate::error::{EtlError, Result};
use chrono::{DateTime, Duration, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub const METADATA_FILE: &str = "metadata.json";
pub const ZONES_FILE: &str = "zones.csv";
pub const HVAC_FILE: &str = "hvac.csv";
pub const METERS_FILE: &str = "meters.csv";
pub const WEATHER_FILE: &str = "weather.csv";

/// Run-level metadata. One run is one (building, scenario) simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub building_id: String,
    pub scenario_id: String,
    pub building_name: String,
    pub location: String,
    pub floor_area_m2: f64,
    #[serde(default)]
    pub description: Option<String>,
    /// First hour of the simulated period
    pub start_timestamp: NaiveDateTime,
    /// Number of hourly steps, the grid is `[start, start + duration)`
    pub duration_hours: u32,
}

impl RunMetadata {
    pub fn scenario_description(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("Scenario {}", self.scenario_id))
    }

    /// Exclusive end of the run window.
    pub fn window_end(&self) -> Result<NaiveDateTime> {
        self.start_timestamp
            .checked_add_signed(Duration::hours(i64::from(self.duration_hours)))
            .ok_or_else(|| {
                EtlError::Extraction(format!(
                    "run window starting {} with {} hours overflows the calendar",
                    self.start_timestamp, self.duration_hours
                ))
            })
    }

    /// Hourly timestamps declared by this run.
    pub fn hourly_grid(&self) -> Result<Vec<NaiveDateTime>> {
        let end = self.window_end()?;
        let mut grid = Vec::with_capacity(self.duration_hours as usize);
        let mut ts = self.start_timestamp;
        while ts < end {
            grid.push(ts);
            ts = match ts.checked_add_signed(Duration::hours(1)) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(grid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneReading {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: NaiveDateTime,
    pub building_id: String,
    pub zone_id: String,
    pub zone_name: String,
    #[serde(rename = "air_temp_C")]
    pub air_temp_c: f64,
    #[serde(rename = "setpoint_C")]
    pub setpoint_c: f64,
    pub co2_ppm: f64,
    pub rh_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HvacReading {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: NaiveDateTime,
    pub building_id: String,
    pub ahu_id: String,
    #[serde(rename = "supply_temp_C")]
    pub supply_temp_c: f64,
    #[serde(rename = "return_temp_C")]
    pub return_temp_c: f64,
    pub power_kw: f64,
    pub cooling_kw: f64,
    pub heating_kw: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterReading {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: NaiveDateTime,
    pub building_id: String,
    pub electric_kwh: f64,
    pub heating_kwh: f64,
    pub cooling_kwh: f64,
}

/// Weather carries no building column; it belongs to the run's building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: NaiveDateTime,
    #[serde(rename = "drybulb_C")]
    pub drybulb_c: f64,
    pub relhum_pct: f64,
    #[serde(rename = "ghi_W_m2")]
    pub ghi_w_m2: f64,
}

/// Everything extracted for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationRun {
    pub run_id: String,
    pub metadata: RunMetadata,
    pub zones: Vec<ZoneReading>,
    pub hvac: Vec<HvacReading>,
    pub meters: Vec<MeterReading>,
    pub weather: Vec<WeatherReading>,
}

/// A run the extraction collaborator could not read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedRun {
    pub run_id: String,
    pub reason: String,
}

/// Input of one pipeline invocation.
#[derive(Debug, Clone, Default)]
pub struct RunBatch {
    pub runs: Vec<SimulationRun>,
    pub excluded: Vec<ExcludedRun>,
}

impl RunBatch {
    pub fn new(runs: Vec<SimulationRun>) -> Self {
        Self {
            runs,
            excluded: Vec::new(),
        }
    }

    pub fn total_runs(&self) -> usize {
        self.runs.len() + self.excluded.len()
    }
}

/// Source row identifier, rendered as `<run_id>/<file>#<row>` (0-based data row).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowRef {
    pub run_id: String,
    pub file: &'static str,
    pub row: usize,
}

impl RowRef {
    pub fn new(run_id: &str, file: &'static str, row: usize) -> Self {
        Self {
            run_id: run_id.to_string(),
            file,
            row,
        }
    }
}

impl fmt::Display for RowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.run_id, self.file, self.row)
    }
}

/// Parse the timestamp spellings seen in simulation extracts.
/// Offsets are converted to UTC and dropped.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognised timestamp '{}'", raw)))
}
