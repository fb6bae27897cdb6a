//! Reads a simulations directory laid out as one `run_*` folder per run.
//!
//! A run that cannot be read is excluded with a reason; it never aborts the
//! batch.

use crate::error::{EtlError, Result};
use crate::records::{
    parse_timestamp, ExcludedRun, HvacReading, MeterReading, RunBatch, RunMetadata,
    SimulationRun, WeatherReading, ZoneReading, HVAC_FILE, METADATA_FILE, METERS_FILE,
    WEATHER_FILE, ZONES_FILE,
};
use chrono::{Duration, NaiveDateTime};
use csv::{ReaderBuilder, Trim};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const RUN_DIR_PREFIX: &str = "run_";

/// `metadata.json` as written by the simulation export. The time window may
/// be absent, in which case it is inferred from the readings.
#[derive(Debug, Deserialize)]
struct MetadataFile {
    building_id: String,
    scenario_id: String,
    building_name: String,
    location: String,
    floor_area_m2: f64,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    start_timestamp: Option<String>,
    #[serde(default)]
    duration_hours: Option<u32>,
}

pub struct RunDirectoryReader {
    root: PathBuf,
}

impl RunDirectoryReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `run_*` sub-directories, sorted by name.
    pub fn run_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            let is_run = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with(RUN_DIR_PREFIX));
            if is_run && path.is_dir() {
                dirs.push(path);
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    /// Read every run. Fails only when the root directory itself is unreadable.
    pub fn read_batch(&self) -> Result<RunBatch> {
        let mut batch = RunBatch::default();
        for dir in self.run_dirs()? {
            let run_id = run_id_of(&dir);
            match self.read_run(&dir) {
                Ok(run) => {
                    debug!(
                        "Read {}: {} zone, {} hvac, {} meter, {} weather rows",
                        run.run_id,
                        run.zones.len(),
                        run.hvac.len(),
                        run.meters.len(),
                        run.weather.len()
                    );
                    batch.runs.push(run);
                }
                Err(e) => {
                    warn!("Excluding run {}: {}", run_id, e);
                    batch.excluded.push(ExcludedRun {
                        run_id,
                        reason: e.to_string(),
                    });
                }
            }
        }
        info!(
            "Read {} runs from {} ({} excluded)",
            batch.runs.len(),
            self.root.display(),
            batch.excluded.len()
        );
        Ok(batch)
    }

    pub fn read_run(&self, dir: &Path) -> Result<SimulationRun> {
        let run_id = run_id_of(dir);
        let metadata_path = dir.join(METADATA_FILE);
        if !metadata_path.is_file() {
            return Err(EtlError::Extraction(format!(
                "{} not found in {}",
                METADATA_FILE, run_id
            )));
        }
        let raw: MetadataFile = serde_json::from_str(&std::fs::read_to_string(&metadata_path)?)
            .map_err(|e| EtlError::Extraction(format!("{}: {}", METADATA_FILE, e)))?;

        let zones: Vec<ZoneReading> = read_csv(dir, ZONES_FILE)?;
        let hvac: Vec<HvacReading> = read_csv(dir, HVAC_FILE)?;
        let meters: Vec<MeterReading> = read_csv(dir, METERS_FILE)?;
        let weather: Vec<WeatherReading> = read_csv(dir, WEATHER_FILE)?;

        let observed: Vec<NaiveDateTime> = zones
            .iter()
            .map(|r| r.timestamp)
            .chain(hvac.iter().map(|r| r.timestamp))
            .chain(meters.iter().map(|r| r.timestamp))
            .chain(weather.iter().map(|r| r.timestamp))
            .collect();
        let (start_timestamp, duration_hours) = time_window(&raw, &observed)?;

        Ok(SimulationRun {
            run_id,
            metadata: RunMetadata {
                building_id: raw.building_id,
                scenario_id: raw.scenario_id,
                building_name: raw.building_name,
                location: raw.location,
                floor_area_m2: raw.floor_area_m2,
                description: raw.description,
                start_timestamp,
                duration_hours,
            },
            zones,
            hvac,
            meters,
            weather,
        })
    }
}

fn run_id_of(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string())
}

fn read_csv<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<Vec<T>> {
    let path = dir.join(file);
    if !path.is_file() {
        return Err(EtlError::Extraction(format!("{} not found", file)));
    }
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_path(&path)?;
    let mut rows = Vec::new();
    for (i, record) in reader.deserialize().enumerate() {
        let row: T =
            record.map_err(|e| EtlError::Extraction(format!("{} row {}: {}", file, i, e)))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Declared start/duration, falling back to the span of observed timestamps.
fn time_window(raw: &MetadataFile, observed: &[NaiveDateTime]) -> Result<(NaiveDateTime, u32)> {
    let start = match &raw.start_timestamp {
        Some(s) => parse_timestamp(s).ok_or_else(|| {
            EtlError::Extraction(format!("unrecognised start_timestamp '{}'", s))
        })?,
        None => observed.iter().min().copied().ok_or_else(|| {
            EtlError::Extraction("no start_timestamp and no readings to infer it from".to_string())
        })?,
    };
    let duration = match raw.duration_hours {
        Some(hours) => hours,
        None => match observed.iter().max() {
            Some(last) if *last >= start => ((*last - start).num_hours() + 1) as u32,
            _ => 0,
        },
    };
    if start
        .checked_add_signed(Duration::hours(i64::from(duration)))
        .is_none()
    {
        return Err(EtlError::Extraction(format!(
            "run window starting {} with {} hours overflows the calendar",
            start, duration
        )));
    }
    Ok((start, duration))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn raw(start: Option<&str>, duration: Option<u32>) -> MetadataFile {
        MetadataFile {
            building_id: "B1".to_string(),
            scenario_id: "BASE".to_string(),
            building_name: "Building B1".to_string(),
            location: "Tallinn, Estonia".to_string(),
            floor_area_m2: 4000.0,
            description: None,
            start_timestamp: start.map(str::to_string),
            duration_hours: duration,
        }
    }

    fn ts(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn test_window_is_inferred_from_readings() {
        let (start, hours) = time_window(&raw(None, None), &[ts(3), ts(1), ts(5)]).unwrap();
        assert_eq!(start, ts(1));
        assert_eq!(hours, 5);
    }

    #[test]
    fn test_declared_window_wins() {
        let (start, hours) =
            time_window(&raw(Some("2024-01-01 00:00:00"), Some(168)), &[ts(3)]).unwrap();
        assert_eq!(start, ts(0));
        assert_eq!(hours, 168);
    }

    #[test]
    fn test_no_window_and_no_readings_is_an_error() {
        assert!(matches!(
            time_window(&raw(None, None), &[]),
            Err(EtlError::Extraction(_))
        ));
    }

    #[test]
    fn test_window_past_calendar_end_is_an_error() {
        assert!(matches!(
            time_window(&raw(Some("2024-01-01 00:00:00"), Some(u32::MAX)), &[]),
            Err(EtlError::Extraction(_))
        ));
    }
}
