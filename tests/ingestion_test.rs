mod common;

use common::RunFixture;
use polars::prelude::*;
use serde::Serialize;
use simstar::ingestion::{ParquetTableWriter, RunDirectoryReader, REPORT_FILE};
use simstar::records::{SimulationRun, HVAC_FILE, METADATA_FILE, METERS_FILE, WEATHER_FILE, ZONES_FILE};
use simstar::{Pipeline, PipelineConfig};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

fn temp_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("simstar-{}-{}", label, Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) {
    let mut writer = csv::Writer::from_path(path).unwrap();
    for row in rows {
        writer.serialize(row).unwrap();
    }
    writer.flush().unwrap();
}

/// Lay a run out on disk the way the simulation export does.
fn write_run(root: &Path, run: &SimulationRun, with_window: bool) -> PathBuf {
    let dir = root.join(&run.run_id);
    fs::create_dir_all(&dir).unwrap();
    let meta = &run.metadata;
    let mut metadata = serde_json::json!({
        "building_id": meta.building_id,
        "scenario_id": meta.scenario_id,
        "building_name": meta.building_name,
        "location": meta.location,
        "floor_area_m2": meta.floor_area_m2,
        "description": meta.description,
        "generated_at": "2024-01-01T00:00:00Z",
    });
    if with_window {
        metadata["start_timestamp"] =
            serde_json::Value::String(meta.start_timestamp.format("%Y-%m-%d %H:%M:%S").to_string());
        metadata["duration_hours"] = serde_json::Value::from(meta.duration_hours);
    }
    fs::write(dir.join(METADATA_FILE), metadata.to_string()).unwrap();
    write_csv(&dir.join(ZONES_FILE), &run.zones);
    write_csv(&dir.join(HVAC_FILE), &run.hvac);
    write_csv(&dir.join(METERS_FILE), &run.meters);
    write_csv(&dir.join(WEATHER_FILE), &run.weather);
    dir
}

#[test]
fn test_reads_runs_back_unchanged() {
    let root = temp_dir("read");
    let base = RunFixture::new("BLDG_01", "BASE").hours(24).description("Baseline").build();
    let retro = RunFixture::new("BLDG_01", "RETROFIT").hours(24).build();
    write_run(&root, &retro, true);
    write_run(&root, &base, true);
    fs::create_dir_all(root.join("notes")).unwrap();

    let batch = RunDirectoryReader::new(&root).read_batch().unwrap();
    assert!(batch.excluded.is_empty());
    assert_eq!(batch.runs.len(), 2);
    assert_eq!(batch.runs[0], base);
    assert_eq!(batch.runs[1], retro);

    fs::remove_dir_all(&root).ok();
}

#[test]
fn test_time_window_inferred_when_absent() {
    let root = temp_dir("infer");
    let run = RunFixture::new("BLDG_01", "BASE").hours(48).build();
    write_run(&root, &run, false);

    let batch = RunDirectoryReader::new(&root).read_batch().unwrap();
    let meta = &batch.runs[0].metadata;
    assert_eq!(meta.start_timestamp, common::start());
    assert_eq!(meta.duration_hours, 48);

    fs::remove_dir_all(&root).ok();
}

#[test]
fn test_broken_runs_are_excluded() {
    let root = temp_dir("exclude");
    let good = RunFixture::new("BLDG_01", "BASE").hours(6).build();
    write_run(&root, &good, true);

    let missing = RunFixture::new("BLDG_02", "BASE").hours(6).build();
    let dir = write_run(&root, &missing, true);
    fs::remove_file(dir.join(WEATHER_FILE)).unwrap();

    let garbled = RunFixture::new("BLDG_03", "BASE").hours(6).build();
    let dir = write_run(&root, &garbled, true);
    fs::write(
        dir.join(METERS_FILE),
        "timestamp,building_id,electric_kwh,heating_kwh,cooling_kwh\nnot-a-time,BLDG_03,1,1,1\n",
    )
    .unwrap();

    let batch = RunDirectoryReader::new(&root).read_batch().unwrap();
    assert_eq!(batch.runs.len(), 1);
    assert_eq!(batch.excluded.len(), 2);
    assert_eq!(batch.excluded[0].run_id, "run_BLDG_02_BASE");
    assert!(batch.excluded[0].reason.contains(WEATHER_FILE));
    assert_eq!(batch.excluded[1].run_id, "run_BLDG_03_BASE");
    assert!(batch.excluded[1].reason.contains("meters.csv row 0"));

    // 2 of 3 runs excluded is above the default limit
    let outcome = Pipeline::new(PipelineConfig::default()).run(batch);
    assert!(outcome.report.is_fatal());

    fs::remove_dir_all(&root).ok();
}

#[test]
fn test_missing_root_is_an_error() {
    let root = std::env::temp_dir().join(format!("simstar-absent-{}", Uuid::new_v4()));
    assert!(RunDirectoryReader::new(&root).read_batch().is_err());
}

#[test]
fn test_loads_tables_as_parquet() {
    let root = temp_dir("load");
    let run = RunFixture::new("BLDG_01", "BASE").hours(24).build();
    write_run(&root, &run, true);

    let batch = RunDirectoryReader::new(&root).read_batch().unwrap();
    let outcome = Pipeline::new(PipelineConfig::default()).run(batch);
    assert!(outcome.should_load(), "{}", outcome.report);

    let output = root.join("warehouse");
    let writer = ParquetTableWriter::new(&output);
    let schema = outcome.star_schema.as_ref().unwrap();
    let mut frames = schema.to_frames().unwrap();
    let written = writer.write_frames(&mut frames).unwrap();
    writer.write_report(&outcome.report).unwrap();
    assert_eq!(written.len(), 9);
    assert!(output.join(REPORT_FILE).is_file());

    let file = fs::File::open(output.join("fact_zone_conditions.parquet")).unwrap();
    let df = ParquetReader::new(file).finish().unwrap();
    assert_eq!(df.height(), 24 * 3);
    assert!(df.get_column_names().contains(&"temp_deviation"));

    fs::remove_dir_all(&root).ok();
}

#[test]
fn test_rejects_unsafe_table_names() {
    let root = temp_dir("names");
    let writer = ParquetTableWriter::new(&root);
    let mut df = df! { "a" => &[1i64] }.unwrap();
    assert!(writer.write_table("../escape", &mut df).is_err());
    assert!(writer.write_table("ok_table", &mut df).is_ok());
    fs::remove_dir_all(&root).ok();
}
