//! Writes materialized tables to Parquet, one file per table.

use crate::error::{EtlError, Result};
use crate::report::ValidationReport;
use crate::star_schema::TableFrames;
use lazy_static::lazy_static;
use polars::prelude::*;
use regex::Regex;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

pub const REPORT_FILE: &str = "validation_report.json";

lazy_static! {
    static ref TABLE_NAME: Regex =
        Regex::new(r"^[a-zA-Z0-9_]+$").expect("table name pattern is a valid regex");
}

/// Table names become file names, so only `[A-Za-z0-9_]` is allowed.
pub fn validate_table_name(name: &str) -> Result<()> {
    if TABLE_NAME.is_match(name) {
        Ok(())
    } else {
        Err(EtlError::Config(format!("invalid table name '{}'", name)))
    }
}

pub struct ParquetTableWriter {
    output_dir: PathBuf,
}

impl ParquetTableWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `<table>.parquet` and return its path.
    pub fn write_table(&self, name: &str, df: &mut DataFrame) -> Result<PathBuf> {
        validate_table_name(name)?;
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(format!("{}.parquet", name));
        let mut file = File::create(&path)?;
        ParquetWriter::new(&mut file).finish(df)?;
        info!("Wrote {} rows to {}", df.height(), path.display());
        Ok(path)
    }

    pub fn write_frames(&self, frames: &mut TableFrames) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(frames.len());
        for (name, df) in frames.iter_mut() {
            written.push(self.write_table(name, df)?);
        }
        Ok(written)
    }

    pub fn write_report(&self, report: &ValidationReport) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(REPORT_FILE);
        std::fs::write(&path, report.to_json()?)?;
        info!("Wrote validation report to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names() {
        assert!(validate_table_name("fact_zone_conditions").is_ok());
        assert!(validate_table_name("dim_time2").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("fact;drop").is_err());
        assert!(validate_table_name("../etc").is_err());
    }

    #[test]
    fn test_table_name_pattern_is_reused_across_calls() {
        for table in crate::star_schema::ALL_TABLES {
            assert!(validate_table_name(table.name).is_ok(), "{}", table.name);
        }
        for _ in 0..3 {
            assert!(validate_table_name("dim time").is_err());
        }
    }
}
