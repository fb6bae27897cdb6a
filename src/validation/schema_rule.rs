//! Schema completeness: declared tables and columns exist with the declared
//! types, and critical columns hold no nulls.

use super::ValidationTables;
use crate::error::Result;
use crate::report::{Finding, RuleFamily};
use crate::star_schema::{TableSchema, ALL_TABLES};
use polars::prelude::*;

pub(super) fn evaluate(tables: &ValidationTables) -> Result<Vec<Finding>> {
    let mut findings = Vec::new();
    for schema in ALL_TABLES {
        match tables.frames.get(schema.name) {
            Some(df) => findings.extend(check_table(schema, df)?),
            None => findings.push(Finding::error(
                RuleFamily::Schema,
                format!("schema.{}", schema.name),
                format!("table {} is missing", schema.name),
                Vec::new(),
            )),
        }
    }
    Ok(findings)
}

fn check_table(schema: &TableSchema, df: &DataFrame) -> Result<Vec<Finding>> {
    let mut findings = Vec::new();
    let rule_name = format!("schema.{}", schema.name);
    let present = df.get_column_names();

    for column in schema.columns {
        if !present.contains(&column.name) {
            findings.push(Finding::error(
                RuleFamily::Schema,
                rule_name.clone(),
                format!("required column {}.{} is missing", schema.name, column.name),
                Vec::new(),
            ));
            continue;
        }
        let series = df.column(column.name)?;
        if !column.dtype.matches(series.dtype()) {
            findings.push(Finding::error(
                RuleFamily::Schema,
                rule_name.clone(),
                format!(
                    "column {}.{} has type {}, expected {:?}",
                    schema.name,
                    column.name,
                    series.dtype(),
                    column.dtype
                ),
                Vec::new(),
            ));
            continue;
        }
        if column.is_critical() && series.null_count() > 0 {
            let refs = null_row_refs(schema.name, df, column.name)?;
            findings.push(Finding::error(
                RuleFamily::Schema,
                rule_name.clone(),
                format!(
                    "critical column {}.{} has {} null or non-finite values",
                    schema.name,
                    column.name,
                    series.null_count()
                ),
                refs,
            ));
        }
    }
    Ok(findings)
}

/// Row refs of the null entries of `column`; `<table>#<index>` when the table
/// has no lineage column.
fn null_row_refs(table: &str, df: &DataFrame, column: &str) -> Result<Vec<String>> {
    let mask = df.column(column)?.is_null();
    let lineage = match df.column("row_ref") {
        Ok(series) => Some(series.str()?.clone()),
        Err(_) => None,
    };
    Ok(mask
        .into_iter()
        .enumerate()
        .filter(|(_, is_null)| *is_null == Some(true))
        .map(|(i, _)| {
            lineage
                .as_ref()
                .and_then(|refs| refs.get(i))
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}#{}", table, i))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::star_schema::{StarSchema, TableFrames};

    #[test]
    fn test_complete_empty_schema_passes() {
        let schema = StarSchema::default();
        let frames = schema.to_frames().unwrap();
        let tables = ValidationTables {
            schema: &schema,
            frames: &frames,
        };
        assert!(evaluate(&tables).unwrap().is_empty());
    }

    #[test]
    fn test_missing_table_and_null_measure() {
        let schema = StarSchema::default();
        let mut frames: TableFrames = schema.to_frames().unwrap();
        frames.remove("fact_weather");
        let meters = df! {
            "time_key" => &[1i64, 2],
            "building_key" => &[1i64, 1],
            "scenario_key" => &[1i64, 1],
            "timestamp" => &[0i64, 3_600_000],
            "electric_kwh" => &[Some(1.0), None],
            "heating_kwh" => &[1.0, 1.0],
            "cooling_kwh" => &[0.0, 0.0],
            "row_ref" => &["r/meters.csv#0", "r/meters.csv#1"]
        }
        .unwrap();
        let mut meters = meters;
        let ts = meters
            .column("timestamp")
            .unwrap()
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .unwrap();
        meters.replace("timestamp", ts).unwrap();
        frames.insert("fact_meters", meters);

        let tables = ValidationTables {
            schema: &schema,
            frames: &frames,
        };
        let findings = evaluate(&tables).unwrap();
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| f.is_error()));
        let null_finding = findings
            .iter()
            .find(|f| f.rule_name == "schema.fact_meters")
            .unwrap();
        assert_eq!(null_finding.affected_row_refs, vec!["r/meters.csv#1".to_string()]);
        assert!(findings.iter().any(|f| f.message.contains("fact_weather is missing")));
    }
}
