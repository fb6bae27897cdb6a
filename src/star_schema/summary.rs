//! Per (building, scenario) energy totals over the meter fact table.

use super::SurrogateKey;
use crate::context::DimensionContext;
use crate::error::Result;
use polars::prelude::*;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnergySummary {
    pub building_key: SurrogateKey,
    pub building_id: String,
    pub scenario_key: SurrogateKey,
    pub scenario_id: String,
    /// Distinct hours with a meter reading
    pub hours: usize,
    pub total_electric_kwh: f64,
    pub total_heating_kwh: f64,
    pub total_cooling_kwh: f64,
    pub avg_electric_kwh: f64,
    pub avg_heating_kwh: f64,
    pub avg_cooling_kwh: f64,
}

impl EnergySummary {
    pub fn total_thermal_kwh(&self) -> f64 {
        self.total_heating_kwh + self.total_cooling_kwh
    }

    pub fn total_energy_kwh(&self) -> f64 {
        self.total_electric_kwh + self.total_thermal_kwh()
    }

    /// Electric over thermal energy; `None` when there is no thermal energy.
    pub fn electric_ratio(&self) -> Option<f64> {
        let thermal = self.total_thermal_kwh();
        if thermal > 0.0 {
            Some(self.total_electric_kwh / thermal)
        } else {
            None
        }
    }
}

impl fmt::Display for EnergySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<16} {:<12} {:>6}h  electric {:>12.1} kWh  heating {:>12.1} kWh  cooling {:>12.1} kWh",
            self.building_id,
            self.scenario_id,
            self.hours,
            self.total_electric_kwh,
            self.total_heating_kwh,
            self.total_cooling_kwh
        )
    }
}

/// Aggregate the `fact_meters` frame, ordered by (building_key, scenario_key).
pub fn energy_summary(meters: &DataFrame, dims: &DimensionContext) -> Result<Vec<EnergySummary>> {
    let grouped = meters
        .clone()
        .lazy()
        .group_by([col("building_key"), col("scenario_key")])
        .agg([
            col("time_key").n_unique().alias("hours"),
            col("electric_kwh").sum().alias("total_electric_kwh"),
            col("heating_kwh").sum().alias("total_heating_kwh"),
            col("cooling_kwh").sum().alias("total_cooling_kwh"),
            col("electric_kwh").mean().alias("avg_electric_kwh"),
            col("heating_kwh").mean().alias("avg_heating_kwh"),
            col("cooling_kwh").mean().alias("avg_cooling_kwh"),
        ])
        .collect()?;

    let building_keys = grouped.column("building_key")?.i64()?;
    let scenario_keys = grouped.column("scenario_key")?.i64()?;
    let hours = grouped.column("hours")?.cast(&DataType::Int64)?;
    let hours = hours.i64()?;
    let float = |name: &str| -> Result<Float64Chunked> {
        Ok(grouped.column(name)?.f64()?.clone())
    };
    let total_electric = float("total_electric_kwh")?;
    let total_heating = float("total_heating_kwh")?;
    let total_cooling = float("total_cooling_kwh")?;
    let avg_electric = float("avg_electric_kwh")?;
    let avg_heating = float("avg_heating_kwh")?;
    let avg_cooling = float("avg_cooling_kwh")?;

    let mut summaries = Vec::with_capacity(grouped.height());
    for i in 0..grouped.height() {
        let (Some(building_key), Some(scenario_key)) = (building_keys.get(i), scenario_keys.get(i))
        else {
            continue;
        };
        let building_key = building_key as SurrogateKey;
        let scenario_key = scenario_key as SurrogateKey;
        summaries.push(EnergySummary {
            building_key,
            building_id: dims
                .building(building_key)
                .map(|b| b.building_id.clone())
                .unwrap_or_default(),
            scenario_key,
            scenario_id: dims
                .scenario(scenario_key)
                .map(|s| s.scenario_id.clone())
                .unwrap_or_default(),
            hours: hours.get(i).unwrap_or(0) as usize,
            total_electric_kwh: total_electric.get(i).unwrap_or(0.0),
            total_heating_kwh: total_heating.get(i).unwrap_or(0.0),
            total_cooling_kwh: total_cooling.get(i).unwrap_or(0.0),
            avg_electric_kwh: avg_electric.get(i).unwrap_or(0.0),
            avg_heating_kwh: avg_heating.get(i).unwrap_or(0.0),
            avg_cooling_kwh: avg_cooling.get(i).unwrap_or(0.0),
        });
    }
    summaries.sort_by_key(|s| (s.building_key, s.scenario_key));
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups_by_building_and_scenario() {
        let meters = df! {
            "time_key" => &[1i64, 2, 1, 2],
            "building_key" => &[1i64, 1, 1, 1],
            "scenario_key" => &[2i64, 2, 1, 1],
            "electric_kwh" => &[10.0, 20.0, 5.0, 5.0],
            "heating_kwh" => &[4.0, 6.0, 1.0, 1.0],
            "cooling_kwh" => &[0.0, 10.0, 0.0, 0.0]
        }
        .unwrap();
        let summary = energy_summary(&meters, &DimensionContext::default()).unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].scenario_key, 1);
        assert_eq!(summary[1].hours, 2);
        assert_eq!(summary[1].total_electric_kwh, 30.0);
        assert_eq!(summary[1].avg_heating_kwh, 5.0);
        assert_eq!(summary[1].electric_ratio(), Some(30.0 / 20.0));
        assert_eq!(summary[0].electric_ratio(), Some(5.0));
    }

    #[test]
    fn test_no_thermal_energy_has_no_ratio() {
        let s = EnergySummary {
            building_key: 1,
            building_id: "B1".to_string(),
            scenario_key: 1,
            scenario_id: "BASE".to_string(),
            hours: 1,
            total_electric_kwh: 3.0,
            total_heating_kwh: 0.0,
            total_cooling_kwh: 0.0,
            avg_electric_kwh: 3.0,
            avg_heating_kwh: 0.0,
            avg_cooling_kwh: 0.0,
        };
        assert_eq!(s.electric_ratio(), None);
        assert_eq!(s.total_energy_kwh(), 3.0);
    }
}
