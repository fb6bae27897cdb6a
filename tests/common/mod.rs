//! Deterministic simulation runs for integration tests.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use simstar::records::{
    HvacReading, MeterReading, RunMetadata, SimulationRun, WeatherReading, ZoneReading,
};

/// Monday 2024-01-01 00:00
pub fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn hour(h: i64) -> NaiveDateTime {
    start() + Duration::hours(h)
}

/// Builder for one clean run: every value in range, electric roughly equal
/// to heating plus cooling, no gaps.
#[derive(Debug, Clone)]
pub struct RunFixture {
    building: String,
    scenario: String,
    hours: u32,
    zones: usize,
    ahus: usize,
    floor_area_m2: f64,
    description: Option<String>,
}

impl RunFixture {
    pub fn new(building: &str, scenario: &str) -> Self {
        Self {
            building: building.to_string(),
            scenario: scenario.to_string(),
            hours: 168,
            zones: 3,
            ahus: 2,
            floor_area_m2: 4000.0,
            description: None,
        }
    }

    pub fn hours(mut self, hours: u32) -> Self {
        self.hours = hours;
        self
    }

    pub fn zones(mut self, zones: usize) -> Self {
        self.zones = zones;
        self
    }

    pub fn ahus(mut self, ahus: usize) -> Self {
        self.ahus = ahus;
        self
    }

    pub fn floor_area(mut self, floor_area_m2: f64) -> Self {
        self.floor_area_m2 = floor_area_m2;
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn run_id(&self) -> String {
        format!("run_{}_{}", self.building, self.scenario)
    }

    pub fn build(&self) -> SimulationRun {
        let mut zones = Vec::new();
        let mut hvac = Vec::new();
        let mut meters = Vec::new();
        let mut weather = Vec::new();

        for h in 0..self.hours as i64 {
            let ts = hour(h);
            let hod = (h % 24) as f64;
            for z in 1..=self.zones {
                zones.push(ZoneReading {
                    timestamp: ts,
                    building_id: self.building.clone(),
                    zone_id: format!("Z{:02}", z),
                    zone_name: format!("Zone {}", z),
                    air_temp_c: 21.0 + (hod - 12.0) * 0.25,
                    setpoint_c: 21.0,
                    co2_ppm: 500.0 + hod * 20.0,
                    rh_pct: 40.0,
                });
            }
            for a in 1..=self.ahus {
                hvac.push(HvacReading {
                    timestamp: ts,
                    building_id: self.building.clone(),
                    ahu_id: format!("AHU_{}", a),
                    supply_temp_c: 16.0,
                    return_temp_c: 22.0,
                    power_kw: 4.0,
                    cooling_kw: 2.0,
                    heating_kw: 10.0 + (h % 5) as f64,
                });
            }
            meters.push(MeterReading {
                timestamp: ts,
                building_id: self.building.clone(),
                electric_kwh: 25.0,
                heating_kwh: 20.0,
                cooling_kwh: 5.0,
            });
            weather.push(WeatherReading {
                timestamp: ts,
                drybulb_c: -5.0 + hod * 0.5,
                relhum_pct: 80.0,
                ghi_w_m2: if (8.0..16.0).contains(&hod) { 300.0 } else { 0.0 },
            });
        }

        SimulationRun {
            run_id: self.run_id(),
            metadata: RunMetadata {
                building_id: self.building.clone(),
                scenario_id: self.scenario.clone(),
                building_name: format!("Building {}", self.building),
                location: "Tallinn, Estonia".to_string(),
                floor_area_m2: self.floor_area_m2,
                description: self.description.clone(),
                start_timestamp: start(),
                duration_hours: self.hours,
            },
            zones,
            hvac,
            meters,
            weather,
        }
    }
}

/// Baseline and retrofit runs of one building.
pub fn two_scenarios() -> Vec<SimulationRun> {
    vec![
        RunFixture::new("BLDG_01", "BASE").build(),
        RunFixture::new("BLDG_01", "RETROFIT").build(),
    ]
}
