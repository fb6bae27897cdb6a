//! Dimension rows. Surrogate keys are dense, start at 1 and follow the
//! ascending natural-key order.

use super::SurrogateKey;
use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimBuilding {
    pub building_key: SurrogateKey,
    pub building_id: String,
    pub building_name: String,
    pub location: String,
    pub floor_area_m2: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimScenario {
    pub scenario_key: SurrogateKey,
    pub scenario_id: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimZone {
    pub zone_key: SurrogateKey,
    pub building_key: SurrogateKey,
    pub building_id: String,
    pub zone_id: String,
    pub zone_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimAhu {
    pub ahu_key: SurrogateKey,
    pub building_key: SurrogateKey,
    pub building_id: String,
    pub ahu_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimTime {
    pub time_key: SurrogateKey,
    pub timestamp: NaiveDateTime,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    /// Monday = 0, Sunday = 6
    pub dow: u32,
    pub is_weekend: bool,
}

impl DimTime {
    /// Calendar attributes are a pure function of the timestamp.
    pub fn from_timestamp(time_key: SurrogateKey, timestamp: NaiveDateTime) -> Self {
        let dow = timestamp.weekday().num_days_from_monday();
        Self {
            time_key,
            timestamp,
            year: timestamp.year(),
            month: timestamp.month(),
            day: timestamp.day(),
            hour: timestamp.hour(),
            dow,
            is_weekend: dow >= 5,
        }
    }
}
