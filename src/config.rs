use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::location::{Coordinates, Location, RouteConstraints};
use crate::domain::schedule::ScheduleEntry;
use crate::error::RoutingError;

pub mod constant {
    /// Assumed fleet speed inside the service area.
    pub const AVERAGE_SPEED_KPH: f64 = 30.0;
    /// Working day budget in minutes (7-hour shift).
    pub const MAX_DAILY_TIME: f64 = 7.0 * 60.0;
    /// Default minutes spent at an establishment per pickup.
    pub const COLLECTION_TIME_MINUTES: f64 = 15.0;
    /// Two coordinates closer than this are the same point.
    pub const COORDINATE_TOLERANCE: f64 = 1e-6;
    /// Wall clock budget for the constrained solver, in seconds.
    pub const SOLVER_TIME_LIMIT_SECS: u64 = 10;
    /// Fixed seed so clustering is reproducible run to run.
    pub const KMEANS_SEED: u64 = 42;
}

/// Presentation hints for map frontends. Opaque to the routing core;
/// round-tripped through `/api/config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    pub center: Option<Coordinates>,
    pub zoom_level: u32,
    pub path_weight: u32,
    pub path_opacity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleConfig {
    pub id: String,
    pub capacity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveConfig {
    #[serde(default = "default_solver")]
    pub solver: String,
    pub vehicles: Vec<VehicleConfig>,
    pub depot_location: Coordinates,
    #[serde(default)]
    pub constraints: RouteConstraints,
    #[serde(default = "default_max_daily_time")]
    pub max_daily_time: f64,
    #[serde(default = "default_average_speed")]
    pub average_speed_kph: f64,
    /// Re-enables the old volume-scaled stop time estimate. Off by default;
    /// pickups are billed at the flat per-establishment time.
    #[serde(default)]
    pub volume_scaled_stop_time: bool,
    /// Accepted for forward compatibility; not enforced anywhere yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_trips_per_day: Option<u32>,
}

fn default_solver() -> String {
    "schedule".to_string()
}

fn default_max_daily_time() -> f64 {
    constant::MAX_DAILY_TIME
}

fn default_average_speed() -> f64 {
    constant::AVERAGE_SPEED_KPH
}

/// Top-level config document (`data/schedule_config.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<MapConfig>,
    #[serde(default)]
    pub schedules: Vec<ScheduleEntry>,
    #[serde(default)]
    pub locations: Vec<Location>,
    pub settings: SolveConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, RoutingError> {
        let raw = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), RoutingError> {
        let (lat, lon) = self.settings.depot_location;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(RoutingError::MalformedCoordinates(format!(
                "depot ({lat}, {lon})"
            )));
        }
        if self.settings.vehicles.is_empty() {
            return Err(RoutingError::Config("no vehicles configured".into()));
        }
        for v in &self.settings.vehicles {
            if v.capacity <= 0.0 {
                return Err(RoutingError::Config(format!(
                    "vehicle {} has non-positive capacity",
                    v.id
                )));
            }
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            map: None,
            schedules: Vec::new(),
            locations: Vec::new(),
            settings: SolveConfig {
                solver: default_solver(),
                vehicles: vec![VehicleConfig {
                    id: "truck_1".to_string(),
                    capacity: 1000.0,
                }],
                depot_location: (7.0707, 125.6087),
                constraints: RouteConstraints::default(),
                max_daily_time: constant::MAX_DAILY_TIME,
                average_speed_kph: constant::AVERAGE_SPEED_KPH,
                volume_scaled_stop_time: false,
                max_trips_per_day: None,
            },
        }
    }
}
