use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::constant::COORDINATE_TOLERANCE;
use crate::geo;

/// (latitude, longitude) in degrees.
pub type Coordinates = (f64, f64);

pub fn generate_location_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("loc_{}", &hex[..8])
}

/// A WCO generator: one establishment that accumulates oil and must be
/// serviced every `disposal_schedule` days. Immutable after load except
/// `distance_from_depot`, which the pipeline fills in once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    #[serde(default = "generate_location_id")]
    pub id: String,
    pub name: String,
    pub coordinates: Coordinates,
    pub wco_amount: f64,
    pub disposal_schedule: u32,
    #[serde(default)]
    pub distance_from_depot: f64,
}

impl Location {
    pub fn new(name: &str, coordinates: Coordinates, wco_amount: f64, disposal_schedule: u32) -> Self {
        Location {
            id: generate_location_id(),
            name: name.to_string(),
            coordinates,
            wco_amount,
            disposal_schedule,
            distance_from_depot: 0.0,
        }
    }

    pub fn describe(&self) -> String {
        format!("{} (ID: {}, WCO: {}L)", self.name, self.id, self.wco_amount)
    }
}

/// Immutable fleet vehicle. Load, time, and trip accounting live in the
/// trip ledger, never on the vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub capacity: f64,
    pub depot_location: Coordinates,
}

impl Vehicle {
    pub fn new(id: &str, capacity: f64, depot_location: Coordinates) -> Self {
        Vehicle {
            id: id.to_string(),
            capacity,
            depot_location,
        }
    }

    pub fn remaining_capacity(&self, current_load: f64) -> f64 {
        self.capacity - current_load
    }
}

/// Directional road restrictions. A `(from, to)` pair means the road may
/// only be driven from `from` towards `to`; the reverse transition is
/// forbidden.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteConstraints {
    #[serde(default)]
    pub one_way_roads: Vec<(Coordinates, Coordinates)>,
}

impl RouteConstraints {
    /// True when driving `from -> to` would run a one-way road backwards.
    pub fn forbids(&self, from: Coordinates, to: Coordinates) -> bool {
        self.one_way_roads.iter().any(|(allowed_from, allowed_to)| {
            geo::coordinates_match(from, *allowed_to, COORDINATE_TOLERANCE)
                && geo::coordinates_match(to, *allowed_from, COORDINATE_TOLERANCE)
        })
    }
}
