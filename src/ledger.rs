use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::constant::COORDINATE_TOLERANCE;
use crate::domain::location::{Coordinates, Location, Vehicle};
use crate::geo;

/// One serviced establishment inside a trip.
#[derive(Debug, Clone)]
pub struct CollectionStop {
    pub location_id: String,
    pub location_name: String,
    pub coordinates: Coordinates,
    pub amount_collected: f64,
    pub cumulative_load: f64,
    pub distance_from_prev: f64,
    pub trip_number: u32,
    pub collection_day: u32,
    /// Seconds.
    pub collection_time: u64,
    /// Seconds.
    pub travel_time: u64,
}

/// All collections registered under one (vehicle, day, trip) key.
#[derive(Debug, Clone)]
pub struct CollectionData {
    pub vehicle_id: String,
    pub day: u32,
    pub trip_number: u32,
    pub visited_location_ids: HashSet<String>,
    pub stops: Vec<CollectionStop>,
    pub total_collected: f64,
    pub total_distance: f64,
    pub collection_timestamp: DateTime<Utc>,
    pub collection_time_minutes: f64,
    pub speed_kph: f64,
}

/// A vehicle's full day, all trips concatenated in registration order.
#[derive(Debug, Clone)]
pub struct VehicleRoute {
    pub vehicle_id: String,
    pub stops: Vec<CollectionStop>,
    pub total_distance: f64,
    pub total_collected: f64,
    pub speed_kph: f64,
}

/// Tracks collections per (vehicle, day, trip) and enforces the daily time
/// budget. The ledger is the single owner of load/time accounting; vehicles
/// themselves stay immutable.
#[derive(Debug, Clone)]
pub struct TripLedger {
    collections: BTreeMap<(String, u32, u32), CollectionData>,
    total_times: BTreeMap<u32, f64>,
    time_exceeded: HashSet<u32>,
    pub total_trips: usize,
    pub total_stops: usize,
    speed_kph: f64,
    max_daily_time: f64,
}

impl TripLedger {
    pub fn new(speed_kph: f64, max_daily_time: f64) -> Self {
        TripLedger {
            collections: BTreeMap::new(),
            total_times: BTreeMap::new(),
            time_exceeded: HashSet::new(),
            total_trips: 0,
            total_stops: 0,
            speed_kph,
            max_daily_time,
        }
    }

    /// Register one pickup. Returns false when the day is already flagged
    /// over budget or the location was already visited by this vehicle on
    /// this day.
    ///
    /// A registration that pushes the projected day time (including the
    /// return leg) past the budget still appends the stop but flips the
    /// day's over-budget flag; the driver is expected to clear the day
    /// total and keep going. The day index itself never rolls.
    pub fn register_collection(
        &mut self,
        vehicle: &Vehicle,
        day: u32,
        trip_number: u32,
        location: &Location,
        collection_time_minutes: f64,
    ) -> bool {
        if self.exceeds_daily_time(day) {
            debug!(day, location = %location.id, "day over budget, refusing registration");
            return false;
        }

        if self
            .get_visited_locations(&vehicle.id, day)
            .contains(&location.id)
        {
            warn!(
                "Location {} already visited on day {} by vehicle {}. Ignoring duplicate.",
                location.name, day, vehicle.id
            );
            return false;
        }

        let key = (vehicle.id.clone(), day, trip_number);
        if !self.collections.contains_key(&key) {
            self.total_trips += 1;
            self.collections.insert(
                key.clone(),
                CollectionData {
                    vehicle_id: vehicle.id.clone(),
                    day,
                    trip_number,
                    visited_location_ids: HashSet::new(),
                    stops: Vec::new(),
                    total_collected: 0.0,
                    total_distance: 0.0,
                    collection_timestamp: Utc::now(),
                    collection_time_minutes,
                    speed_kph: self.speed_kph,
                },
            );
        }

        let speed_kph = self.speed_kph;
        let max_daily_time = self.max_daily_time;
        let day_time = self.total_time(day);

        let collection = self.collections.get_mut(&key).expect("created above");
        let prev_coordinates = collection.stops.last().map(|stop| stop.coordinates);

        let distance_from_prev = match prev_coordinates {
            Some(prev) => geo::calculate_distance(prev, location.coordinates),
            None => {
                if geo::coordinates_match(
                    location.coordinates,
                    vehicle.depot_location,
                    COORDINATE_TOLERANCE,
                ) {
                    0.0
                } else {
                    geo::calculate_distance(vehicle.depot_location, location.coordinates)
                }
            }
        };

        let (collection_min, travel_min, depot_return_min) = geo::calculate_stop_times(
            location,
            vehicle.depot_location,
            prev_coordinates,
            collection_time_minutes,
            speed_kph,
        );

        let projected = day_time + geo::calculate_total_time(collection_min, travel_min, depot_return_min);
        if projected > max_daily_time {
            warn!(
                day,
                projected, max_daily_time, "daily time budget breached, flagging day"
            );
            self.time_exceeded.insert(day);
        }

        let cumulative_load = collection.total_collected + location.wco_amount;
        collection.stops.push(CollectionStop {
            location_id: location.id.clone(),
            location_name: location.name.clone(),
            coordinates: location.coordinates,
            amount_collected: location.wco_amount,
            cumulative_load,
            distance_from_prev,
            trip_number,
            collection_day: day,
            collection_time: (collection_min * 60.0).round() as u64,
            travel_time: (travel_min * 60.0).round() as u64,
        });
        collection.visited_location_ids.insert(location.id.clone());
        collection.total_collected += location.wco_amount;
        collection.total_distance += distance_from_prev;

        *self.total_times.entry(day).or_insert(0.0) += collection_min + travel_min;
        self.total_stops += 1;

        debug!(
            "Collecting {} (Total trips: {}, Total stops: {})",
            location.describe(),
            self.total_trips,
            self.total_stops
        );
        true
    }

    pub fn exceeds_daily_time(&self, day: u32) -> bool {
        self.time_exceeded.contains(&day)
    }

    /// Reset a day's accumulated time and drop its over-budget flag. Called
    /// by the driver after a breach; the day index is deliberately left
    /// unchanged.
    pub fn clear_total_time(&mut self, day: u32) {
        self.total_times.insert(day, 0.0);
        self.time_exceeded.remove(&day);
    }

    pub fn total_time(&self, day: u32) -> f64 {
        self.total_times.get(&day).copied().unwrap_or(0.0)
    }

    pub fn get_visited_locations(&self, vehicle_id: &str, day: u32) -> HashSet<String> {
        let mut visited = HashSet::new();
        for ((vid, d, _), collection) in &self.collections {
            if vid == vehicle_id && *d == day {
                visited.extend(collection.visited_location_ids.iter().cloned());
            }
        }
        visited
    }

    /// Concatenate every trip of (vehicle, day) in registration order.
    pub fn get_vehicle_route(&self, vehicle_id: &str, day: u32) -> VehicleRoute {
        let mut stops = Vec::new();
        let mut total_distance = 0.0;

        for ((vid, d, _), collection) in &self.collections {
            if vid != vehicle_id || *d != day {
                continue;
            }
            stops.extend(collection.stops.iter().cloned());
            total_distance += collection.total_distance;
        }

        let total_collected = stops.iter().map(|s| s.amount_collected).sum();
        VehicleRoute {
            vehicle_id: vehicle_id.to_string(),
            stops,
            total_distance,
            total_collected,
            speed_kph: self.speed_kph,
        }
    }

    pub fn collections(&self) -> impl Iterator<Item = (&(String, u32, u32), &CollectionData)> {
        self.collections.iter()
    }

    /// Distinct days with at least one registered collection, ascending.
    pub fn days(&self) -> Vec<u32> {
        let mut days: Vec<u32> = self.collections.keys().map(|(_, d, _)| *d).collect();
        days.sort_unstable();
        days.dedup();
        days
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::location::Location;

    fn vehicle() -> Vehicle {
        Vehicle::new("truck_1", 100.0, (0.0, 0.0))
    }

    fn location(id: &str, coords: Coordinates, wco: f64) -> Location {
        Location {
            id: id.to_string(),
            name: format!("loc {id}"),
            coordinates: coords,
            wco_amount: wco,
            disposal_schedule: 1,
            distance_from_depot: 0.0,
        }
    }

    #[test]
    fn cumulative_load_is_prefix_sum() {
        let mut ledger = TripLedger::new(30.0, 420.0);
        let v = vehicle();
        assert!(ledger.register_collection(&v, 1, 1, &location("a", (0.0, 0.01), 20.0), 15.0));
        assert!(ledger.register_collection(&v, 1, 1, &location("b", (0.01, 0.0), 30.0), 15.0));

        let route = ledger.get_vehicle_route("truck_1", 1);
        assert_eq!(route.stops.len(), 2);
        assert_eq!(route.stops[0].cumulative_load, 20.0);
        assert_eq!(route.stops[1].cumulative_load, 50.0);
        assert_eq!(route.total_collected, 50.0);
    }

    #[test]
    fn duplicate_registration_is_refused_and_counters_unchanged() {
        let mut ledger = TripLedger::new(30.0, 420.0);
        let v = vehicle();
        let a = location("a", (0.0, 0.01), 20.0);
        assert!(ledger.register_collection(&v, 1, 1, &a, 15.0));

        let trips = ledger.total_trips;
        let stops = ledger.total_stops;
        let time = ledger.total_time(1);

        // Same trip and a later trip on the same day both refuse.
        assert!(!ledger.register_collection(&v, 1, 1, &a, 15.0));
        assert!(!ledger.register_collection(&v, 1, 2, &a, 15.0));

        assert_eq!(ledger.total_trips, trips);
        assert_eq!(ledger.total_stops, stops);
        assert_eq!(ledger.total_time(1), time);
    }

    #[test]
    fn first_stop_distance_measures_from_depot() {
        let mut ledger = TripLedger::new(30.0, 420.0);
        let v = vehicle();
        let a = location("a", (0.0, 0.01), 20.0);
        ledger.register_collection(&v, 1, 1, &a, 15.0);

        let route = ledger.get_vehicle_route("truck_1", 1);
        let expected = geo::calculate_distance((0.0, 0.0), (0.0, 0.01));
        assert!((route.stops[0].distance_from_prev - expected).abs() < 1e-9);
    }

    #[test]
    fn time_breach_flags_day_but_appends_stop() {
        // 30-minute budget, 15-minute service: the second stop breaches.
        let mut ledger = TripLedger::new(30.0, 30.0);
        let v = vehicle();
        assert!(ledger.register_collection(&v, 3, 1, &location("a", (0.0, 0.001), 5.0), 15.0));
        assert!(!ledger.exceeds_daily_time(3));

        assert!(ledger.register_collection(&v, 3, 1, &location("b", (0.001, 0.0), 5.0), 15.0));
        assert!(ledger.exceeds_daily_time(3));
        assert_eq!(ledger.get_vehicle_route("truck_1", 3).stops.len(), 2);

        // Flagged day refuses further work until the driver clears it.
        assert!(!ledger.register_collection(&v, 3, 2, &location("c", (0.0, 0.002), 5.0), 15.0));
        ledger.clear_total_time(3);
        assert!(!ledger.exceeds_daily_time(3));
        assert_eq!(ledger.total_time(3), 0.0);
        assert!(ledger.register_collection(&v, 3, 2, &location("c", (0.0, 0.002), 5.0), 15.0));
    }

    #[test]
    fn depot_registration_has_zero_distance() {
        let mut ledger = TripLedger::new(30.0, 420.0);
        let v = vehicle();
        let at_depot = location("d", (0.0, 0.0), 0.0);
        ledger.register_collection(&v, 1, 1, &at_depot, 15.0);
        assert_eq!(
            ledger.get_vehicle_route("truck_1", 1).stops[0].distance_from_prev,
            0.0
        );
    }

    #[test]
    fn routes_concatenate_trips_in_order() {
        let mut ledger = TripLedger::new(30.0, 420.0);
        let v = vehicle();
        ledger.register_collection(&v, 1, 1, &location("a", (0.0, 0.01), 10.0), 15.0);
        ledger.register_collection(&v, 1, 2, &location("b", (0.01, 0.0), 10.0), 15.0);

        let route = ledger.get_vehicle_route("truck_1", 1);
        assert_eq!(route.stops[0].trip_number, 1);
        assert_eq!(route.stops[1].trip_number, 2);
        assert_eq!(ledger.total_trips, 2);

        let visited = ledger.get_visited_locations("truck_1", 1);
        assert!(visited.contains("a") && visited.contains("b"));
    }
}
