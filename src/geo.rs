use crate::domain::location::{Coordinates, Location};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometers between two (lat, lon) pairs in degrees.
pub fn calculate_distance(a: Coordinates, b: Coordinates) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Minutes spent driving `distance_km` at `speed_kph`.
pub fn estimate_travel_time(distance_km: f64, speed_kph: f64) -> f64 {
    distance_km / speed_kph * 60.0
}

/// Minutes spent servicing one establishment. The flat per-stop time is
/// authoritative; the volume-scaled estimate survives behind the
/// `volume_scaled` flag for configs that still want it.
pub fn estimate_collection_time(
    location: &Location,
    collection_time_minutes: f64,
    volume_scaled: bool,
) -> f64 {
    if volume_scaled {
        let base_time = 3.0 + (location.wco_amount / 100.0) * 4.0;
        return base_time.min(collection_time_minutes);
    }
    collection_time_minutes
}

/// (collection, travel, depot-return) minutes for servicing `location`.
/// Travel is from `prev` when the vehicle is mid-route, otherwise from the
/// depot.
pub fn calculate_stop_times(
    location: &Location,
    depot_location: Coordinates,
    prev_location: Option<Coordinates>,
    collection_time_minutes: f64,
    speed_kph: f64,
) -> (f64, f64, f64) {
    let origin = prev_location.unwrap_or(depot_location);
    let travel = estimate_travel_time(calculate_distance(origin, location.coordinates), speed_kph);
    let depot_return = estimate_travel_time(
        calculate_distance(location.coordinates, depot_location),
        speed_kph,
    );
    (collection_time_minutes, travel, depot_return)
}

pub fn calculate_total_time(collection: f64, travel: f64, depot_return: f64) -> f64 {
    collection + travel + depot_return
}

/// Coordinate equality within `tolerance` on both axes.
pub fn coordinates_match(a: Coordinates, b: Coordinates, tolerance: f64) -> bool {
    (a.0 - b.0).abs() < tolerance && (a.1 - b.1).abs() < tolerance
}
