use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::location::Coordinates;

/// One stop in an emitted route, including the synthetic depot stops that
/// open and close each trip.
#[derive(Debug, Clone, Serialize)]
pub struct StopInfo {
    pub name: String,
    pub location_id: String,
    pub coordinates: Coordinates,
    pub wco_amount: f64,
    pub trip_number: u32,
    pub cumulative_load: f64,
    pub remaining_capacity: f64,
    pub distance_from_depot: f64,
    pub distance_from_prev: f64,
    pub vehicle_capacity: f64,
    pub sequence_number: i64,
    pub collection_day: u32,
    /// Seconds.
    pub collection_time: u64,
    /// Seconds.
    pub travel_time: u64,
}

/// Road-network geometry for one leg, filled in by the rendering
/// collaborator when available.
#[derive(Debug, Clone, Serialize)]
pub struct RoutePathInfo {
    pub from_coords: Coordinates,
    pub to_coords: Coordinates,
    pub path: Vec<Coordinates>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VehicleRouteInfo {
    pub vehicle_id: String,
    pub capacity: f64,
    pub total_stops: usize,
    pub total_trips: u32,
    pub total_distance: f64,
    pub total_collected: f64,
    pub efficiency: f64,
    pub stops: Vec<StopInfo>,
    pub collection_day: u32,
    pub road_paths: Vec<RoutePathInfo>,
    pub total_collection_time: u64,
    pub total_travel_time: u64,
}

/// Aggregate for one trip round across the vehicles that drove it.
#[derive(Debug, Clone, Serialize)]
pub struct TripAnalysisResult {
    pub trip_number: u32,
    pub total_locations: usize,
    pub total_vehicles: usize,
    pub total_distance: f64,
    pub total_collected: f64,
    pub total_collection_time: u64,
    pub total_travel_time: u64,
    pub total_stops: usize,
    pub vehicle_routes: Vec<VehicleRouteInfo>,
}

/// Aggregate for one collection day of one schedule.
#[derive(Debug, Clone, Serialize)]
pub struct RouteAnalysisResult {
    pub schedule_id: String,
    pub schedule_name: String,
    pub date_generated: DateTime<Utc>,
    pub total_locations: usize,
    pub total_vehicles: usize,
    pub total_distance: f64,
    pub total_collected: f64,
    pub total_collection_time: u64,
    pub total_travel_time: u64,
    pub total_trips: usize,
    pub total_stops: usize,
    pub collection_day: u32,
    pub trips: Vec<TripAnalysisResult>,
    /// Grouping key shared by every day result of the same schedule.
    pub base_schedule_id: String,
    pub base_schedule_day: u32,
}

/// A location the pipeline could not place on any route.
#[derive(Debug, Clone, Serialize)]
pub struct MissingLocation {
    pub location_id: String,
    pub name: String,
    pub wco_amount: f64,
    pub distance_from_depot: f64,
}

/// Per-schedule processing outcome. Infeasible locations land here instead
/// of failing the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleReport {
    pub schedule_id: String,
    pub schedule_name: String,
    pub total_locations: usize,
    pub processed: usize,
    pub missing: Vec<MissingLocation>,
    pub total_missed_wco: f64,
}
