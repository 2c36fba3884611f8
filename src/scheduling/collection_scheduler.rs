use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use tracing::{debug, info, warn};

use crate::clustering::{GeographicCluster, GeographicClusterer};
use crate::config::constant::COLLECTION_TIME_MINUTES;
use crate::domain::location::{Location, Vehicle};
use crate::domain::schedule::ScheduleEntry;
use crate::geo;

/// Assigns demand points to vehicles ahead of route optimization, guided by
/// capacity, projected day time, and proximity to each vehicle's last stop.
#[derive(Debug, Clone)]
pub struct CollectionScheduler {
    schedule_map: HashMap<u32, ScheduleEntry>,
    pub simulation_days: u32,
    speed_kph: f64,
    max_daily_time: f64,
    volume_scaled: bool,
}

impl CollectionScheduler {
    pub fn new(
        schedules: &[ScheduleEntry],
        speed_kph: f64,
        max_daily_time: f64,
        volume_scaled: bool,
    ) -> Self {
        let schedule_map: HashMap<u32, ScheduleEntry> = schedules
            .iter()
            .map(|s| (s.frequency, s.clone()))
            .collect();
        let max_frequency = schedule_map.keys().copied().max().unwrap_or(1);
        let simulation_days = max_frequency.min(30);
        info!(
            "Optimizing collection for {} days based on maximum frequency",
            simulation_days
        );

        CollectionScheduler {
            schedule_map,
            simulation_days,
            speed_kph,
            max_daily_time,
            volume_scaled,
        }
    }

    pub fn schedule_for_frequency(&self, frequency: u32) -> Option<&ScheduleEntry> {
        self.schedule_map.get(&frequency)
    }

    fn collection_time_for(&self, locations: &[Location]) -> f64 {
        locations
            .first()
            .and_then(|loc| self.schedule_map.get(&loc.disposal_schedule))
            .map(|s| s.collection_time_minutes)
            .unwrap_or(COLLECTION_TIME_MINUTES)
    }

    fn estimate_collection_time(&self, location: &Location, collection_time: f64) -> f64 {
        geo::estimate_collection_time(location, collection_time, self.volume_scaled)
    }

    /// Assign `locations` to vehicles for `day`. Returns one list per
    /// vehicle, in vehicle order. Locations nobody can take are left out
    /// (and logged); the caller decides whether that is a problem.
    pub fn optimize_vehicle_assignments(
        &self,
        vehicles: &[Vehicle],
        day: u32,
        locations: &[Location],
        force_assign: bool,
        use_geo_cluster: bool,
    ) -> Vec<Vec<Location>> {
        if locations.is_empty() {
            return vehicles.iter().map(|_| Vec::new()).collect();
        }

        debug!(day, locations = locations.len(), "optimizing vehicle assignments");
        let collection_time = self.collection_time_for(locations);

        let clusters = if use_geo_cluster {
            let mut clusterer = GeographicClusterer::new(collection_time, self.speed_kph);
            clusterer.volume_scaled = self.volume_scaled;
            let mut clusters = clusterer.cluster_locations(locations, true);
            clusterer.print_cluster_analysis(&clusters);

            // One vehicle cannot honor a multi-cluster split; collapse it.
            if vehicles.len() == 1 && clusters.len() > 1 {
                debug!("Single vehicle - merged {} clusters into one", clusters.len());
                clusters = vec![merge_clusters(clusters, locations)];
            }
            clusters
        } else {
            vec![single_cluster(
                locations,
                locations
                    .iter()
                    .map(|l| self.estimate_collection_time(l, collection_time))
                    .sum(),
            )]
        };

        let depot = vehicles[0].depot_location;
        let mut assignments: Vec<Vec<Location>> = vehicles.iter().map(|_| Vec::new()).collect();
        let mut vehicle_loads = vec![0.0f64; vehicles.len()];
        let mut vehicle_times = vec![0.0f64; vehicles.len()];
        let mut visited: HashSet<String> = HashSet::new();
        let mut unassigned: Vec<Location> = Vec::new();

        for cluster in &clusters {
            // Near-depot members anchor each vehicle's route; wco and the
            // id tie-breaker keep the order deterministic.
            let sorted_members: Vec<&Location> = cluster
                .locations
                .iter()
                .sorted_by(|a, b| {
                    geo::calculate_distance(a.coordinates, depot)
                        .total_cmp(&geo::calculate_distance(b.coordinates, depot))
                        .then(b.wco_amount.total_cmp(&a.wco_amount))
                        .then(
                            self.estimate_collection_time(a, collection_time)
                                .total_cmp(&self.estimate_collection_time(b, collection_time)),
                        )
                        .then(a.id.cmp(&b.id))
                })
                .collect();

            for location in sorted_members {
                if visited.contains(&location.id) {
                    continue;
                }

                let mut best_vehicle: Option<usize> = None;
                let mut best_score = f64::NEG_INFINITY;

                for (v_idx, vehicle) in vehicles.iter().enumerate() {
                    let remaining = vehicle.remaining_capacity(vehicle_loads[v_idx]);
                    if location.wco_amount > remaining {
                        continue;
                    }

                    let prev = assignments[v_idx].last().map(|l| l.coordinates);
                    let (c_time, travel_time, depot_return) = geo::calculate_stop_times(
                        location,
                        vehicle.depot_location,
                        prev,
                        collection_time,
                        self.speed_kph,
                    );
                    let total_time = vehicle_times[v_idx]
                        + geo::calculate_total_time(c_time, travel_time, depot_return);

                    // The ledger re-validates time against the optimized
                    // route; this guard only steers the first pass.
                    if total_time > self.max_daily_time {
                        debug!("Vehicle {} reached daily time limit", vehicle.id);
                        continue;
                    }

                    let distance_km = geo::calculate_distance(
                        prev.unwrap_or(vehicle.depot_location),
                        location.coordinates,
                    );
                    let distance_factor = 1.0 / (1.0 + distance_km);
                    let capacity_ratio = location.wco_amount / remaining;
                    let time_ratio = total_time / self.max_daily_time;
                    let traffic_factor = 1.0 / (1.0 + travel_time / 60.0);

                    let score = distance_factor * 0.5
                        + capacity_ratio * 0.2
                        + (1.0 - time_ratio) * 0.2
                        + traffic_factor * 0.1;

                    if score > best_score {
                        best_score = score;
                        best_vehicle = Some(v_idx);
                    }
                }

                match best_vehicle {
                    Some(v_idx) => {
                        vehicle_loads[v_idx] += location.wco_amount;
                        vehicle_times[v_idx] +=
                            self.estimate_collection_time(location, collection_time);
                        visited.insert(location.id.clone());
                        assignments[v_idx].push(location.clone());
                    }
                    None => unassigned.push(location.clone()),
                }
            }
        }

        if force_assign {
            info!(
                "Trying to assign {} remaining locations",
                unassigned.len()
            );
            unassigned.sort_by(|a, b| b.wco_amount.total_cmp(&a.wco_amount));

            let mut still_unassigned = Vec::new();
            for location in unassigned {
                if visited.contains(&location.id) {
                    continue;
                }

                let mut assigned = false;
                for (v_idx, vehicle) in vehicles.iter().enumerate() {
                    if vehicle_loads[v_idx] + location.wco_amount > vehicle.capacity {
                        continue;
                    }

                    let prev = assignments[v_idx].last().map(|l| l.coordinates);
                    let (c_time, travel_time, depot_return) = geo::calculate_stop_times(
                        &location,
                        vehicle.depot_location,
                        prev,
                        collection_time,
                        self.speed_kph,
                    );

                    vehicle_loads[v_idx] += location.wco_amount;
                    vehicle_times[v_idx] +=
                        geo::calculate_total_time(c_time, travel_time, depot_return);
                    visited.insert(location.id.clone());
                    info!("Force assigned {} to Vehicle {}", location.name, vehicle.id);
                    assignments[v_idx].push(location.clone());
                    assigned = true;
                    break;
                }

                if !assigned {
                    still_unassigned.push(location);
                }
            }
            unassigned = still_unassigned;
        }

        if !unassigned.is_empty() {
            warn!("{} locations could not be assigned:", unassigned.len());
            for loc in &unassigned {
                warn!("- {}: {}L", loc.name, loc.wco_amount);
            }
        }

        if assignments.iter().any(|a| !a.is_empty()) {
            debug!("Assignments for day {}:", day);
            for (v_idx, vehicle_locs) in assignments.iter().enumerate() {
                if !vehicle_locs.is_empty() {
                    debug!(
                        "Vehicle {}: {} locations, total load: {:.1}L",
                        vehicles[v_idx].id,
                        vehicle_locs.len(),
                        vehicle_loads[v_idx]
                    );
                }
            }
        }

        assignments
    }
}

fn merge_clusters(clusters: Vec<GeographicCluster>, locations: &[Location]) -> GeographicCluster {
    let center_lat = locations.iter().map(|l| l.coordinates.0).sum::<f64>() / locations.len() as f64;
    let center_lon = locations.iter().map(|l| l.coordinates.1).sum::<f64>() / locations.len() as f64;
    GeographicCluster {
        id: 'A',
        locations: clusters
            .iter()
            .flat_map(|c| c.locations.iter().cloned())
            .collect(),
        total_wco: clusters.iter().map(|c| c.total_wco).sum(),
        center_lat,
        center_lon,
        total_time: clusters.iter().map(|c| c.total_time).sum(),
    }
}

fn single_cluster(locations: &[Location], total_time: f64) -> GeographicCluster {
    let center_lat = locations.iter().map(|l| l.coordinates.0).sum::<f64>() / locations.len() as f64;
    let center_lon = locations.iter().map(|l| l.coordinates.1).sum::<f64>() / locations.len() as f64;
    GeographicCluster {
        id: 'A',
        locations: locations.to_vec(),
        total_wco: locations.iter().map(|l| l.wco_amount).sum(),
        center_lat,
        center_lon,
        total_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(id: &str, coords: (f64, f64), wco: f64, frequency: u32) -> Location {
        Location {
            id: id.to_string(),
            name: format!("loc {id}"),
            coordinates: coords,
            wco_amount: wco,
            disposal_schedule: frequency,
            distance_from_depot: 0.0,
        }
    }

    fn scheduler(max_daily_time: f64) -> CollectionScheduler {
        let schedule = ScheduleEntry::new("weekly", "Weekly", 7);
        CollectionScheduler::new(&[schedule], 30.0, max_daily_time, false)
    }

    #[test]
    fn empty_input_yields_empty_per_vehicle_lists() {
        let vehicles = vec![
            Vehicle::new("v1", 100.0, (0.0, 0.0)),
            Vehicle::new("v2", 100.0, (0.0, 0.0)),
        ];
        let assignments =
            scheduler(420.0).optimize_vehicle_assignments(&vehicles, 7, &[], false, true);
        assert_eq!(assignments.len(), 2);
        assert!(assignments.iter().all(|a| a.is_empty()));
    }

    #[test]
    fn capacity_infeasible_location_stays_unassigned() {
        let vehicles = vec![Vehicle::new("v1", 50.0, (0.0, 0.0))];
        let locations = vec![
            location("big", (0.0, 0.01), 500.0, 7),
            location("small", (0.01, 0.0), 20.0, 7),
        ];
        let assignments =
            scheduler(420.0).optimize_vehicle_assignments(&vehicles, 7, &locations, false, true);
        let assigned: Vec<&str> = assignments[0].iter().map(|l| l.id.as_str()).collect();
        assert_eq!(assigned, vec!["small"]);
    }

    #[test]
    fn force_assign_places_remaining_on_first_fitting_vehicle() {
        let vehicles = vec![
            Vehicle::new("v1", 200.0, (0.0, 0.0)),
            Vehicle::new("v2", 200.0, (0.0, 0.0)),
        ];
        // A tiny daily budget knocks everything out of the scored pass.
        let sched = scheduler(1.0);
        let locations = vec![
            location("a", (0.0, 0.01), 30.0, 7),
            location("b", (0.01, 0.0), 40.0, 7),
            location("c", (0.01, 0.01), 50.0, 7),
        ];

        let without_force =
            sched.optimize_vehicle_assignments(&vehicles, 7, &locations, false, true);
        assert!(without_force.iter().all(|a| a.is_empty()));

        let with_force = sched.optimize_vehicle_assignments(&vehicles, 7, &locations, true, true);
        let assigned: usize = with_force.iter().map(|a| a.len()).sum();
        assert_eq!(assigned, 3);
        // First vehicle fits all three, so it takes all three.
        assert_eq!(with_force[0].len(), 3);
    }

    #[test]
    fn assignment_is_deterministic() {
        let vehicles = vec![
            Vehicle::new("v1", 100.0, (0.0, 0.0)),
            Vehicle::new("v2", 100.0, (0.0, 0.0)),
        ];
        let locations: Vec<Location> = (0..8)
            .map(|i| {
                location(
                    &format!("l{i}"),
                    (0.01 * i as f64, 0.02 * (i % 3) as f64),
                    20.0,
                    7,
                )
            })
            .collect();

        let sched = scheduler(420.0);
        let first = sched.optimize_vehicle_assignments(&vehicles, 7, &locations, false, true);
        let second = sched.optimize_vehicle_assignments(&vehicles, 7, &locations, false, true);
        for (a, b) in first.iter().zip(second.iter()) {
            let ids_a: Vec<&str> = a.iter().map(|l| l.id.as_str()).collect();
            let ids_b: Vec<&str> = b.iter().map(|l| l.id.as_str()).collect();
            assert_eq!(ids_a, ids_b);
        }
    }

    #[test]
    fn every_location_assigned_at_most_once() {
        let vehicles = vec![
            Vehicle::new("v1", 100.0, (0.0, 0.0)),
            Vehicle::new("v2", 100.0, (0.0, 0.0)),
        ];
        let locations: Vec<Location> = (0..10)
            .map(|i| location(&format!("l{i}"), (0.005 * i as f64, 0.0), 15.0, 7))
            .collect();

        let assignments =
            scheduler(420.0).optimize_vehicle_assignments(&vehicles, 7, &locations, false, true);
        let mut seen = HashSet::new();
        for route in &assignments {
            for loc in route {
                assert!(seen.insert(loc.id.clone()), "duplicate assignment {}", loc.id);
            }
        }
    }
}
