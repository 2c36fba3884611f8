use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Duration;

use chrono::Utc;
use colored::Colorize;
use tracing::{debug, info, warn};

use crate::config::constant::SOLVER_TIME_LIMIT_SECS;
use crate::config::SolveConfig;
use crate::domain::analysis::{
    MissingLocation, RouteAnalysisResult, ScheduleReport, StopInfo, TripAnalysisResult,
    VehicleRouteInfo,
};
use crate::domain::location::{Location, RouteConstraints, Vehicle};
use crate::domain::registry::LocationRegistry;
use crate::domain::schedule::ScheduleEntry;
use crate::error::RoutingError;
use crate::geo;
use crate::ledger::{TripLedger, VehicleRoute};
use crate::scheduling::CollectionScheduler;
use crate::solvers::{SolverKind, SolverParams, SolverRoute};

/// At or below this many remaining locations the scheduler force-assigns.
const MIN_FORCE_THRESHOLD: usize = 5;

/// Everything one `process` call produces: per-day analyses, per-schedule
/// infeasibility reports, and the raw ledger behind them.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub results: Vec<RouteAnalysisResult>,
    pub reports: Vec<ScheduleReport>,
    pub ledger: TripLedger,
}

/// Drives the full routing pipeline: for every schedule, loop
/// scheduler -> solver -> ledger until each location is collected or no
/// further progress is possible, then emit the day analyses.
#[derive(Debug)]
pub struct Cvrp {
    vehicles: Vec<Vehicle>,
    solver: SolverKind,
    constraints: RouteConstraints,
    max_daily_time: f64,
    speed_kph: f64,
    solver_time_limit: Duration,
    volume_scaled_stop_time: bool,
    use_geo_cluster: bool,
}

impl Cvrp {
    pub fn from_config(settings: &SolveConfig) -> Result<Self, RoutingError> {
        let solver = SolverKind::from_id(&settings.solver)?;
        if settings.vehicles.is_empty() {
            return Err(RoutingError::Config("no vehicles configured".into()));
        }
        let vehicles = settings
            .vehicles
            .iter()
            .map(|v| Vehicle::new(&v.id, v.capacity, settings.depot_location))
            .collect();

        Ok(Cvrp {
            vehicles,
            solver,
            constraints: settings.constraints.clone(),
            max_daily_time: settings.max_daily_time,
            speed_kph: settings.average_speed_kph,
            solver_time_limit: Duration::from_secs(SOLVER_TIME_LIMIT_SECS),
            volume_scaled_stop_time: settings.volume_scaled_stop_time,
            use_geo_cluster: true,
        })
    }

    pub fn new(vehicles: Vec<Vehicle>, solver: SolverKind, constraints: RouteConstraints) -> Self {
        Cvrp {
            vehicles,
            solver,
            constraints,
            max_daily_time: crate::config::constant::MAX_DAILY_TIME,
            speed_kph: crate::config::constant::AVERAGE_SPEED_KPH,
            solver_time_limit: Duration::from_secs(SOLVER_TIME_LIMIT_SECS),
            volume_scaled_stop_time: false,
            use_geo_cluster: true,
        }
    }

    pub fn set_max_daily_time(&mut self, minutes: f64) {
        self.max_daily_time = minutes;
    }

    pub fn set_speed_kph(&mut self, speed_kph: f64) {
        self.speed_kph = speed_kph;
    }

    pub fn set_solver_time_limit(&mut self, limit: Duration) {
        self.solver_time_limit = limit;
    }

    /// Turn off the clustering pass (the `--disable-scheduling` path). The
    /// scheduler then treats each schedule's locations as one flat group.
    pub fn set_use_geo_cluster(&mut self, enabled: bool) {
        self.use_geo_cluster = enabled;
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    fn depot_location(&self) -> (f64, f64) {
        self.vehicles[0].depot_location
    }

    /// Depot distances are filled in once, before any schedule runs.
    fn initialize_registry(&self, locations: &mut LocationRegistry) {
        let depot = self.depot_location();
        for location in locations.iter_mut() {
            location.distance_from_depot = geo::calculate_distance(depot, location.coordinates);
        }
    }

    /// Process every schedule against the registry. Infeasible locations
    /// never abort the run; they surface in the per-schedule reports.
    pub fn process(
        &self,
        schedule_entries: &[ScheduleEntry],
        locations: &mut LocationRegistry,
    ) -> PipelineOutcome {
        self.initialize_registry(locations);

        let mut ledger = TripLedger::new(self.speed_kph, self.max_daily_time);
        let scheduler = CollectionScheduler::new(
            schedule_entries,
            self.speed_kph,
            self.max_daily_time,
            self.volume_scaled_stop_time,
        );

        let mut results = Vec::new();
        let mut reports = Vec::new();

        for schedule in schedule_entries {
            info!(
                "Processing schedule: {} (Frequency: {} days)",
                schedule.name, schedule.frequency
            );

            let schedule_locations: Vec<Location> = locations
                .iter()
                .filter(|l| l.disposal_schedule == schedule.frequency)
                .cloned()
                .collect();
            if schedule_locations.is_empty() {
                info!("No locations found for schedule {}", schedule.name);
                continue;
            }
            info!(
                "Found {} locations for {}",
                schedule_locations.len(),
                schedule.name
            );

            let day = schedule.frequency;
            let mut remaining = schedule_locations.clone();
            let mut processed: HashSet<String> = HashSet::new();
            let mut trip_number: u32 = 0;
            let mut days_used: BTreeSet<u32> = BTreeSet::new();

            while !remaining.is_empty() {
                let force_assign = remaining.len() <= MIN_FORCE_THRESHOLD;
                if force_assign {
                    debug!("Force reassignment of all remaining locations to vehicles:");
                    for location in &remaining {
                        debug!("  - {}", location.describe());
                    }
                }

                let initial = scheduler.optimize_vehicle_assignments(
                    &self.vehicles,
                    day,
                    &remaining,
                    force_assign,
                    self.use_geo_cluster,
                );
                let total_initial: usize = initial.iter().map(|a| a.len()).sum();
                if total_initial == 0 {
                    // Nothing placeable under the current configuration.
                    break;
                }

                let mut vehicle_routes =
                    self.optimize_routes(&initial, schedule.collection_time_minutes);
                trip_number += 1;

                self.lazy_patch(&initial, &mut vehicle_routes, remaining.len(), total_initial);

                let mut registered_this_round = 0usize;
                for (v_idx, route) in vehicle_routes.iter().enumerate() {
                    let Some(vehicle) = self.vehicles.get(v_idx) else {
                        break;
                    };
                    for slot in route {
                        let Some(location) = slot else { continue };
                        let registered = ledger.register_collection(
                            vehicle,
                            day,
                            trip_number,
                            location,
                            schedule.collection_time_minutes,
                        );
                        if registered {
                            processed.insert(location.id.clone());
                            days_used.insert(day);
                            registered_this_round += 1;
                        }
                    }
                }

                remaining.retain(|loc| !processed.contains(&loc.id));

                if ledger.exceeds_daily_time(day) {
                    warn!("Daily time exceeded for day {}. Clearing the total time.", day);
                    ledger.clear_total_time(day);
                }

                if registered_this_round == 0 {
                    warn!(
                        "No progress on schedule {}; leaving {} locations unassigned",
                        schedule.id,
                        remaining.len()
                    );
                    break;
                }
            }

            let report =
                self.build_schedule_report(schedule, &schedule_locations, &processed, day);
            reports.push(report);

            results.extend(self.generate_analysis(schedule, &ledger, locations, &days_used));
        }

        PipelineOutcome {
            results,
            reports,
            ledger,
        }
    }

    /// Run the configured solver over the scheduler's assignment. The
    /// constrained solver sees the whole flattened problem so it may
    /// rebalance across vehicles; the others run per vehicle to preserve
    /// the scheduler's allocation.
    fn optimize_routes(&self, assignments: &[Vec<Location>], stop_time: f64) -> Vec<SolverRoute> {
        let params = SolverParams {
            speed_kph: self.speed_kph,
            stop_time_minutes: stop_time,
            max_daily_time: self.max_daily_time,
            time_limit: self.solver_time_limit,
        };
        let solver = self.solver.build(&params);
        info!("Using solver: {}", solver.name());

        if self.solver == SolverKind::Constrained {
            let flattened: Vec<Location> = assignments.iter().flatten().cloned().collect();
            return solver.solve(&flattened, &self.vehicles, &self.constraints);
        }

        let mut optimized = Vec::with_capacity(assignments.len());
        for (v_idx, locs) in assignments.iter().enumerate() {
            if locs.is_empty() {
                optimized.push(Vec::new());
                continue;
            }
            let routes = solver.solve(
                locs,
                std::slice::from_ref(&self.vehicles[v_idx]),
                &self.constraints,
            );
            optimized.push(routes.into_iter().next().unwrap_or_default());
        }
        optimized
    }

    /// When the solver dropped exactly one location from a full-coverage
    /// assignment, splice it back onto the nearest-depot vehicle, at the
    /// position closest to one of its existing stops. Skipped when the
    /// receiving vehicle has no capacity left for it.
    fn lazy_patch(
        &self,
        initial: &[Vec<Location>],
        vehicle_routes: &mut [SolverRoute],
        remaining_len: usize,
        total_initial: usize,
    ) {
        let out_ids: HashSet<String> = vehicle_routes
            .iter()
            .flatten()
            .flatten()
            .map(|l| l.id.clone())
            .collect();

        if total_initial == 0
            || remaining_len != total_initial
            || total_initial != out_ids.len() + 1
        {
            return;
        }

        let Some(missing) = initial
            .iter()
            .flatten()
            .find(|loc| !out_ids.contains(&loc.id))
        else {
            debug!("No missing location found in initial assignments. Skipping lazy patching.");
            return;
        };

        let nearest_idx = (0..self.vehicles.len())
            .min_by(|&a, &b| {
                geo::calculate_distance(self.vehicles[a].depot_location, missing.coordinates)
                    .total_cmp(&geo::calculate_distance(
                        self.vehicles[b].depot_location,
                        missing.coordinates,
                    ))
            })
            .expect("at least one vehicle");

        let vehicle = &self.vehicles[nearest_idx];
        let route_load: f64 = vehicle_routes[nearest_idx]
            .iter()
            .flatten()
            .map(|l| l.wco_amount)
            .sum();
        if route_load + missing.wco_amount > vehicle.capacity {
            warn!(
                "Adding location {} exceeds vehicle capacity. Skipping lazy patching.",
                missing.describe()
            );
            return;
        }

        info!("Lazy patching: adding {} to vehicle {}", missing.describe(), vehicle.id);
        let depot = vehicle.depot_location;
        let route = &mut vehicle_routes[nearest_idx];
        if route.is_empty() {
            route.push(None);
            route.push(Some(missing.clone()));
            route.push(None);
            return;
        }

        let insert_index = route
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let da = geo::calculate_distance(
                    a.as_ref().map(|l| l.coordinates).unwrap_or(depot),
                    missing.coordinates,
                );
                let db = geo::calculate_distance(
                    b.as_ref().map(|l| l.coordinates).unwrap_or(depot),
                    missing.coordinates,
                );
                da.total_cmp(&db)
            })
            .map(|(i, _)| i)
            .expect("non-empty route");

        info!(
            "Inserting {} at index {} for vehicle {}",
            missing.describe(),
            insert_index,
            vehicle.id
        );
        route.insert(insert_index, Some(missing.clone()));
    }

    fn build_schedule_report(
        &self,
        schedule: &ScheduleEntry,
        schedule_locations: &[Location],
        processed: &HashSet<String>,
        day: u32,
    ) -> ScheduleReport {
        let missing: Vec<MissingLocation> = schedule_locations
            .iter()
            .filter(|loc| !processed.contains(&loc.id))
            .map(|loc| MissingLocation {
                location_id: loc.id.clone(),
                name: loc.name.clone(),
                wco_amount: loc.wco_amount,
                distance_from_depot: loc.distance_from_depot,
            })
            .collect();
        let total_missed_wco: f64 = missing.iter().map(|m| m.wco_amount).sum();

        info!("Location Processing Report for {}:", schedule.name);
        info!("Total locations: {}", schedule_locations.len());
        info!(
            "Successfully processed: {} on day {}",
            processed.len(),
            day
        );
        info!("Missing: {}", missing.len());

        if !missing.is_empty() {
            let schedule_total: f64 = schedule_locations.iter().map(|l| l.wco_amount).sum();
            warn!("{} locations were not processed:", missing.len());
            for m in &missing {
                warn!(
                    "- {}: {}L WCO, Distance from depot: {:.2}km",
                    m.name, m.wco_amount, m.distance_from_depot
                );
            }
            warn!(
                "Total missed WCO: {}L ({:.1}% of schedule total)",
                total_missed_wco,
                total_missed_wco / schedule_total * 100.0
            );
            warn!("Possible reasons:");
            warn!("1. Vehicle capacity constraints");
            warn!(
                "2. Time budget constraints ({:.1}-hour workday)",
                self.max_daily_time / 60.0
            );
            warn!("3. Travel time constraints");
        }

        ScheduleReport {
            schedule_id: schedule.id.clone(),
            schedule_name: schedule.name.clone(),
            total_locations: schedule_locations.len(),
            processed: processed.len(),
            missing,
            total_missed_wco,
        }
    }

    /// Build per-day analyses for one schedule: group stops by trip,
    /// sandwich each trip between synthetic depot stops, and total
    /// everything up.
    fn generate_analysis(
        &self,
        schedule: &ScheduleEntry,
        ledger: &TripLedger,
        registry: &LocationRegistry,
        days_used: &BTreeSet<u32>,
    ) -> Vec<RouteAnalysisResult> {
        let base_day = schedule.frequency;
        let mut results = Vec::new();

        for &day in days_used {
            let mut trip_groups: BTreeMap<u32, Vec<VehicleRouteInfo>> = BTreeMap::new();

            for vehicle in &self.vehicles {
                let route = ledger.get_vehicle_route(&vehicle.id, day);
                if route.stops.is_empty() {
                    continue;
                }
                debug!(
                    "There are {} stops for vehicle {} on day {}",
                    route.stops.len(),
                    vehicle.id,
                    day
                );

                let trip_numbers: BTreeSet<u32> =
                    route.stops.iter().map(|s| s.trip_number).collect();
                for trip in trip_numbers {
                    let info =
                        self.build_vehicle_route_info(vehicle, &route, day, trip, registry);
                    trip_groups.entry(trip).or_default().push(info);
                }
            }

            let trip_results: Vec<TripAnalysisResult> = trip_groups
                .into_iter()
                .map(|(trip_number, vehicle_routes)| TripAnalysisResult {
                    trip_number,
                    total_locations: vehicle_routes.iter().map(|vr| vr.stops.len()).sum(),
                    total_vehicles: vehicle_routes.len(),
                    total_distance: vehicle_routes.iter().map(|vr| vr.total_distance).sum(),
                    total_collected: vehicle_routes.iter().map(|vr| vr.total_collected).sum(),
                    total_collection_time: vehicle_routes
                        .iter()
                        .map(|vr| vr.total_collection_time)
                        .sum(),
                    total_travel_time: vehicle_routes
                        .iter()
                        .map(|vr| vr.total_travel_time)
                        .sum(),
                    total_stops: vehicle_routes.iter().map(|vr| vr.total_stops).sum(),
                    vehicle_routes,
                })
                .collect();

            let day_result = RouteAnalysisResult {
                schedule_id: format!("{}_day{}", schedule.id, day),
                schedule_name: format!("{} (Day {})", schedule.name, day),
                date_generated: Utc::now(),
                total_locations: trip_results.iter().map(|t| t.total_locations).sum(),
                total_vehicles: self.vehicles.len(),
                total_distance: trip_results.iter().map(|t| t.total_distance).sum(),
                total_collected: trip_results.iter().map(|t| t.total_collected).sum(),
                total_collection_time: trip_results
                    .iter()
                    .map(|t| t.total_collection_time)
                    .sum(),
                total_travel_time: trip_results.iter().map(|t| t.total_travel_time).sum(),
                total_trips: trip_results.len(),
                total_stops: trip_results.iter().map(|t| t.total_stops).sum(),
                collection_day: day,
                trips: trip_results,
                base_schedule_id: schedule.id.clone(),
                base_schedule_day: base_day,
            };
            results.push(day_result);
        }

        results
    }

    fn build_vehicle_route_info(
        &self,
        vehicle: &Vehicle,
        route: &VehicleRoute,
        day: u32,
        trip_number: u32,
        registry: &LocationRegistry,
    ) -> VehicleRouteInfo {
        let mut stops_data: Vec<StopInfo> = Vec::new();
        let mut should_add_depot_start = true;

        for (i, stop) in route.stops.iter().enumerate() {
            if stop.trip_number != trip_number {
                continue;
            }

            if should_add_depot_start {
                stops_data.push(StopInfo {
                    name: "Depot".to_string(),
                    location_id: format!("depot_start_{}_trip_{}", vehicle.id, stop.trip_number),
                    coordinates: vehicle.depot_location,
                    wco_amount: 0.0,
                    trip_number: stop.trip_number,
                    cumulative_load: 0.0,
                    remaining_capacity: vehicle.capacity,
                    distance_from_depot: 0.0,
                    distance_from_prev: 0.0,
                    vehicle_capacity: vehicle.capacity,
                    sequence_number: i as i64 - 1,
                    collection_day: day,
                    collection_time: 0,
                    travel_time: 0,
                });
                should_add_depot_start = false;
            }

            let distance_from_depot = registry
                .get_by_id(&stop.location_id)
                .map(|l| l.distance_from_depot)
                .unwrap_or_default();
            let remaining_capacity = vehicle.capacity - stop.cumulative_load;

            stops_data.push(StopInfo {
                name: stop.location_name.clone(),
                location_id: stop.location_id.clone(),
                coordinates: stop.coordinates,
                wco_amount: stop.amount_collected,
                trip_number: stop.trip_number,
                cumulative_load: stop.cumulative_load,
                remaining_capacity,
                distance_from_depot,
                distance_from_prev: stop.distance_from_prev,
                vehicle_capacity: vehicle.capacity,
                sequence_number: i as i64,
                collection_day: day,
                collection_time: stop.collection_time,
                travel_time: stop.travel_time,
            });

            let is_last_of_trip = route
                .stops
                .get(i + 1)
                .map(|next| next.trip_number != stop.trip_number)
                .unwrap_or(true);
            if is_last_of_trip {
                let depot_end_distance =
                    geo::calculate_distance(stop.coordinates, vehicle.depot_location);
                stops_data.push(StopInfo {
                    name: "Depot".to_string(),
                    location_id: format!("depot_end_{}_trip_{}", vehicle.id, stop.trip_number),
                    coordinates: vehicle.depot_location,
                    wco_amount: 0.0,
                    trip_number: stop.trip_number,
                    cumulative_load: stop.cumulative_load,
                    remaining_capacity,
                    distance_from_depot: 0.0,
                    distance_from_prev: depot_end_distance,
                    vehicle_capacity: vehicle.capacity,
                    sequence_number: i as i64,
                    collection_day: day,
                    collection_time: 0,
                    travel_time: (geo::estimate_travel_time(depot_end_distance, route.speed_kph)
                        * 60.0)
                        .round() as u64,
                });
                should_add_depot_start = true;
            }
        }

        let total_collected: f64 = stops_data.iter().map(|s| s.wco_amount).sum();
        let total_collection_time: u64 = stops_data.iter().map(|s| s.collection_time).sum();
        let total_travel_time: u64 = stops_data.iter().map(|s| s.travel_time).sum();
        let total_distance: f64 = stops_data.iter().map(|s| s.distance_from_prev).sum();
        let total_stops = stops_data.len();

        VehicleRouteInfo {
            vehicle_id: vehicle.id.clone(),
            capacity: vehicle.capacity,
            total_stops,
            total_trips: 1,
            total_distance,
            total_collected,
            efficiency: if vehicle.capacity > 0.0 {
                total_collected / vehicle.capacity
            } else {
                0.0
            },
            stops: stops_data,
            collection_day: day,
            road_paths: Vec::new(),
            total_collection_time,
            total_travel_time,
        }
    }

    /// Console summary of vehicle utilization per day, with capacity-breach
    /// warnings.
    pub fn print_daily_summaries(&self, ledger: &TripLedger) {
        println!("{}", "Daily Route Summaries:".bold());

        for day in ledger.days() {
            println!("\nDay {day} Summary:");

            for vehicle in &self.vehicles {
                let day_collections: Vec<_> = ledger
                    .collections()
                    .filter(|((vid, d, _), _)| vid == &vehicle.id && *d == day)
                    .map(|(_, c)| c)
                    .collect();
                if day_collections.is_empty() {
                    continue;
                }

                let mut trips_data: BTreeMap<u32, Vec<&crate::ledger::CollectionStop>> =
                    BTreeMap::new();
                for collection in &day_collections {
                    trips_data
                        .entry(collection.trip_number)
                        .or_default()
                        .extend(collection.stops.iter());
                }

                let total_stops: usize = day_collections.iter().map(|c| c.stops.len()).sum();
                let utilizations: Vec<String> = trips_data
                    .values()
                    .map(|stops| {
                        let collected: f64 = stops.iter().map(|s| s.amount_collected).sum();
                        format!("{:.1}%", collected / vehicle.capacity * 100.0)
                    })
                    .collect();

                println!("  Vehicle {}:", vehicle.id);
                println!("    Stops: {total_stops}");
                println!("    Trips: {}", trips_data.len());
                println!("    Trip utilization: {}", utilizations.join(" | "));

                for (trip_num, stops) in &trips_data {
                    let collected: f64 = stops.iter().map(|s| s.amount_collected).sum();
                    if collected > vehicle.capacity {
                        println!(
                            "    {}",
                            format!(
                                "WARNING: Trip {} exceeds vehicle capacity ({:.1}L > {:.1}L)",
                                trip_num, collected, vehicle.capacity
                            )
                            .red()
                        );
                        let mut cumulative = 0.0;
                        for stop in stops {
                            cumulative += stop.amount_collected;
                            println!(
                                "      - {}: {:.1}L (Cumulative: {:.1}L)",
                                stop.location_name, stop.amount_collected, cumulative
                            );
                        }
                    }
                }
            }
        }
    }
}
