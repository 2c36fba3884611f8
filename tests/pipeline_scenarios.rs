use std::collections::HashSet;
use std::time::Duration;

use wco_vrp::config::{SolveConfig, VehicleConfig};
use wco_vrp::domain::analysis::RouteAnalysisResult;
use wco_vrp::domain::location::{Location, RouteConstraints};
use wco_vrp::domain::registry::LocationRegistry;
use wco_vrp::domain::schedule::ScheduleEntry;
use wco_vrp::geo;
use wco_vrp::pipeline::Cvrp;

fn settings(solver: &str, vehicles: Vec<(&str, f64)>, max_daily_time: f64) -> SolveConfig {
    SolveConfig {
        solver: solver.to_string(),
        vehicles: vehicles
            .into_iter()
            .map(|(id, capacity)| VehicleConfig {
                id: id.to_string(),
                capacity,
            })
            .collect(),
        depot_location: (0.0, 0.0),
        constraints: RouteConstraints::default(),
        max_daily_time,
        average_speed_kph: 30.0,
        volume_scaled_stop_time: false,
        max_trips_per_day: None,
    }
}

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

/// Ids of real (non-depot) stops across all emitted results.
fn collection_stop_ids(results: &[RouteAnalysisResult]) -> Vec<String> {
    results
        .iter()
        .flat_map(|r| &r.trips)
        .flat_map(|t| &t.vehicle_routes)
        .flat_map(|vr| &vr.stops)
        .filter(|s| !s.location_id.starts_with("depot_"))
        .map(|s| s.location_id.clone())
        .collect()
}

#[test]
fn two_stop_day_totals_and_ordering() {
    let config = settings("schedule", vec![("truck_1", 100.0)], 120.0);
    let cvrp = Cvrp::from_config(&config).unwrap();

    let a = location("a", (0.0, 0.01), 20.0, 1);
    let b = location("b", (0.01, 0.0), 30.0, 1);
    let mut registry = LocationRegistry::new();
    registry.add(a.clone());
    registry.add(b.clone());

    let mut schedule = ScheduleEntry::new("s", "Daily", 1);
    schedule.collection_time_minutes = 5.0;

    let outcome = cvrp.process(&[schedule], &mut registry);
    assert_eq!(outcome.results.len(), 1);

    let day = &outcome.results[0];
    assert_eq!(day.schedule_id, "s_day1");
    assert_eq!(day.collection_day, 1);
    assert_eq!(day.base_schedule_day, 1);
    assert_eq!(day.trips.len(), 1);
    assert!((day.total_collected - 50.0).abs() < 1e-9);

    let route = &day.trips[0].vehicle_routes[0];
    assert_eq!(route.stops.len(), 4); // depot + two stops + depot
    assert!(route.stops.first().unwrap().location_id.starts_with("depot_start"));
    assert!(route.stops.last().unwrap().location_id.starts_with("depot_end"));

    let depot = (0.0, 0.0);
    let first = route.stops[1].coordinates;
    let second = route.stops[2].coordinates;
    let expected = geo::calculate_distance(depot, first)
        + geo::calculate_distance(first, second)
        + geo::calculate_distance(second, depot);
    assert!((day.total_distance - expected).abs() < 1e-6);

    // Report shows a clean run.
    assert_eq!(outcome.reports.len(), 1);
    assert!(outcome.reports[0].missing.is_empty());
}

#[test]
fn fleet_splits_load_without_overloading_any_trip() {
    let config = settings("schedule", vec![("v1", 50.0), ("v2", 50.0)], 420.0);
    let cvrp = Cvrp::from_config(&config).unwrap();

    let mut registry = LocationRegistry::new();
    for (i, coords) in [(0.0, 0.01), (0.01, 0.0), (0.01, 0.01), (0.02, 0.01)]
        .iter()
        .enumerate()
    {
        registry.add(location(&format!("l{i}"), *coords, 30.0, 7));
    }

    let schedule = ScheduleEntry::new("weekly", "Weekly", 7);
    let outcome = cvrp.process(&[schedule], &mut registry);

    assert_eq!(outcome.results.len(), 1);
    let day = &outcome.results[0];
    assert_eq!(day.collection_day, 7);

    // Every location appears exactly once across all trips.
    let mut ids = collection_stop_ids(&outcome.results);
    assert_eq!(ids.len(), 4);
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 4);

    // No single trip of any vehicle exceeds its capacity.
    for trip in &day.trips {
        for vr in &trip.vehicle_routes {
            assert!(
                vr.total_collected <= vr.capacity + 1e-9,
                "vehicle {} overloaded: {} > {}",
                vr.vehicle_id,
                vr.total_collected,
                vr.capacity
            );
        }
    }

    // The work cannot fit one trip of one vehicle.
    let vehicles_used: HashSet<&str> = day
        .trips
        .iter()
        .flat_map(|t| &t.vehicle_routes)
        .map(|vr| vr.vehicle_id.as_str())
        .collect();
    let multiple_trips = outcome.ledger.total_trips >= 2;
    assert!(vehicles_used.len() >= 2 || multiple_trips);
}

#[test]
fn tight_day_budget_rolls_and_still_collects_everything() {
    let config = settings("schedule", vec![("truck_1", 1000.0)], 30.0);
    let cvrp = Cvrp::from_config(&config).unwrap();

    let mut registry = LocationRegistry::new();
    for i in 0..10 {
        registry.add(location(
            &format!("l{i}"),
            (0.0, 0.0005 * (i + 1) as f64),
            10.0,
            3,
        ));
    }

    let schedule = ScheduleEntry::new("s3", "Every three days", 3);
    let outcome = cvrp.process(&[schedule], &mut registry);

    // Everything eventually lands, exactly once, all on day 3.
    let mut ids = collection_stop_ids(&outcome.results);
    assert_eq!(ids.len(), 10);
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 10);
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].collection_day, 3);

    // A 30-minute budget with 15-minute service caps every ledger trip at
    // two stops before the breach flag fires.
    for (_, collection) in outcome.ledger.collections() {
        assert!(
            collection.stops.len() <= 2,
            "trip {} has {} stops",
            collection.trip_number,
            collection.stops.len()
        );
    }
    assert!(outcome.reports[0].missing.is_empty());
}

#[test]
fn constrained_solver_honors_one_way_roads_through_pipeline() {
    let p = (0.004, 0.001);
    let q = (0.001, 0.004);
    let mut config = settings("ortools", vec![("truck_1", 1000.0)], 420.0);
    config.constraints = RouteConstraints {
        one_way_roads: vec![(p, q)],
    };
    let cvrp = {
        let mut cvrp = Cvrp::from_config(&config).unwrap();
        cvrp.set_solver_time_limit(Duration::from_secs(2));
        cvrp
    };

    let mut registry = LocationRegistry::new();
    registry.add(location("p", p, 10.0, 1));
    registry.add(location("q", q, 10.0, 1));
    for i in 0..4 {
        registry.add(location(
            &format!("l{i}"),
            (0.002 + 0.001 * i as f64, 0.002),
            10.0,
            1,
        ));
    }

    let schedule = ScheduleEntry::new("daily", "Daily", 1);
    let outcome = cvrp.process(&[schedule], &mut registry);

    let mut seen = 0;
    for result in &outcome.results {
        for trip in &result.trips {
            for vr in &trip.vehicle_routes {
                let real: Vec<_> = vr
                    .stops
                    .iter()
                    .filter(|s| !s.location_id.starts_with("depot_"))
                    .collect();
                seen += real.len();
                for pair in real.windows(2) {
                    assert!(
                        !(pair[0].location_id == "q" && pair[1].location_id == "p"),
                        "forbidden q -> p transition surfaced in analysis"
                    );
                }
            }
        }
    }
    assert_eq!(seen, 6);
}

#[test]
fn one_way_roads_hold_even_for_tiny_rounds() {
    // Four locations: small enough that every round is a small one, so the
    // configured solver must still be the one doing the routing.
    let p = (0.004, 0.001);
    let q = (0.001, 0.004);
    let mut config = settings("ortools", vec![("truck_1", 1000.0)], 420.0);
    config.constraints = RouteConstraints {
        one_way_roads: vec![(p, q)],
    };
    let cvrp = {
        let mut cvrp = Cvrp::from_config(&config).unwrap();
        cvrp.set_solver_time_limit(Duration::from_secs(2));
        cvrp
    };

    let mut registry = LocationRegistry::new();
    registry.add(location("p", p, 10.0, 1));
    registry.add(location("q", q, 10.0, 1));
    registry.add(location("r", (0.002, 0.002), 10.0, 1));
    registry.add(location("s", (0.003, 0.003), 10.0, 1));

    let schedule = ScheduleEntry::new("daily", "Daily", 1);
    let outcome = cvrp.process(&[schedule], &mut registry);

    let mut seen = 0;
    for result in &outcome.results {
        for trip in &result.trips {
            for vr in &trip.vehicle_routes {
                let real: Vec<_> = vr
                    .stops
                    .iter()
                    .filter(|s| !s.location_id.starts_with("depot_"))
                    .collect();
                seen += real.len();
                for pair in real.windows(2) {
                    assert!(
                        !(pair[0].location_id == "q" && pair[1].location_id == "p"),
                        "forbidden q -> p transition surfaced in a small round"
                    );
                }
            }
        }
    }
    assert_eq!(seen, 4);
}

#[test]
fn heuristic_solvers_ignore_one_way_roads() {
    // Documented behavior: only the constrained solver consults the
    // constraint set; the heuristics still route everything.
    for solver in ["greedy", "nearest"] {
        let p = (0.004, 0.001);
        let q = (0.001, 0.004);
        let mut config = settings(solver, vec![("truck_1", 1000.0)], 420.0);
        config.constraints = RouteConstraints {
            one_way_roads: vec![(p, q)],
        };
        let cvrp = Cvrp::from_config(&config).unwrap();

        let mut registry = LocationRegistry::new();
        registry.add(location("p", p, 10.0, 1));
        registry.add(location("q", q, 10.0, 1));
        for i in 0..4 {
            registry.add(location(
                &format!("l{i}"),
                (0.002 + 0.001 * i as f64, 0.002),
                10.0,
                1,
            ));
        }

        let schedule = ScheduleEntry::new("daily", "Daily", 1);
        let outcome = cvrp.process(&[schedule], &mut registry);
        let ids: HashSet<String> = collection_stop_ids(&outcome.results).into_iter().collect();
        assert_eq!(ids.len(), 6, "{solver} dropped locations");
    }
}

#[test]
fn duplicate_ids_collapse_to_one_registration() {
    let config = settings("schedule", vec![("truck_1", 100.0)], 420.0);
    let cvrp = Cvrp::from_config(&config).unwrap();

    let twin_a = location("dup", (0.0, 0.01), 20.0, 7);
    let twin_b = location("dup", (0.01, 0.0), 35.0, 7);
    let registry_input = vec![twin_a, twin_b];
    let mut registry = LocationRegistry::from_locations(registry_input);
    assert_eq!(registry.len(), 1);

    let schedule = ScheduleEntry::new("weekly", "Weekly", 7);
    let outcome = cvrp.process(&[schedule], &mut registry);

    let ids = collection_stop_ids(&outcome.results);
    assert_eq!(ids, vec!["dup".to_string()]);
    assert_eq!(outcome.ledger.total_stops, 1);
}

#[test]
fn single_location_single_vehicle_roundtrip() {
    let config = settings("schedule", vec![("truck_1", 100.0)], 420.0);
    let cvrp = Cvrp::from_config(&config).unwrap();

    let mut registry = LocationRegistry::new();
    registry.add(location("only", (0.0, 0.01), 25.0, 7));

    let schedule = ScheduleEntry::new("weekly", "Weekly", 7);
    let outcome = cvrp.process(&[schedule], &mut registry);

    assert_eq!(outcome.results.len(), 1);
    let day = &outcome.results[0];
    assert_eq!(day.trips.len(), 1);
    let route = &day.trips[0].vehicle_routes[0];
    assert_eq!(route.stops.len(), 3);
    assert!(route.stops[0].location_id.starts_with("depot_start"));
    assert_eq!(route.stops[1].location_id, "only");
    assert!(route.stops[2].location_id.starts_with("depot_end"));
}

#[test]
fn schedules_are_processed_independently() {
    let config = settings("schedule", vec![("truck_1", 500.0)], 420.0);
    let cvrp = Cvrp::from_config(&config).unwrap();

    let mut registry = LocationRegistry::new();
    registry.add(location("w1", (0.0, 0.01), 20.0, 7));
    registry.add(location("w2", (0.01, 0.0), 20.0, 7));
    registry.add(location("t1", (0.0, 0.02), 30.0, 3));

    let schedules = vec![
        ScheduleEntry::new("tri", "Every three days", 3),
        ScheduleEntry::new("weekly", "Weekly", 7),
    ];
    let outcome = cvrp.process(&schedules, &mut registry);

    assert_eq!(outcome.results.len(), 2);
    let day3 = outcome
        .results
        .iter()
        .find(|r| r.collection_day == 3)
        .unwrap();
    let day7 = outcome
        .results
        .iter()
        .find(|r| r.collection_day == 7)
        .unwrap();

    assert_eq!(day3.base_schedule_id, "tri");
    assert_eq!(day3.schedule_id, "tri_day3");
    assert_eq!(day7.base_schedule_id, "weekly");

    let day3_ids: HashSet<String> = collection_stop_ids(std::slice::from_ref(day3))
        .into_iter()
        .collect();
    let day7_ids: HashSet<String> = collection_stop_ids(std::slice::from_ref(day7))
        .into_iter()
        .collect();
    assert_eq!(day3_ids, HashSet::from(["t1".to_string()]));
    assert_eq!(
        day7_ids,
        HashSet::from(["w1".to_string(), "w2".to_string()])
    );
}

#[test]
fn constrained_solver_runs_deterministically_for_small_inputs() {
    let run = || {
        let mut config = settings("ortools", vec![("v1", 200.0), ("v2", 200.0)], 420.0);
        config.average_speed_kph = 30.0;
        let cvrp = {
            let mut cvrp = Cvrp::from_config(&config).unwrap();
            cvrp.set_solver_time_limit(Duration::from_secs(2));
            cvrp
        };
        let mut registry = LocationRegistry::new();
        for i in 0..7 {
            registry.add(location(
                &format!("l{i}"),
                (0.001 * (i % 3) as f64, 0.002 * (i / 3) as f64 + 0.001),
                15.0,
                1,
            ));
        }
        let schedule = ScheduleEntry::new("daily", "Daily", 1);
        let outcome = cvrp.process(&[schedule], &mut registry);
        collection_stop_ids(&outcome.results)
    };

    assert_eq!(run(), run());
}
