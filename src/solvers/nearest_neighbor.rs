use std::collections::HashSet;

use crate::domain::location::{Location, RouteConstraints, Vehicle};
use crate::geo;
use crate::solvers::{Solver, SolverRoute};

/// Capacity fraction at which a vehicle heads back to the depot even though
/// it could keep going.
const DEPOT_RETURN_RATIO: f64 = 0.9;

/// Always drives to the closest unvisited feasible stop. Fast, ignores
/// one-way constraints.
#[derive(Debug, Clone, Default)]
pub struct NearestNeighborSolver;

impl NearestNeighborSolver {
    pub fn new() -> Self {
        NearestNeighborSolver
    }
}

impl Solver for NearestNeighborSolver {
    fn id(&self) -> &'static str {
        "nearest"
    }

    fn name(&self) -> &'static str {
        "Nearest Neighbor Solver"
    }

    fn description(&self) -> &'static str {
        "Simple solver that always chooses the closest next location. Fast but may not find optimal solutions."
    }

    fn solve(
        &self,
        locations: &[Location],
        vehicles: &[Vehicle],
        _constraints: &RouteConstraints,
    ) -> Vec<SolverRoute> {
        let mut routes = Vec::new();
        let mut remaining: HashSet<usize> = (0..locations.len()).collect();

        for vehicle in vehicles {
            let depot = vehicle.depot_location;
            let mut route: SolverRoute = vec![None];
            let mut current_load = 0.0f64;
            let mut current_pos = depot;

            while !remaining.is_empty() {
                let mut best_idx: Option<usize> = None;
                let mut best_distance = f64::INFINITY;

                for &idx in &remaining {
                    let location = &locations[idx];
                    if current_load + location.wco_amount > vehicle.capacity {
                        continue;
                    }
                    let d = geo::calculate_distance(current_pos, location.coordinates);
                    if d < best_distance {
                        best_distance = d;
                        best_idx = Some(idx);
                    }
                }

                let Some(idx) = best_idx else {
                    // Nothing fits in what is left of this load; empty out
                    // at the depot and retry, or give up if already empty.
                    if current_load > 0.0 {
                        route.push(None);
                        current_load = 0.0;
                        current_pos = depot;
                        continue;
                    }
                    break;
                };

                let location = &locations[idx];
                current_load += location.wco_amount;
                current_pos = location.coordinates;
                route.push(Some(location.clone()));
                remaining.remove(&idx);

                if current_load >= DEPOT_RETURN_RATIO * vehicle.capacity {
                    route.push(None);
                    current_load = 0.0;
                    current_pos = depot;
                }
            }

            if route.last().is_some_and(|slot| slot.is_some()) {
                route.push(None);
            }
            routes.push(route);
        }

        routes
    }
}
