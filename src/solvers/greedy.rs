use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::domain::location::{Location, RouteConstraints, Vehicle};
use crate::geo;
use crate::solvers::{Solver, SolverRoute};

/// Liters of spare capacity below which the vehicle returns to the depot.
const MIN_REMAINING_CAPACITY: f64 = 100.0;

#[derive(Debug, Clone)]
struct Candidate {
    index: usize,
    distance_from_depot: f64,
    wco_amount: f64,
}

// Max-heap ordering: farthest-from-depot first, heaviest load first.
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance_from_depot
            .total_cmp(&other.distance_from_depot)
            .then(self.wco_amount.total_cmp(&other.wco_amount))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// Prioritizes closest feasible stops while seeding the candidate order
/// from the far edge of the service area. Ignores one-way constraints.
#[derive(Debug, Clone, Default)]
pub struct GreedySolver;

impl GreedySolver {
    pub fn new() -> Self {
        GreedySolver
    }
}

impl Solver for GreedySolver {
    fn id(&self) -> &'static str {
        "greedy"
    }

    fn name(&self) -> &'static str {
        "Greedy Solver"
    }

    fn description(&self) -> &'static str {
        "Fast solver that prioritizes closest locations and maximum capacity utilization. Good for simple routes."
    }

    fn solve(
        &self,
        locations: &[Location],
        vehicles: &[Vehicle],
        _constraints: &RouteConstraints,
    ) -> Vec<SolverRoute> {
        let mut heap: BinaryHeap<Candidate> = locations
            .iter()
            .enumerate()
            .map(|(index, loc)| Candidate {
                index,
                distance_from_depot: loc.distance_from_depot,
                wco_amount: loc.wco_amount,
            })
            .collect();
        let mut available: Vec<usize> = Vec::with_capacity(heap.len());
        while let Some(candidate) = heap.pop() {
            available.push(candidate.index);
        }

        let mut routes = Vec::new();
        for vehicle in vehicles {
            routes.push(self.build_route(vehicle, locations, &mut available));
        }
        routes
    }
}

impl GreedySolver {
    fn build_route(
        &self,
        vehicle: &Vehicle,
        locations: &[Location],
        available: &mut Vec<usize>,
    ) -> SolverRoute {
        let depot = vehicle.depot_location;
        let mut route: SolverRoute = vec![None];
        let mut remaining_capacity = vehicle.capacity;
        let mut current_pos = depot;

        while !available.is_empty() {
            let mut best_slot: Option<usize> = None;
            let mut best_distance = f64::INFINITY;

            for (slot, &idx) in available.iter().enumerate() {
                let location = &locations[idx];
                if location.wco_amount > remaining_capacity {
                    continue;
                }
                let d = geo::calculate_distance(current_pos, location.coordinates);
                if d < best_distance {
                    best_distance = d;
                    best_slot = Some(slot);
                }
            }

            let Some(slot) = best_slot else {
                if remaining_capacity < vehicle.capacity {
                    // Full load; dump at the depot and try again.
                    route.push(None);
                    remaining_capacity = vehicle.capacity;
                    current_pos = depot;
                    continue;
                }
                break;
            };

            let idx = available.remove(slot);
            let location = &locations[idx];
            remaining_capacity -= location.wco_amount;
            current_pos = location.coordinates;
            route.push(Some(location.clone()));

            if remaining_capacity < MIN_REMAINING_CAPACITY {
                route.push(None);
                remaining_capacity = vehicle.capacity;
                current_pos = depot;
            }
        }

        if route.last().is_some_and(|slot| slot.is_some()) {
            route.push(None);
        }
        route
    }
}
