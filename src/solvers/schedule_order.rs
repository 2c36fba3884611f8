use std::collections::HashSet;

use crate::domain::location::{Location, RouteConstraints, Vehicle};
use crate::solvers::{Solver, SolverRoute};

/// Identity solver: keeps the scheduler's ordering, only adding the depot
/// markers. The first vehicle takes every location not already routed, so
/// per-vehicle dispatch passes through unchanged.
#[derive(Debug, Clone, Default)]
pub struct ScheduleOrderSolver;

impl ScheduleOrderSolver {
    pub fn new() -> Self {
        ScheduleOrderSolver
    }
}

impl Solver for ScheduleOrderSolver {
    fn id(&self) -> &'static str {
        "schedule"
    }

    fn name(&self) -> &'static str {
        "Schedule-Aware Solver"
    }

    fn description(&self) -> &'static str {
        "Specialized solver that considers location schedules and time windows. Best for time-sensitive routes."
    }

    fn solve(
        &self,
        locations: &[Location],
        vehicles: &[Vehicle],
        _constraints: &RouteConstraints,
    ) -> Vec<SolverRoute> {
        let mut routed: HashSet<String> = HashSet::new();
        let mut routes = Vec::new();

        for _vehicle in vehicles {
            let available: Vec<&Location> = locations
                .iter()
                .filter(|loc| !routed.contains(&loc.id))
                .collect();
            if available.is_empty() {
                continue;
            }

            let mut route: SolverRoute = vec![None];
            for loc in available {
                routed.insert(loc.id.clone());
                route.push(Some(loc.clone()));
            }
            route.push(None);
            routes.push(route);
        }

        routes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(id: &str) -> Location {
        Location::new(id, (7.0, 125.0), 20.0, 7)
    }

    #[test]
    fn preserves_input_order_between_depot_markers() {
        let solver = ScheduleOrderSolver::new();
        let locations = vec![location("a"), location("b"), location("c")];
        let vehicles = vec![Vehicle::new("v1", 100.0, (7.0, 125.0))];

        let routes = solver.solve(&locations, &vehicles, &RouteConstraints::default());
        assert_eq!(routes.len(), 1);
        assert!(routes[0].first().unwrap().is_none());
        assert!(routes[0].last().unwrap().is_none());
        let names: Vec<&str> = routes[0]
            .iter()
            .flatten()
            .map(|l| l.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn later_vehicles_get_nothing_once_all_routed() {
        let solver = ScheduleOrderSolver::new();
        let locations = vec![location("a")];
        let vehicles = vec![
            Vehicle::new("v1", 100.0, (7.0, 125.0)),
            Vehicle::new("v2", 100.0, (7.0, 125.0)),
        ];
        let routes = solver.solve(&locations, &vehicles, &RouteConstraints::default());
        assert_eq!(routes.len(), 1);
    }
}
