pub mod constrained;
pub mod greedy;
pub mod nearest_neighbor;
pub mod schedule_order;

use std::time::Duration;

use crate::config::constant::{
    AVERAGE_SPEED_KPH, COLLECTION_TIME_MINUTES, MAX_DAILY_TIME, SOLVER_TIME_LIMIT_SECS,
};
use crate::domain::location::{Location, RouteConstraints, Vehicle};
use crate::error::RoutingError;

pub use constrained::ConstrainedSolver;
pub use greedy::GreedySolver;
pub use nearest_neighbor::NearestNeighborSolver;
pub use schedule_order::ScheduleOrderSolver;

/// One vehicle's ordered stop list. `None` marks a depot visit (trip start
/// or end).
pub type SolverRoute = Vec<Option<Location>>;

/// Capability surface shared by all route solvers.
pub trait Solver: Send + Sync {
    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;

    /// Produce one route per vehicle. Output location ids are always a
    /// subset of the input ids; solvers never invent stops.
    fn solve(
        &self,
        locations: &[Location],
        vehicles: &[Vehicle],
        constraints: &RouteConstraints,
    ) -> Vec<SolverRoute>;
}

/// Tuning shared by solver constructors.
#[derive(Debug, Clone)]
pub struct SolverParams {
    pub speed_kph: f64,
    pub stop_time_minutes: f64,
    pub max_daily_time: f64,
    pub time_limit: Duration,
}

impl Default for SolverParams {
    fn default() -> Self {
        SolverParams {
            speed_kph: AVERAGE_SPEED_KPH,
            stop_time_minutes: COLLECTION_TIME_MINUTES,
            max_daily_time: MAX_DAILY_TIME,
            time_limit: Duration::from_secs(SOLVER_TIME_LIMIT_SECS),
        }
    }
}

/// The well-known solvers. The string ids are the wire contract with API
/// clients and are kept stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverKind {
    Constrained,
    Greedy,
    NearestNeighbor,
    ScheduleOrder,
}

impl SolverKind {
    pub fn all() -> [SolverKind; 4] {
        [
            SolverKind::Constrained,
            SolverKind::Greedy,
            SolverKind::NearestNeighbor,
            SolverKind::ScheduleOrder,
        ]
    }

    pub fn from_id(id: &str) -> Result<Self, RoutingError> {
        match id {
            "ortools" => Ok(SolverKind::Constrained),
            "greedy" => Ok(SolverKind::Greedy),
            "nearest" => Ok(SolverKind::NearestNeighbor),
            "schedule" => Ok(SolverKind::ScheduleOrder),
            other => Err(RoutingError::UnknownSolver(other.to_string())),
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            SolverKind::Constrained => "ortools",
            SolverKind::Greedy => "greedy",
            SolverKind::NearestNeighbor => "nearest",
            SolverKind::ScheduleOrder => "schedule",
        }
    }

    pub fn build(&self, params: &SolverParams) -> Box<dyn Solver> {
        match self {
            SolverKind::Constrained => Box::new(ConstrainedSolver::new(params)),
            SolverKind::Greedy => Box::new(GreedySolver::new()),
            SolverKind::NearestNeighbor => Box::new(NearestNeighborSolver::new()),
            SolverKind::ScheduleOrder => Box::new(ScheduleOrderSolver::new()),
        }
    }
}

/// Ids in the output of every solver route, depot markers skipped.
pub fn route_location_ids(routes: &[SolverRoute]) -> Vec<String> {
    routes
        .iter()
        .flatten()
        .flatten()
        .map(|loc| loc.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solver_ids_round_trip() {
        for kind in SolverKind::all() {
            assert_eq!(SolverKind::from_id(kind.id()).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_solver_id_is_a_validation_error() {
        let err = SolverKind::from_id("simplex").unwrap_err();
        assert!(err.is_validation());
    }
}
