use thiserror::Error;

/// Fatal configuration and validation failures. Data-plane problems
/// (infeasible locations, solver misses, duplicate visits) are not errors;
/// they are reported through the per-schedule report or refused by the
/// ledger.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("unknown solver '{0}'")]
    UnknownSolver(String),

    #[error("unknown schedule '{0}'")]
    UnknownSchedule(String),

    #[error("malformed coordinates: {0}")]
    MalformedCoordinates(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RoutingError {
    /// Validation errors map to a 400 at the HTTP boundary; everything else
    /// is a 500.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RoutingError::UnknownSolver(_)
                | RoutingError::UnknownSchedule(_)
                | RoutingError::MalformedCoordinates(_)
        )
    }
}
