//! Error types for the routing engine.

use thiserror::Error;

use crate::state::MAX_QUANTITY;

/// A submitted plan violates a structural rule. Nothing is scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("duplicate technician id '{0}'")]
    DuplicateTechnician(String),

    #[error("duplicate visit id '{0}'")]
    DuplicateVisit(String),

    #[error("technician '{technician}' has non-positive capacity {capacity}")]
    InvalidCapacity { technician: String, capacity: i64 },

    #[error("visit '{visit}' has non-positive demand {demand}")]
    InvalidDemand { visit: String, demand: i64 },

    #[error("technician '{technician}' has capacity {capacity} above the maximum {max}", max = MAX_QUANTITY)]
    CapacityTooLarge { technician: String, capacity: i64 },

    #[error("total demand exceeds the maximum {max} at visit '{0}'", max = MAX_QUANTITY)]
    DemandTooLarge(String),

    #[error("location of '{0}' is not a finite coordinate")]
    InvalidLocation(String),

    #[error("technician '{technician}' lists unknown visit '{visit}'")]
    UnknownVisit { technician: String, visit: String },

    #[error("visit '{visit}' references unknown technician '{technician}'")]
    UnknownTechnician { visit: String, technician: String },

    #[error("visit '{0}' is listed in more than one route position")]
    VisitAssignedTwice(String),

    #[error("visit '{visit}' declares technician '{declared}' but is routed by {routed:?}")]
    TechnicianMismatch {
        visit: String,
        declared: String,
        routed: Option<String>,
    },
}

/// A route mutator refused to apply. The arena is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("technician handle {0} is out of range")]
    UnknownTechnician(usize),

    #[error("visit handle {0} is out of range")]
    UnknownVisit(usize),

    #[error("visit {0} is already assigned")]
    AlreadyAssigned(usize),

    #[error("visit {0} is not assigned")]
    NotAssigned(usize),

    #[error("anchor visit {anchor} is not on technician {technician}'s route")]
    InvalidAnchor { technician: usize, anchor: usize },

    #[error("visits {start}..={end} do not form a segment of one route")]
    InvalidSegment { start: usize, end: usize },

    #[error("anchor visit {0} lies inside the segment being moved")]
    AnchorInSegment(usize),

    #[error("route invariant broken: {0}")]
    Corrupted(String),
}

/// Errors surfaced by the solver and the job manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverError {
    #[error("invalid plan: {0}")]
    InvalidPlan(#[from] PlanError),

    #[error("job '{0}' is already solving")]
    AlreadySolving(String),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("score corrupted: incremental {incremental} but full recalculation gives {full}")]
    ScoreCorrupted { incremental: String, full: String },

    #[error("solver worker failed: {0}")]
    Worker(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for solver operations
pub type Result<T> = std::result::Result<T, SolverError>;
