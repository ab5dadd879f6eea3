//! Wire-level plan types.
//!
//! These are what callers submit and what snapshots look like. The search
//! works on [`crate::state::RouteState`], an index-addressed arena built from
//! a [`RoutePlan`].

use serde::{Deserialize, Serialize};

use crate::score::HardSoftScore;

/// A point on the map, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

/// A single service visit with a demand to be covered by a technician.
///
/// `technician`, `previous_visit` and `next_visit` describe the visit's
/// position in a route. They are filled in on snapshots. On input only
/// `technician` is checked; the order comes from [`Technician::visits`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub location: Location,
    pub demand: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technician: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_visit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_visit: Option<String>,
}

impl Visit {
    pub fn new(id: impl Into<String>, name: impl Into<String>, location: Location, demand: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location,
            demand,
            technician: None,
            previous_visit: None,
            next_visit: None,
        }
    }
}

/// A technician with a capacity, a home base and an ordered route of visit ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Technician {
    pub id: String,
    pub capacity: i64,
    pub home_location: Location,
    #[serde(default)]
    pub visits: Vec<String>,
    /// Derived; recomputed on every snapshot.
    #[serde(default)]
    pub total_demand: i64,
    /// Derived; recomputed on every snapshot.
    #[serde(default)]
    pub total_driving_time_seconds: i64,
}

impl Technician {
    pub fn new(id: impl Into<String>, capacity: i64, home_location: Location) -> Self {
        Self {
            id: id.into(),
            capacity,
            home_location,
            visits: Vec::new(),
            total_demand: 0,
            total_driving_time_seconds: 0,
        }
    }

    pub fn with_visits<I, S>(mut self, visits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.visits = visits.into_iter().map(Into::into).collect();
        self
    }
}

/// Status of a solving job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolverStatus {
    #[default]
    NotSolving,
    Solving,
    Terminated,
}

impl SolverStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SolverStatus::NotSolving => "NOT_SOLVING",
            SolverStatus::Solving => "SOLVING",
            SolverStatus::Terminated => "TERMINATED",
        }
    }
}

/// The unit submitted to, and returned by, the solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlan {
    #[serde(default)]
    pub name: String,
    pub south_west_corner: Location,
    pub north_east_corner: Location,
    pub technicians: Vec<Technician>,
    pub visits: Vec<Visit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<HardSoftScore>,
    #[serde(default)]
    pub solver_status: SolverStatus,
}

impl RoutePlan {
    pub fn new(
        name: impl Into<String>,
        south_west_corner: Location,
        north_east_corner: Location,
        technicians: Vec<Technician>,
        visits: Vec<Visit>,
    ) -> Self {
        Self {
            name: name.into(),
            south_west_corner,
            north_east_corner,
            technicians,
            visits,
            score: None,
            solver_status: SolverStatus::NotSolving,
        }
    }

    pub fn technician(&self, id: &str) -> Option<&Technician> {
        self.technicians.iter().find(|technician| technician.id == id)
    }

    pub fn visit(&self, id: &str) -> Option<&Visit> {
        self.visits.iter().find(|visit| visit.id == id)
    }

    /// Visits not listed in any technician's route.
    pub fn unassigned_visits(&self) -> impl Iterator<Item = &Visit> {
        self.visits.iter().filter(move |visit| {
            !self
                .technicians
                .iter()
                .any(|technician| technician.visits.iter().any(|id| *id == visit.id))
        })
    }
}
