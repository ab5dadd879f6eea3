//! Test fixtures for technician-routing.
//!
//! Provides:
//! - Builders for technicians, visits and plans with sensible defaults
//! - A Manhattan travel-time provider with predictable legs
//! - Seeded random plans for property-style checks
//! - Sydney / Melbourne / Brisbane demo plans
//! - Opt-in log output (`RUST_LOG=technician_routing=debug`)

#![allow(dead_code)]

pub mod demo_data;

pub use demo_data::DemoData;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use tracing_subscriber::EnvFilter;

use technician_routing::domain::{Location, RoutePlan, Technician, Visit};
use technician_routing::traits::DistanceMatrixProvider;

// ============================================================================
// Builders
// ============================================================================

/// Builder for test technicians.
#[derive(Clone, Debug)]
pub struct TestTechnician {
    id: String,
    capacity: i64,
    home: (f64, f64),
    visits: Vec<String>,
}

impl TestTechnician {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            capacity: 10,
            home: (0.0, 0.0),
            visits: Vec::new(),
        }
    }

    pub fn capacity(mut self, capacity: i64) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn home(mut self, lat: f64, lng: f64) -> Self {
        self.home = (lat, lng);
        self
    }

    pub fn route(mut self, visits: &[&str]) -> Self {
        self.visits = visits.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn build(self) -> Technician {
        Technician::new(self.id, self.capacity, Location::new(self.home.0, self.home.1))
            .with_visits(self.visits)
    }
}

/// Builder for test visits.
#[derive(Clone, Debug)]
pub struct TestVisit {
    id: String,
    location: (f64, f64),
    demand: i64,
    technician: Option<String>,
}

impl TestVisit {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            location: (0.0, 0.0),
            demand: 1,
            technician: None,
        }
    }

    pub fn location(mut self, lat: f64, lng: f64) -> Self {
        self.location = (lat, lng);
        self
    }

    pub fn demand(mut self, demand: i64) -> Self {
        self.demand = demand;
        self
    }

    /// Declares the owning technician on the visit itself.
    pub fn technician(mut self, id: &str) -> Self {
        self.technician = Some(id.to_string());
        self
    }

    pub fn build(self) -> Visit {
        let mut visit = Visit::new(
            self.id.clone(),
            format!("Customer {}", self.id),
            Location::new(self.location.0, self.location.1),
            self.demand,
        );
        visit.technician = self.technician;
        visit
    }
}

pub fn plan(technicians: Vec<TestTechnician>, visits: Vec<TestVisit>) -> RoutePlan {
    RoutePlan::new(
        "test",
        Location::new(-1.0, -1.0),
        Location::new(1.0, 1.0),
        technicians.into_iter().map(TestTechnician::build).collect(),
        visits.into_iter().map(TestVisit::build).collect(),
    )
}

// ============================================================================
// Travel times
// ============================================================================

/// Manhattan distance matrix (simple, predictable).
///
/// One degree of latitude or longitude is one minute of travel.
pub struct ManhattanMatrix;

impl DistanceMatrixProvider for ManhattanMatrix {
    fn matrix_for(&self, locations: &[Location]) -> Vec<Vec<i64>> {
        locations
            .iter()
            .map(|from| {
                locations
                    .iter()
                    .map(|to| {
                        let dist = (from.latitude - to.latitude).abs()
                            + (from.longitude - to.longitude).abs();
                        (dist * 60.0).round() as i64
                    })
                    .collect()
            })
            .collect()
    }
}

// ============================================================================
// Random plans
// ============================================================================

/// A plan with `visit_count` visits, spread over `technician_count` routes
/// (some left unassigned), with total demand close to total capacity.
pub fn random_plan(seed: u64, technician_count: usize, visit_count: usize) -> RoutePlan {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let point = |rng: &mut ChaCha8Rng| (rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0));

    let mut technicians: Vec<TestTechnician> = (0..technician_count)
        .map(|i| {
            let (lat, lng) = point(&mut rng);
            TestTechnician::new(&format!("t{i}"))
                .capacity(rng.random_range(3..=8))
                .home(lat, lng)
        })
        .collect();

    let mut routes: Vec<Vec<String>> = vec![Vec::new(); technician_count];
    let visits = (0..visit_count)
        .map(|i| {
            let id = format!("v{i}");
            let (lat, lng) = point(&mut rng);
            let owner = rng.random_range(0..=technician_count);
            if owner < technician_count {
                routes[owner].push(id.clone());
            }
            TestVisit::new(&id)
                .location(lat, lng)
                .demand(rng.random_range(1..=3))
        })
        .collect();

    for (technician, route) in technicians.iter_mut().zip(&routes) {
        let ids: Vec<&str> = route.iter().map(String::as_str).collect();
        *technician = technician.clone().route(&ids);
    }
    plan(technicians, visits)
}

// ============================================================================
// Logging
// ============================================================================

/// Routes solver logs to the test output. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
