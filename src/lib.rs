//! technician-routing
//!
//! Capacity-constrained technician routing: assigns service visits to
//! technicians and orders each route, minimizing travel time without
//! exceeding any technician's capacity.

pub mod traits;
pub mod haversine;
pub mod domain;
pub mod score;
pub mod error;
pub mod config;
pub mod state;
pub mod constraints;
pub mod director;
pub mod moves;
pub mod selector;
pub mod acceptor;
pub mod solver;
pub mod manager;
pub mod analysis;
