//! Default travel-time provider: great-circle distance at a fixed driving speed.
//!
//! Road networks are not modelled; every leg is a straight line.

use rayon::prelude::*;

use crate::domain::Location;
use crate::traits::DistanceMatrixProvider;

/// Speed used by [`HaversineMatrix::default`].
const DEFAULT_SPEED_KMH: f64 = 50.0;

/// Mean Earth radius.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Converts technician homes and visit locations into a travel-time matrix in seconds.
#[derive(Debug, Clone)]
pub struct HaversineMatrix {
    /// Driving speed in km/h.
    pub speed_kmh: f64,
}

impl Default for HaversineMatrix {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl HaversineMatrix {
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }

    /// Great-circle distance in kilometers.
    pub fn haversine_km(from: Location, to: Location) -> f64 {
        let lat1_rad = from.latitude.to_radians();
        let lat2_rad = to.latitude.to_radians();
        let delta_lat = (to.latitude - from.latitude).to_radians();
        let delta_lng = (to.longitude - from.longitude).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_KM * c
    }

    /// Seconds needed to drive `km`, rounded to the nearest second.
    pub fn km_to_seconds(&self, km: f64) -> i64 {
        let hours = km / self.speed_kmh;
        (hours * 3600.0).round() as i64
    }

    /// Travel time between two points in seconds.
    pub fn travel_seconds(&self, from: Location, to: Location) -> i64 {
        self.km_to_seconds(Self::haversine_km(from, to))
    }
}

impl DistanceMatrixProvider for HaversineMatrix {
    fn matrix_for(&self, locations: &[Location]) -> Vec<Vec<i64>> {
        locations
            .par_iter()
            .enumerate()
            .map(|(i, from)| {
                locations
                    .iter()
                    .enumerate()
                    .map(|(j, to)| if i == j { 0 } else { self.travel_seconds(*from, *to) })
                    .collect()
            })
            .collect()
    }
}
