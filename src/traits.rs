//! Pluggable seams for the routing engine.
//!
//! The engine only needs a travel-time matrix; how it is produced
//! (great-circle estimate, road network, fixed test data) is up to the caller.

use crate::domain::Location;

/// Provides a travel-time matrix (seconds) for a set of locations.
///
/// The matrix is indexed by the provided location order. Entries must be
/// non-negative and the diagonal must be zero.
pub trait DistanceMatrixProvider: Send + Sync {
    fn matrix_for(&self, locations: &[Location]) -> Vec<Vec<i64>>;
}

/// Dense travel-time lookup built once per plan.
#[derive(Debug, Clone, Default)]
pub struct TravelMatrix {
    size: usize,
    seconds: Vec<i64>,
}

impl TravelMatrix {
    /// Flattens the rows returned by a provider.
    ///
    /// Rows that are too short are padded with zeros, negative entries are
    /// clamped and the diagonal is forced to zero.
    pub fn from_rows(size: usize, rows: Vec<Vec<i64>>) -> Self {
        let mut seconds = vec![0; size * size];
        for (i, row) in rows.into_iter().take(size).enumerate() {
            for (j, value) in row.into_iter().take(size).enumerate() {
                if i != j {
                    seconds[i * size + j] = value.max(0);
                }
            }
        }
        Self { size, seconds }
    }

    pub fn build(provider: &dyn DistanceMatrixProvider, locations: &[Location]) -> Self {
        Self::from_rows(locations.len(), provider.matrix_for(locations))
    }

    #[inline]
    pub fn get(&self, from: usize, to: usize) -> i64 {
        self.seconds[from * self.size + to]
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl DistanceMatrixProvider for Fixed {
        fn matrix_for(&self, locations: &[Location]) -> Vec<Vec<i64>> {
            // deliberately ragged
            (0..locations.len()).map(|i| vec![i as i64; i]).collect()
        }
    }

    #[test]
    fn test_ragged_rows_are_padded() {
        let locations = vec![Location::new(0.0, 0.0); 3];
        let matrix = TravelMatrix::build(&Fixed, &locations);
        assert_eq!(matrix.size(), 3);
        assert_eq!(matrix.get(0, 2), 0);
        assert_eq!(matrix.get(2, 1), 2);
        assert_eq!(matrix.get(1, 2), 0);
    }
}
