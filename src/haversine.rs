//! Great-circle geometry and the default distance matrix provider.
//!
//! Straight-line distances ignore the road network but need no external
//! service, so this provider is always available.

use crate::error::MatrixError;
use crate::matrix::DistanceMatrix;
use crate::model::Coordinate;
use crate::traits::DistanceMatrixProvider;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two points in kilometers.
pub fn distance_km(from: Coordinate, to: Coordinate) -> f64 {
    if from == to {
        return 0.0;
    }

    let lat1_rad = from.lat.to_radians();
    let lat2_rad = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lng = (to.lng - from.lng).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Initial compass bearing from `from` to `to`, in `[0, 360)` degrees.
pub fn bearing_degrees(from: Coordinate, to: Coordinate) -> f64 {
    let lat1_rad = from.lat.to_radians();
    let lat2_rad = to.lat.to_radians();
    let delta_lng = (to.lng - from.lng).to_radians();

    let y = delta_lng.sin() * lat2_rad.cos();
    let x = lat1_rad.cos() * lat2_rad.sin() - lat1_rad.sin() * lat2_rad.cos() * delta_lng.cos();

    let bearing = y.atan2(x).to_degrees().rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if bearing >= 360.0 { 0.0 } else { bearing }
}

/// Haversine-based distance matrix provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct HaversineMatrix;

impl DistanceMatrixProvider for HaversineMatrix {
    fn matrix_for(&self, locations: &[Coordinate]) -> Result<DistanceMatrix, MatrixError> {
        let n = locations.len();
        let mut values = vec![0.0; n * n];

        for (i, from) in locations.iter().enumerate() {
            for (j, to) in locations.iter().enumerate().skip(i + 1) {
                let km = distance_km(*from, *to);
                values[i * n + j] = km;
                values[j * n + i] = km;
            }
        }

        DistanceMatrix::from_flat(n, values)
    }
}
