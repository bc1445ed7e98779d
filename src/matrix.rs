//! Pairwise distances between the driver and every stop of a batch.
//!
//! Points are addressed by absolute index: `0` is the driver origin,
//! `1..=n` are pickups and `n+1..=2n` are deliveries, in order-list order.

use crate::error::MatrixError;
use crate::model::{Coordinate, Order};
use crate::traits::DistanceMatrixProvider;

/// Square matrix of distances in kilometers.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    size: usize,
    values: Vec<f64>,
}

impl DistanceMatrix {
    /// Builds a matrix from row-major values.
    pub fn from_flat(size: usize, values: Vec<f64>) -> Result<Self, MatrixError> {
        if values.len() != size * size {
            return Err(MatrixError::DimensionMismatch {
                expected: size * size,
                actual: values.len(),
            });
        }

        for (idx, value) in values.iter().enumerate() {
            let (row, col) = (idx / size, idx % size);
            if !value.is_finite() || *value < 0.0 || (row == col && *value != 0.0) {
                return Err(MatrixError::InvalidEntry {
                    row,
                    col,
                    value: *value,
                });
            }
        }

        Ok(Self { size, values })
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, MatrixError> {
        let size = rows.len();
        let mut values = Vec::with_capacity(size * size);
        for (row, entries) in rows.into_iter().enumerate() {
            if entries.len() != size {
                return Err(MatrixError::NotSquare {
                    row,
                    len: entries.len(),
                    expected: size,
                });
            }
            values.extend(entries);
        }
        Self::from_flat(size, values)
    }

    /// Number of points covered.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Distance in kilometers from point `from` to point `to`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    pub fn get(&self, from: usize, to: usize) -> f64 {
        assert!(from < self.size && to < self.size, "matrix index out of range");
        self.values[from * self.size + to]
    }

    /// Builds the `(2n+1)`-point matrix for `orders` seen from `origin`.
    pub fn for_orders<M>(origin: Coordinate, orders: &[Order], provider: &M) -> Result<Self, MatrixError>
    where
        M: DistanceMatrixProvider + ?Sized,
    {
        let points = point_list(origin, orders);
        let matrix = provider.matrix_for(&points)?;
        if matrix.size() != points.len() {
            return Err(MatrixError::DimensionMismatch {
                expected: points.len(),
                actual: matrix.size(),
            });
        }
        Ok(matrix)
    }
}

/// The ordered point list `[origin, pickups.., deliveries..]`.
pub fn point_list(origin: Coordinate, orders: &[Order]) -> Vec<Coordinate> {
    let mut points = Vec::with_capacity(orders.len() * 2 + 1);
    points.push(origin);
    points.extend(orders.iter().map(Order::pickup_location));
    points.extend(orders.iter().map(|order| order.delivery));
    points
}

/// Matrix index of the origin.
pub const ORIGIN_INDEX: usize = 0;

/// Matrix index of the pickup of order `order`.
pub const fn pickup_index(order: usize) -> usize {
    1 + order
}

/// Matrix index of the delivery of order `order` out of `order_count`.
pub const fn delivery_index(order: usize, order_count: usize) -> usize {
    1 + order_count + order
}
