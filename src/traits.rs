//! Interfaces to the collaborators around the planner.
//!
//! These are intentionally minimal. Concrete apps implement them on top of
//! their own storage, prediction and telemetry services.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use jiff::{SignedDuration, Timestamp};

use crate::error::{CollaboratorError, MatrixError};
use crate::matrix::DistanceMatrix;
use crate::model::{Coordinate, DriverId, OptimizedRoute, Order, OrderId, PreparationWindow, RouteId, TrafficCondition};

/// Provides a distance matrix (kilometers) for a set of locations.
///
/// The matrix is indexed by the provided location order.
pub trait DistanceMatrixProvider: Send + Sync {
    fn matrix_for(&self, locations: &[Coordinate]) -> Result<DistanceMatrix, MatrixError>;
}

/// Predicts when each order will be ready for pickup.
///
/// Orders missing from the result have no prediction.
pub trait PreparationPredictor: Send + Sync {
    fn predict(&self, orders: &[Order]) -> Result<HashMap<OrderId, PreparationWindow>, CollaboratorError>;
}

/// Classifies traffic around each order's stops.
///
/// Live feed or simulation; orders missing from the result count as `Unknown`.
pub trait TrafficSource: Send + Sync {
    fn lookup(
        &self,
        orders: &[Order],
        driver_location: Coordinate,
        at: Timestamp,
    ) -> Result<HashMap<OrderId, TrafficCondition>, CollaboratorError>;
}

/// Knows where a driver is right now.
pub trait DriverLocationProvider: Send + Sync {
    fn current_location(&self, driver_id: &DriverId) -> Result<Coordinate, CollaboratorError>;
}

/// Persistence of routes and their outstanding orders.
pub trait RouteStore: Send + Sync {
    /// Orders of the route that still have to be served.
    fn remaining_orders(&self, route_id: &RouteId) -> Result<Vec<Order>, CollaboratorError>;

    /// Replaces the stored route and all of its waypoints.
    fn replace_route(&self, route: &OptimizedRoute) -> Result<(), CollaboratorError>;
}

/// Processing time for every time rule of the reoptimization loop.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to. For replays and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn set(&self, at: Timestamp) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }

    pub fn advance(&self, by: SignedDuration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = now.checked_add(by).unwrap_or(Timestamp::MAX);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A fixed table of predictions.
impl PreparationPredictor for HashMap<OrderId, PreparationWindow> {
    fn predict(&self, orders: &[Order]) -> Result<HashMap<OrderId, PreparationWindow>, CollaboratorError> {
        Ok(orders
            .iter()
            .filter_map(|order| self.get(&order.id).map(|window| (order.id.clone(), window.clone())))
            .collect())
    }
}

/// A fixed table of traffic classifications.
impl TrafficSource for HashMap<OrderId, TrafficCondition> {
    fn lookup(
        &self,
        orders: &[Order],
        _driver_location: Coordinate,
        _at: Timestamp,
    ) -> Result<HashMap<OrderId, TrafficCondition>, CollaboratorError> {
        Ok(orders
            .iter()
            .filter_map(|order| self.get(&order.id).map(|condition| (order.id.clone(), *condition)))
            .collect())
    }
}

/// Predictor used when no preparation data is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPreparationData;

impl PreparationPredictor for NoPreparationData {
    fn predict(&self, _orders: &[Order]) -> Result<HashMap<OrderId, PreparationWindow>, CollaboratorError> {
        Ok(HashMap::new())
    }
}
