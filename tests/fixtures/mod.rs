//! Test fixtures for delivery-planner.
//!
//! Provides realistic test data:
//! - Real Kuala Lumpur restaurant and residential locations (from OpenStreetMap)
//! - Order builders and in-memory collaborators for the controller

#![allow(dead_code)]

pub mod kuala_lumpur_locations;

use std::sync::Mutex;

use delivery_planner::error::CollaboratorError;
use delivery_planner::model::{Coordinate, DriverId, OptimizedRoute, Order, OrderId, RouteId};
use delivery_planner::traits::{DriverLocationProvider, RouteStore};

pub use kuala_lumpur_locations::*;

/// Driver start used throughout: Merdeka Square area.
pub const DRIVER_START: Coordinate = Coordinate::new(3.1390, 101.6869);

/// Order picked up at `vendor` and delivered to `customer`.
pub fn order(id: impl Into<OrderId>, vendor: &Location, customer: &Location) -> Order {
    Order::new(id, Some(vendor.coordinate()), customer.coordinate()).with_vendor(vendor.name)
}

/// Three orders whose stops are all within 2 km of [`DRIVER_START`].
pub fn nearby_orders() -> Vec<Order> {
    vec![
        order("o1", &NEAR_RESTAURANTS[0], &NEAR_HOMES[0]),
        order("o2", &NEAR_RESTAURANTS[1], &NEAR_HOMES[1]),
        order("o3", &NEAR_RESTAURANTS[2], &NEAR_HOMES[2]),
    ]
}

/// Orders at increasing distance from [`DRIVER_START`]: near, mid, far.
pub fn spread_orders() -> Vec<Order> {
    vec![
        order("near", &NEAR_RESTAURANTS[0], &NEAR_HOMES[0]),
        order("mid", &CITY_RESTAURANTS[0], &CITY_HOMES[0]),
        order("far", &CITY_RESTAURANTS[4], &CITY_HOMES[1]),
    ]
}

/// [`spread_orders`] visited far first: several km longer than necessary.
pub const DETOUR_SEQUENCE: [usize; 3] = [2, 0, 1];

/// `count` orders spread across the city, cycling through the location tables.
pub fn city_orders(count: usize) -> Vec<Order> {
    (0..count)
        .map(|i| {
            order(
                format!("c{i}"),
                &CITY_RESTAURANTS[i % CITY_RESTAURANTS.len()],
                &CITY_HOMES[(i * 3 + 1) % CITY_HOMES.len()],
            )
        })
        .collect()
}

pub struct FixedLocation(pub Coordinate);

impl DriverLocationProvider for FixedLocation {
    fn current_location(&self, _driver_id: &DriverId) -> Result<Coordinate, CollaboratorError> {
        Ok(self.0)
    }
}

/// Route store backed by a fixed order list; records every replaced route.
#[derive(Default)]
pub struct MemoryStore {
    pub orders: Vec<Order>,
    pub saved: Mutex<Vec<OptimizedRoute>>,
}

impl MemoryStore {
    pub fn with_orders(orders: Vec<Order>) -> Self {
        Self {
            orders,
            saved: Mutex::new(Vec::new()),
        }
    }

    pub fn saved_count(&self) -> usize {
        self.saved.lock().unwrap().len()
    }
}

impl RouteStore for MemoryStore {
    fn remaining_orders(&self, _route_id: &RouteId) -> Result<Vec<Order>, CollaboratorError> {
        Ok(self.orders.clone())
    }

    fn replace_route(&self, route: &OptimizedRoute) -> Result<(), CollaboratorError> {
        self.saved.lock().unwrap().push(route.clone());
        Ok(())
    }
}
