//! Live events that may justify reoptimizing a route.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::model::{Coordinate, EventId, OrderId, RouteId, StopRole, TrafficCondition, VendorId};

/// A single event for one route; consumed once by the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEvent {
    pub id: EventId,
    pub route_id: RouteId,
    pub payload: RouteEventPayload,
    pub timestamp: Timestamp,
}

impl RouteEvent {
    pub fn new(route_id: RouteId, payload: RouteEventPayload, timestamp: Timestamp) -> Self {
        Self {
            id: EventId::generate(),
            route_id,
            payload,
            timestamp,
        }
    }

    pub fn with_id(mut self, id: impl Into<EventId>) -> Self {
        self.id = id.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouteEventPayload {
    TrafficIncident(TrafficIncident),
    /// Kitchen load at a vendor changed, shifting its preparation times.
    PreparationDelay(KitchenLoadChange),
    OrderReady { order_id: OrderId },
    CustomerRequest { order_id: OrderId, kind: CustomerRequestKind },
    DriverLocation { location: Coordinate },
    WaypointCompleted { order_id: OrderId, role: StopRole },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficIncident {
    pub location: Coordinate,
    pub severity: TrafficCondition,
    pub delay_minutes: f64,
}

/// Vendor load before and after the change, each in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KitchenLoadChange {
    pub vendor_id: VendorId,
    pub previous_load: f64,
    pub current_load: f64,
}

impl KitchenLoadChange {
    pub fn magnitude(&self) -> f64 {
        (self.current_load - self.previous_load).abs()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerRequestKind {
    UrgentDelivery,
    AddressChange,
    Cancellation,
    #[serde(other)]
    Other,
}

impl CustomerRequestKind {
    /// Whether the request can change the best visiting order.
    pub fn affects_route(self) -> bool {
        !matches!(self, CustomerRequestKind::Other)
    }
}
