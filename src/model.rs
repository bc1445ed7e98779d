//! Domain types shared by the optimizer and the reoptimization controller.

use std::fmt;

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::CriteriaError;

/// Allowed deviation of the criteria weight sum from 1.0.
pub const CRITERIA_TOLERANCE: f64 = 1e-6;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id!(
    /// Identifier of a customer order.
    OrderId
);
string_id!(
    /// Identifier of the kitchen or store preparing an order.
    VendorId
);
string_id!(
    /// Identifier of a driver.
    DriverId
);
string_id!(
    /// Identifier of a route. Stable across reoptimizations of the same route.
    RouteId
);
string_id!(
    /// Identifier of the batch of orders a route serves.
    BatchId
);
string_id!(
    /// Identifier of a [`RouteEvent`](crate::events::RouteEvent).
    EventId
);

impl RouteId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl BatchId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl EventId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self { lat, lng }
    }
}

/// An order to pick up from a vendor and deliver to a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub vendor_id: Option<VendorId>,
    /// Vendor location. Missing when the source data has none; see [`Order::pickup_location`].
    #[serde(default)]
    pub pickup: Option<Coordinate>,
    pub delivery: Coordinate,
}

impl Order {
    pub fn new(id: impl Into<OrderId>, pickup: Option<Coordinate>, delivery: Coordinate) -> Self {
        Self {
            id: id.into(),
            vendor_id: None,
            pickup,
            delivery,
        }
    }

    pub fn with_vendor(mut self, vendor_id: impl Into<VendorId>) -> Self {
        self.vendor_id = Some(vendor_id.into());
        self
    }

    /// Where the order is collected.
    ///
    /// Falls back to the delivery coordinate when no vendor location is known,
    /// which makes the pickup leg and the delivery leg of this order coincide.
    pub fn pickup_location(&self) -> Coordinate {
        self.pickup.unwrap_or(self.delivery)
    }

    pub fn pickup_stop(&self, preparation: Option<PreparationWindow>) -> Stop {
        Stop {
            order_id: self.id.clone(),
            vendor_id: self.vendor_id.clone(),
            location: self.pickup_location(),
            role: StopRole::Pickup,
            preparation,
        }
    }

    pub fn delivery_stop(&self) -> Stop {
        Stop {
            order_id: self.id.clone(),
            vendor_id: self.vendor_id.clone(),
            location: self.delivery,
            role: StopRole::Delivery,
            preparation: None,
        }
    }
}

impl From<String> for OrderId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<String> for VendorId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopRole {
    Pickup,
    Delivery,
}

/// One pickup or delivery point of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub order_id: OrderId,
    pub vendor_id: Option<VendorId>,
    pub location: Coordinate,
    pub role: StopRole,
    /// Predicted readiness, only ever set on pickups.
    pub preparation: Option<PreparationWindow>,
}

/// Predicted time at which an order is ready for collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparationWindow {
    pub order_id: OrderId,
    pub estimated_ready: Timestamp,
    /// Confidence of the prediction in `[0, 1]`.
    pub confidence: f64,
}

impl PreparationWindow {
    /// Builds a window, clamping `confidence` into `[0, 1]`.
    pub fn new(order_id: impl Into<OrderId>, estimated_ready: Timestamp, confidence: f64) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            order_id: order_id.into(),
            estimated_ready,
            confidence,
        }
    }
}

/// Traffic classification near a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficCondition {
    Clear,
    Light,
    Moderate,
    Heavy,
    Severe,
    #[default]
    Unknown,
}

impl TrafficCondition {
    /// Normalized traffic sub-score in `[0, 1]`, higher is better.
    pub const fn score(self) -> f64 {
        match self {
            TrafficCondition::Clear => 1.0,
            TrafficCondition::Light => 0.8,
            TrafficCondition::Moderate => 0.6,
            TrafficCondition::Heavy => 0.4,
            TrafficCondition::Severe => 0.2,
            TrafficCondition::Unknown => 0.6,
        }
    }

    /// Severity rank; `Unknown` ranks below every known condition.
    pub const fn severity(self) -> u8 {
        match self {
            TrafficCondition::Unknown => 0,
            TrafficCondition::Clear => 1,
            TrafficCondition::Light => 2,
            TrafficCondition::Moderate => 3,
            TrafficCondition::Heavy => 4,
            TrafficCondition::Severe => 5,
        }
    }

    /// The most severe condition in `conditions`, `Unknown` when none is known.
    pub fn worst(conditions: impl IntoIterator<Item = TrafficCondition>) -> TrafficCondition {
        conditions
            .into_iter()
            .max_by_key(|condition| condition.severity())
            .unwrap_or_default()
    }
}

/// Weights of the four scoring criteria. Always sums to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CriteriaWeights", into = "CriteriaWeights")]
pub struct OptimizationCriteria {
    distance: f64,
    preparation_time: f64,
    traffic: f64,
    delivery_window: f64,
}

/// Unvalidated criteria weights, as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriteriaWeights {
    pub distance: f64,
    pub preparation_time: f64,
    pub traffic: f64,
    pub delivery_window: f64,
}

impl OptimizationCriteria {
    pub fn new(
        distance: f64,
        preparation_time: f64,
        traffic: f64,
        delivery_window: f64,
    ) -> Result<Self, CriteriaError> {
        let weights = [
            ("distance", distance),
            ("preparation_time", preparation_time),
            ("traffic", traffic),
            ("delivery_window", delivery_window),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(CriteriaError::InvalidWeight { name, value });
            }
        }

        let sum = distance + preparation_time + traffic + delivery_window;
        if (sum - 1.0).abs() > CRITERIA_TOLERANCE {
            return Err(CriteriaError::WeightSum { sum });
        }

        Ok(Self {
            distance,
            preparation_time,
            traffic,
            delivery_window,
        })
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn preparation_time(&self) -> f64 {
        self.preparation_time
    }

    pub fn traffic(&self) -> f64 {
        self.traffic
    }

    pub fn delivery_window(&self) -> f64 {
        self.delivery_window
    }
}

impl Default for OptimizationCriteria {
    fn default() -> Self {
        Self {
            distance: 0.4,
            preparation_time: 0.3,
            traffic: 0.2,
            delivery_window: 0.1,
        }
    }
}

impl TryFrom<CriteriaWeights> for OptimizationCriteria {
    type Error = CriteriaError;

    fn try_from(weights: CriteriaWeights) -> Result<Self, Self::Error> {
        Self::new(
            weights.distance,
            weights.preparation_time,
            weights.traffic,
            weights.delivery_window,
        )
    }
}

impl From<OptimizationCriteria> for CriteriaWeights {
    fn from(criteria: OptimizationCriteria) -> Self {
        Self {
            distance: criteria.distance,
            preparation_time: criteria.preparation_time,
            traffic: criteria.traffic,
            delivery_window: criteria.delivery_window,
        }
    }
}

/// A timed stop of an [`OptimizedRoute`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteWaypoint {
    pub sequence: usize,
    pub stop: Stop,
    pub estimated_arrival: Timestamp,
    pub dwell: SignedDuration,
    pub distance_from_previous_km: f64,
}

impl RouteWaypoint {
    pub fn order_id(&self) -> &OrderId {
        &self.stop.order_id
    }

    pub fn role(&self) -> StopRole {
        self.stop.role
    }
}

/// A fully timed visiting order for one driver's batch.
///
/// Immutable: reoptimization produces a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedRoute {
    pub id: RouteId,
    pub batch_id: BatchId,
    pub waypoints: Vec<RouteWaypoint>,
    pub total_distance_km: f64,
    pub total_duration: SignedDuration,
    pub traffic_adjusted_duration: SignedDuration,
    /// Scoring-model result as a percentage.
    pub optimization_score: f64,
    pub criteria: OptimizationCriteria,
    pub calculated_at: Timestamp,
    pub traffic: TrafficCondition,
}

impl OptimizedRoute {
    /// Orders in visiting order. Read from the deliveries, which every order
    /// keeps even after its pickup.
    pub fn order_sequence(&self) -> Vec<&OrderId> {
        self.waypoints
            .iter()
            .filter(|waypoint| waypoint.role() == StopRole::Delivery)
            .map(RouteWaypoint::order_id)
            .collect()
    }

    pub fn waypoint(&self, order_id: &OrderId, role: StopRole) -> Option<&RouteWaypoint> {
        self.waypoints
            .iter()
            .find(|waypoint| waypoint.role() == role && waypoint.order_id() == order_id)
    }

    pub fn contains_order(&self, order_id: &OrderId) -> bool {
        self.waypoints.iter().any(|waypoint| waypoint.order_id() == order_id)
    }
}
