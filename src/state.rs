//! Per-route reoptimization bookkeeping.

use std::collections::{HashSet, VecDeque};

use jiff::{SignedDuration, Timestamp};
use serde::Serialize;

use crate::model::{Coordinate, DriverId, EventId, OptimizedRoute, OrderId, RouteId, RouteWaypoint, StopRole};

/// Everything the controller remembers about one monitored route.
///
/// Owned by exactly one worker; never shared between threads while mutated.
#[derive(Debug, Clone)]
pub struct RouteReoptimizationState {
    driver_id: DriverId,
    route_id: RouteId,
    current_route: OptimizedRoute,
    monitoring_since: Timestamp,
    monitoring: bool,
    last_reoptimization: Option<Timestamp>,
    /// Accepted reoptimizations inside the rolling window, oldest first.
    recent_reoptimizations: VecDeque<Timestamp>,
    total_reoptimizations: u64,
    processed_events: VecDeque<EventId>,
    history_limit: usize,
    completed: HashSet<(OrderId, StopRole)>,
    last_known_location: Option<Coordinate>,
}

impl RouteReoptimizationState {
    pub fn new(driver_id: DriverId, route: OptimizedRoute, started_at: Timestamp, history_limit: usize) -> Self {
        Self {
            driver_id,
            route_id: route.id.clone(),
            current_route: route,
            monitoring_since: started_at,
            monitoring: true,
            last_reoptimization: None,
            recent_reoptimizations: VecDeque::new(),
            total_reoptimizations: 0,
            processed_events: VecDeque::new(),
            history_limit: history_limit.max(1),
            completed: HashSet::new(),
            last_known_location: None,
        }
    }

    pub fn driver_id(&self) -> &DriverId {
        &self.driver_id
    }

    pub fn route_id(&self) -> &RouteId {
        &self.route_id
    }

    pub fn current_route(&self) -> &OptimizedRoute {
        &self.current_route
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    pub fn last_reoptimization(&self) -> Option<Timestamp> {
        self.last_reoptimization
    }

    pub fn last_known_location(&self) -> Option<Coordinate> {
        self.last_known_location
    }

    pub fn stop(&mut self) {
        self.monitoring = false;
    }

    /// Records `event_id`; returns `false` when it was already seen.
    pub fn remember_event(&mut self, event_id: &EventId) -> bool {
        if self.processed_events.contains(event_id) {
            return false;
        }
        if self.processed_events.len() == self.history_limit {
            self.processed_events.pop_front();
        }
        self.processed_events.push_back(event_id.clone());
        true
    }

    pub fn update_location(&mut self, location: Coordinate) {
        self.last_known_location = Some(location);
    }

    pub fn mark_completed(&mut self, order_id: OrderId, role: StopRole) {
        self.completed.insert((order_id, role));
    }

    pub fn is_completed(&self, order_id: &OrderId, role: StopRole) -> bool {
        self.completed.contains(&(order_id.clone(), role))
    }

    pub fn is_delivered(&self, order_id: &OrderId) -> bool {
        self.is_completed(order_id, StopRole::Delivery)
    }

    /// Waypoints of the current route not yet completed, in visiting order.
    pub fn pending_waypoints(&self) -> impl Iterator<Item = &RouteWaypoint> + '_ {
        self.current_route
            .waypoints
            .iter()
            .filter(|waypoint| !self.is_completed(waypoint.order_id(), waypoint.role()))
    }

    pub fn has_pending_pickup(&self, order_id: &OrderId) -> bool {
        self.pending_waypoints()
            .any(|waypoint| waypoint.order_id() == order_id && waypoint.role() == StopRole::Pickup)
    }

    pub fn has_pending_waypoint(&self, order_id: &OrderId) -> bool {
        self.pending_waypoints().any(|waypoint| waypoint.order_id() == order_id)
    }

    /// Time left before another reoptimization may be accepted, if any.
    pub fn cooldown_remaining(&self, now: Timestamp, cooldown: SignedDuration) -> Option<SignedDuration> {
        let last = self.last_reoptimization?;
        let remaining = cooldown - now.duration_since(last);
        remaining.is_positive().then_some(remaining)
    }

    /// Accepted reoptimizations in the window ending at `now`; forgets older ones.
    pub fn reoptimizations_within(&mut self, now: Timestamp, window: SignedDuration) -> usize {
        while let Some(&oldest) = self.recent_reoptimizations.front() {
            if now.duration_since(oldest) >= window {
                self.recent_reoptimizations.pop_front();
            } else {
                break;
            }
        }
        self.recent_reoptimizations.len()
    }

    /// Replaces the current route after an accepted reoptimization.
    pub fn record_reoptimization(&mut self, route: OptimizedRoute, at: Timestamp) {
        self.current_route = route;
        self.last_reoptimization = Some(at);
        self.recent_reoptimizations.push_back(at);
        self.total_reoptimizations += 1;
    }

    pub fn snapshot(&self) -> RouteStatus {
        RouteStatus {
            phase: if self.monitoring {
                RoutePhase::Monitoring
            } else {
                RoutePhase::Stopped
            },
            driver_id: self.driver_id.clone(),
            route_id: self.route_id.clone(),
            current_route: self.current_route.clone(),
            monitoring_since: self.monitoring_since,
            last_reoptimization: self.last_reoptimization,
            reoptimizations_in_window: self.recent_reoptimizations.len(),
            total_reoptimizations: self.total_reoptimizations,
            completed_stops: self.completed.len(),
            last_known_location: self.last_known_location,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutePhase {
    Monitoring,
    /// An event or tick is being analyzed or solved.
    Evaluating,
    Stopped,
}

/// Read-only view of a monitored route, published after every processed event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteStatus {
    pub phase: RoutePhase,
    pub driver_id: DriverId,
    pub route_id: RouteId,
    pub current_route: OptimizedRoute,
    pub monitoring_since: Timestamp,
    pub last_reoptimization: Option<Timestamp>,
    pub reoptimizations_in_window: usize,
    pub total_reoptimizations: u64,
    pub completed_stops: usize,
    pub last_known_location: Option<Coordinate>,
}
