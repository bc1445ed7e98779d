//! Decides whether an event is worth a re-solve.
//!
//! Each event kind has its own rule; all of them only look at the pending part
//! of the current route.

use jiff::{SignedDuration, Timestamp};
use serde::Serialize;

use crate::events::{CustomerRequestKind, KitchenLoadChange, RouteEvent, RouteEventPayload, TrafficIncident};
use crate::haversine::distance_km;
use crate::model::{Coordinate, OrderId, StopRole, TrafficCondition};
use crate::state::RouteReoptimizationState;

/// Incidents further than this from every pending stop have no impact.
const IMPACT_RADIUS_KM: f64 = 5.0;

const MIN_LOAD_CHANGE: f64 = 0.2;

const ORDER_READY_CONFIDENCE: f64 = 0.7;
const CUSTOMER_REQUEST_CONFIDENCE: f64 = 0.8;
const EARLY_SIGNAL_SAVING_MINS: i64 = 8;

const LATENESS_CONFIDENCE: f64 = 0.6;
const LATENESS_RECOVERY_SHARE: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReoptimizationAnalysis {
    pub is_recommended: bool,
    pub reason: String,
    pub confidence: f64,
    pub estimated_time_saving: SignedDuration,
    pub priority: Priority,
}

impl ReoptimizationAnalysis {
    pub fn recommended(
        reason: impl Into<String>,
        confidence: f64,
        estimated_time_saving: SignedDuration,
        priority: Priority,
    ) -> Self {
        Self {
            is_recommended: true,
            reason: reason.into(),
            confidence: confidence.clamp(0.0, 1.0),
            estimated_time_saving,
            priority,
        }
    }

    pub fn not_recommended(reason: impl Into<String>) -> Self {
        Self {
            is_recommended: false,
            reason: reason.into(),
            confidence: 0.0,
            estimated_time_saving: SignedDuration::ZERO,
            priority: Priority::Low,
        }
    }
}

/// Impact analysis for one event against the current state of its route.
pub fn analyze_event(state: &RouteReoptimizationState, event: &RouteEvent) -> ReoptimizationAnalysis {
    match &event.payload {
        RouteEventPayload::TrafficIncident(incident) => analyze_traffic_incident(state, incident),
        RouteEventPayload::PreparationDelay(change) => analyze_kitchen_load(state, change),
        RouteEventPayload::OrderReady { order_id } => analyze_order_ready(state, order_id),
        RouteEventPayload::CustomerRequest { order_id, kind } => analyze_customer_request(state, order_id, *kind),
        RouteEventPayload::DriverLocation { .. } => {
            ReoptimizationAnalysis::not_recommended("location updates are handled by periodic monitoring")
        }
        RouteEventPayload::WaypointCompleted { .. } => {
            ReoptimizationAnalysis::not_recommended("waypoint completion only updates progress")
        }
    }
}

/// Share of the route affected by something at `location`, in `[0, 1]`.
///
/// 1.0 when a pending stop sits on top of it, 0.0 when none is within
/// [`IMPACT_RADIUS_KM`].
pub fn route_impact(state: &RouteReoptimizationState, location: Coordinate) -> f64 {
    state
        .pending_waypoints()
        .map(|waypoint| {
            let km = distance_km(waypoint.stop.location, location);
            (IMPACT_RADIUS_KM - km).clamp(0.0, IMPACT_RADIUS_KM) / IMPACT_RADIUS_KM
        })
        .fold(0.0, f64::max)
}

pub fn analyze_traffic_incident(state: &RouteReoptimizationState, incident: &TrafficIncident) -> ReoptimizationAnalysis {
    let impact = route_impact(state, incident.location);
    let delay = incident.delay_minutes;

    let severe = incident.severity == TrafficCondition::Severe && delay > 20.0 && impact > 0.7;
    let heavy = incident.severity == TrafficCondition::Heavy && delay > 15.0 && impact > 0.5;
    let long = delay > 30.0 && impact > 0.3;
    if !(severe || heavy || long) {
        return ReoptimizationAnalysis::not_recommended(format!(
            "traffic incident below threshold (delay {delay:.0} min, impact {impact:.2})"
        ));
    }

    let priority = if incident.severity == TrafficCondition::Severe || delay > 45.0 {
        Priority::High
    } else {
        Priority::Medium
    };
    ReoptimizationAnalysis::recommended(
        format!("traffic incident adds {delay:.0} min near the route"),
        impact,
        minutes_f64(delay * impact / 2.0),
        priority,
    )
}

pub fn analyze_kitchen_load(state: &RouteReoptimizationState, change: &KitchenLoadChange) -> ReoptimizationAnalysis {
    let magnitude = change.magnitude();
    if magnitude < MIN_LOAD_CHANGE {
        return ReoptimizationAnalysis::not_recommended("kitchen load change too small");
    }

    let affected = state
        .pending_waypoints()
        .filter(|waypoint| waypoint.role() == StopRole::Pickup)
        .filter(|waypoint| waypoint.stop.vendor_id.as_ref() == Some(&change.vendor_id))
        .count();
    if affected == 0 {
        return ReoptimizationAnalysis::not_recommended(format!(
            "no pending pickups at vendor {}",
            change.vendor_id
        ));
    }

    let priority = if magnitude >= 0.5 {
        Priority::High
    } else if magnitude >= 0.3 {
        Priority::Medium
    } else {
        Priority::Low
    };
    ReoptimizationAnalysis::recommended(
        format!("kitchen load at vendor {} changed by {magnitude:.2}", change.vendor_id),
        (0.5 + magnitude).min(0.9),
        minutes_f64(magnitude * 10.0 * affected as f64),
        priority,
    )
}

pub fn analyze_order_ready(state: &RouteReoptimizationState, order_id: &OrderId) -> ReoptimizationAnalysis {
    if !state.has_pending_pickup(order_id) {
        return ReoptimizationAnalysis::not_recommended(format!("order {order_id} has no pending pickup"));
    }
    ReoptimizationAnalysis::recommended(
        format!("order {order_id} is ready early"),
        ORDER_READY_CONFIDENCE,
        SignedDuration::from_mins(EARLY_SIGNAL_SAVING_MINS),
        Priority::Medium,
    )
}

pub fn analyze_customer_request(
    state: &RouteReoptimizationState,
    order_id: &OrderId,
    kind: CustomerRequestKind,
) -> ReoptimizationAnalysis {
    if !kind.affects_route() {
        return ReoptimizationAnalysis::not_recommended("customer request does not affect the route");
    }
    if !state.has_pending_waypoint(order_id) {
        return ReoptimizationAnalysis::not_recommended(format!("order {order_id} has no pending stops"));
    }
    ReoptimizationAnalysis::recommended(
        format!("customer request {kind:?} for order {order_id}"),
        CUSTOMER_REQUEST_CONFIDENCE,
        SignedDuration::from_mins(EARLY_SIGNAL_SAVING_MINS),
        Priority::High,
    )
}

/// Periodic check: is the driver running late for the next pending stop?
pub fn analyze_lateness(
    state: &RouteReoptimizationState,
    now: Timestamp,
    threshold: SignedDuration,
) -> ReoptimizationAnalysis {
    let Some(next) = state.pending_waypoints().next() else {
        return ReoptimizationAnalysis::not_recommended("route has no pending stops");
    };

    let lateness = now.duration_since(next.estimated_arrival);
    if lateness <= threshold {
        return ReoptimizationAnalysis::not_recommended("route on schedule");
    }
    ReoptimizationAnalysis::recommended(
        format!(
            "{} min behind schedule for order {}",
            lateness.as_mins(),
            next.order_id()
        ),
        LATENESS_CONFIDENCE,
        minutes_f64(lateness.as_secs_f64() / 60.0 * LATENESS_RECOVERY_SHARE),
        Priority::Medium,
    )
}

/// Saturates at [`SignedDuration::MAX`]; producers may report any delay.
fn minutes_f64(minutes: f64) -> SignedDuration {
    if minutes.is_finite() && minutes > 0.0 {
        SignedDuration::try_from_secs_f64(minutes * 60.0).unwrap_or(SignedDuration::MAX)
    } else {
        SignedDuration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineOptions;
    use crate::engine::RouteOptimizer;
    use crate::model::{DriverId, Order, VendorId};

    const DRIVER: Coordinate = Coordinate::new(3.1390, 101.6869);

    fn state() -> RouteReoptimizationState {
        let orders = vec![
            Order::new("o1", Some(Coordinate::new(3.1420, 101.6890)), Coordinate::new(3.1450, 101.6950))
                .with_vendor("v1"),
            Order::new("o2", Some(Coordinate::new(3.1360, 101.6840)), Coordinate::new(3.1330, 101.6800))
                .with_vendor("v2"),
        ];
        let route = RouteOptimizer::new(EngineOptions::default())
            .prepare(&orders, DRIVER, None, Timestamp::UNIX_EPOCH)
            .unwrap()
            .build_sequence(&[0, 1])
            .unwrap();
        RouteReoptimizationState::new(DriverId::new("d1"), route, Timestamp::UNIX_EPOCH, 50)
    }

    fn event(state: &RouteReoptimizationState, payload: RouteEventPayload) -> RouteEvent {
        RouteEvent::new(state.route_id().clone(), payload, Timestamp::UNIX_EPOCH)
    }

    #[test]
    fn impact_is_one_on_top_of_a_stop_and_zero_far_away() {
        let state = state();
        let on_stop = state.current_route().waypoints[0].stop.location;
        assert!((route_impact(&state, on_stop) - 1.0).abs() < 1e-12);
        assert_eq!(route_impact(&state, Coordinate::new(1.3521, 103.8198)), 0.0);
    }

    #[test]
    fn severe_nearby_incident_is_high_priority() {
        let state = state();
        let stop = state.current_route().waypoints[0].stop.location;
        let incident = TrafficIncident {
            location: Coordinate::new(stop.lat + 0.005, stop.lng),
            severity: TrafficCondition::Severe,
            delay_minutes: 30.0,
        };
        let analysis = analyze_traffic_incident(&state, &incident);
        assert!(analysis.is_recommended);
        assert_eq!(analysis.priority, Priority::High);
        assert!(analysis.estimated_time_saving > SignedDuration::ZERO);
    }

    #[test]
    fn moderate_short_incident_is_ignored() {
        let state = state();
        let stop = state.current_route().waypoints[0].stop.location;
        let incident = TrafficIncident {
            location: stop,
            severity: TrafficCondition::Moderate,
            delay_minutes: 10.0,
        };
        assert!(!analyze_traffic_incident(&state, &incident).is_recommended);
    }

    #[test]
    fn long_delay_recommends_with_medium_priority() {
        let state = state();
        let stop = state.current_route().waypoints[0].stop.location;
        let incident = TrafficIncident {
            location: Coordinate::new(stop.lat + 0.02, stop.lng),
            severity: TrafficCondition::Moderate,
            delay_minutes: 35.0,
        };
        let analysis = analyze_traffic_incident(&state, &incident);
        assert!(analysis.is_recommended);
        assert_eq!(analysis.priority, Priority::Medium);
    }

    #[test]
    fn absurd_delay_saturates_the_estimate() {
        let state = state();
        let stop = state.current_route().waypoints[0].stop.location;
        let incident = TrafficIncident {
            location: stop,
            severity: TrafficCondition::Severe,
            delay_minutes: 1e18,
        };
        let analysis = analyze_traffic_incident(&state, &incident);
        assert!(analysis.is_recommended);
        assert_eq!(analysis.estimated_time_saving, SignedDuration::MAX);
    }

    #[test]
    fn completed_stops_do_not_count_toward_impact() {
        let mut state = state();
        let far_stop = Coordinate::new(3.1450, 101.6950);
        let before = route_impact(&state, far_stop);
        state.mark_completed(OrderId::new("o1"), StopRole::Delivery);
        assert!(route_impact(&state, far_stop) < before);
    }

    #[test]
    fn kitchen_load_priority_scales_with_change() {
        let state = state();
        let change = |current_load| KitchenLoadChange {
            vendor_id: VendorId::new("v1"),
            previous_load: 0.2,
            current_load,
        };

        assert!(!analyze_kitchen_load(&state, &change(0.3)).is_recommended);
        assert_eq!(analyze_kitchen_load(&state, &change(0.45)).priority, Priority::Low);
        assert_eq!(analyze_kitchen_load(&state, &change(0.55)).priority, Priority::Medium);
        let high = analyze_kitchen_load(&state, &change(0.9));
        assert_eq!(high.priority, Priority::High);
        assert!((high.confidence - 0.9).abs() < 1e-12);
    }

    #[test]
    fn kitchen_load_at_unrelated_vendor_is_ignored() {
        let state = state();
        let change = KitchenLoadChange {
            vendor_id: VendorId::new("elsewhere"),
            previous_load: 0.1,
            current_load: 0.9,
        };
        assert!(!analyze_kitchen_load(&state, &change).is_recommended);
    }

    #[test]
    fn order_ready_requires_pending_pickup() {
        let mut state = state();
        let ready = event(&state, RouteEventPayload::OrderReady { order_id: OrderId::new("o1") });
        let analysis = analyze_event(&state, &ready);
        assert!(analysis.is_recommended);
        assert_eq!(analysis.priority, Priority::Medium);
        assert_eq!(analysis.estimated_time_saving, SignedDuration::from_mins(8));

        let unknown = event(&state, RouteEventPayload::OrderReady { order_id: OrderId::new("o9") });
        assert!(!analyze_event(&state, &unknown).is_recommended);

        state.mark_completed(OrderId::new("o1"), StopRole::Pickup);
        assert!(!analyze_event(&state, &ready).is_recommended);
    }

    #[test]
    fn customer_requests_follow_the_high_priority_path() {
        let state = state();
        let urgent = analyze_customer_request(&state, &OrderId::new("o2"), CustomerRequestKind::UrgentDelivery);
        assert!(urgent.is_recommended);
        assert_eq!(urgent.priority, Priority::High);

        let other = analyze_customer_request(&state, &OrderId::new("o2"), CustomerRequestKind::Other);
        assert!(!other.is_recommended);
    }

    #[test]
    fn location_updates_never_recommend() {
        let state = state();
        let moved = event(&state, RouteEventPayload::DriverLocation { location: DRIVER });
        assert!(!analyze_event(&state, &moved).is_recommended);
    }

    #[test]
    fn lateness_beyond_threshold_is_flagged() {
        let state = state();
        let first_eta = state.current_route().waypoints[0].estimated_arrival;
        let threshold = SignedDuration::from_mins(10);

        let on_time = analyze_lateness(&state, first_eta + SignedDuration::from_mins(5), threshold);
        assert!(!on_time.is_recommended);

        let late = analyze_lateness(&state, first_eta + SignedDuration::from_mins(20), threshold);
        assert!(late.is_recommended);
        assert_eq!(late.estimated_time_saving, SignedDuration::from_mins(6));
    }
}
