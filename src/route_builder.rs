//! Expands an order sequence into a timed list of waypoints.

use jiff::{SignedDuration, Timestamp};

use crate::config::EngineOptions;
use crate::error::PlannerError;
use crate::matrix::{delivery_index, pickup_index, ORIGIN_INDEX};
use crate::model::{BatchId, OptimizationCriteria, OptimizedRoute, Order, RouteId, RouteWaypoint, StopRole, TrafficCondition};
use crate::scoring::{is_permutation, ScoringContext};

/// Identifiers stamped on a built route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteIdentity {
    pub route_id: RouteId,
    pub batch_id: BatchId,
}

impl RouteIdentity {
    pub fn generate() -> Self {
        Self {
            route_id: RouteId::generate(),
            batch_id: BatchId::generate(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteBuilder<'o> {
    options: &'o EngineOptions,
}

impl<'o> RouteBuilder<'o> {
    pub fn new(options: &'o EngineOptions) -> Self {
        Self { options }
    }

    /// Visits every pickup in `sequence` order, then every delivery in the same order.
    /// Orders already collected get no pickup stop.
    ///
    /// `orders` must be the order list `context` was built from.
    pub fn build(
        &self,
        orders: &[Order],
        sequence: &[usize],
        context: &ScoringContext,
        criteria: &OptimizationCriteria,
        identity: RouteIdentity,
    ) -> Result<OptimizedRoute, PlannerError> {
        let n = orders.len();
        if n == 0 {
            return Err(PlannerError::EmptyOrders);
        }
        if context.order_count() != n || !is_permutation(sequence, n) {
            return Err(PlannerError::InvalidSequence {
                orders: n,
                sequence: sequence.to_vec(),
            });
        }

        let legs = sequence
            .iter()
            .filter(|&&order| !context.is_collected(order))
            .map(|&order| (order, StopRole::Pickup))
            .chain(sequence.iter().map(|&order| (order, StopRole::Delivery)));

        let matrix = context.matrix();
        let mut waypoints = Vec::with_capacity(2 * n);
        let mut clock = context.departure();
        let mut previous = ORIGIN_INDEX;
        let mut total_distance_km = 0.0;
        let mut total_duration = SignedDuration::ZERO;

        for (position, (order, role)) in legs.enumerate() {
            let (point, dwell, stop) = match role {
                StopRole::Pickup => (
                    pickup_index(order),
                    self.options.pickup_dwell,
                    orders[order].pickup_stop(context.window(order).cloned()),
                ),
                StopRole::Delivery => (
                    delivery_index(order, n),
                    self.options.delivery_dwell,
                    orders[order].delivery_stop(),
                ),
            };

            let km = matrix.get(previous, point);
            let travel = self.options.travel_time(km);
            clock = clock.checked_add(travel).unwrap_or(Timestamp::MAX);

            waypoints.push(RouteWaypoint {
                sequence: position,
                stop,
                estimated_arrival: clock,
                dwell,
                distance_from_previous_km: km,
            });

            clock = clock.checked_add(dwell).unwrap_or(Timestamp::MAX);
            total_distance_km += km;
            total_duration = total_duration.saturating_add(travel).saturating_add(dwell);
            previous = point;
        }

        let traffic_adjusted_duration =
            SignedDuration::try_from_secs_f64(total_duration.as_secs_f64() * self.options.traffic_factor)
                .unwrap_or(SignedDuration::MAX);

        Ok(OptimizedRoute {
            id: identity.route_id,
            batch_id: identity.batch_id,
            waypoints,
            total_distance_km,
            total_duration,
            traffic_adjusted_duration,
            optimization_score: context.evaluate_sequence(sequence, criteria) * 100.0,
            criteria: *criteria,
            calculated_at: context.departure(),
            traffic: TrafficCondition::worst((0..n).map(|order| context.traffic(order))),
        })
    }
}
