//! Gate, analyze, solve and accept: one pass of the reoptimization loop.
//!
//! Synchronous. The async controller runs it on a blocking worker and only
//! moves [`RouteReoptimizationState`] in and out of it.

use std::sync::Arc;

use jiff::{SignedDuration, Timestamp};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::analysis::{ReoptimizationAnalysis, analyze_event, analyze_lateness};
use crate::config::{AcceptanceThresholds, ControllerConfig};
use crate::engine::RouteOptimizer;
use crate::error::ReoptimizationError;
use crate::events::{RouteEvent, RouteEventPayload};
use crate::model::{Coordinate, DriverId, OptimizedRoute, Order, OrderId, RouteId, RouteWaypoint, StopRole};
use crate::route_builder::RouteIdentity;
use crate::state::RouteReoptimizationState;
use crate::traits::{Clock, DriverLocationProvider, RouteStore, SystemClock};

/// Savings of a candidate route over the current one. Positive is better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouteImprovement {
    pub time_saving: SignedDuration,
    pub distance_saving_km: f64,
    /// Difference of the 0-1 sequence scores.
    pub score_improvement: f64,
}

impl RouteImprovement {
    pub fn between(current: &OptimizedRoute, candidate: &OptimizedRoute) -> Self {
        Self {
            time_saving: current.traffic_adjusted_duration - candidate.traffic_adjusted_duration,
            distance_saving_km: current.total_distance_km - candidate.total_distance_km,
            score_improvement: (candidate.optimization_score - current.optimization_score) / 100.0,
        }
    }

    pub fn is_significant(&self, thresholds: &AcceptanceThresholds) -> bool {
        self.time_saving > thresholds.min_time_saving
            || self.distance_saving_km > thresholds.min_distance_saving_km
            || self.score_improvement > thresholds.min_score_improvement
    }
}

/// Published on every accepted reoptimization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteUpdate {
    pub route_id: RouteId,
    pub driver_id: DriverId,
    pub waypoints: Vec<RouteWaypoint>,
    pub optimization_score: f64,
    pub reason: String,
    pub improvement: RouteImprovement,
    pub timestamp: Timestamp,
}

/// Driver-facing message for an accepted reoptimization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverNotification {
    pub driver_id: DriverId,
    pub route_id: RouteId,
    pub title: String,
    pub message: String,
    pub time_saved: SignedDuration,
    pub distance_saved_km: f64,
    pub timestamp: Timestamp,
}

/// What happened to one event or tick.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// Event id already processed.
    Duplicate,
    /// Progress or location bookkeeping only.
    Recorded,
    CoolingDown { remaining: SignedDuration },
    RateLimited { count: usize },
    NotRecommended(ReoptimizationAnalysis),
    /// Every remaining order is delivered.
    NothingToOptimize(ReoptimizationAnalysis),
    /// Candidate not better enough; the current route stays.
    Rejected {
        analysis: ReoptimizationAnalysis,
        improvement: RouteImprovement,
    },
    Accepted {
        analysis: ReoptimizationAnalysis,
        update: RouteUpdate,
        notification: DriverNotification,
    },
    /// Collaborator or solver failure; the current route stays.
    Failed {
        analysis: ReoptimizationAnalysis,
        error: ReoptimizationError,
    },
}

impl EventOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, EventOutcome::Accepted { .. })
    }
}

#[derive(Clone)]
pub struct ReoptimizationPipeline {
    optimizer: RouteOptimizer,
    locations: Arc<dyn DriverLocationProvider>,
    store: Arc<dyn RouteStore>,
    clock: Arc<dyn Clock>,
    config: ControllerConfig,
}

impl ReoptimizationPipeline {
    pub fn new(
        optimizer: RouteOptimizer,
        locations: Arc<dyn DriverLocationProvider>,
        store: Arc<dyn RouteStore>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            optimizer,
            locations,
            store,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replaces the wall clock that cooldown, rate limit and lateness run on.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Processes one event.
    ///
    /// Cooldown and rate limit run on the pipeline clock, never on the
    /// producer's timestamp; the event timestamp only sets when the re-solved
    /// route departs.
    pub fn handle_event(&self, state: &mut RouteReoptimizationState, event: &RouteEvent) -> EventOutcome {
        if !state.remember_event(&event.id) {
            debug!(route_id = %state.route_id(), event_id = %event.id, "duplicate event ignored");
            return EventOutcome::Duplicate;
        }

        match &event.payload {
            RouteEventPayload::DriverLocation { location } => {
                state.update_location(*location);
                return EventOutcome::Recorded;
            }
            RouteEventPayload::WaypointCompleted { order_id, role } => {
                debug!(route_id = %state.route_id(), order_id = %order_id, ?role, "waypoint completed");
                state.mark_completed(order_id.clone(), *role);
                return EventOutcome::Recorded;
            }
            _ => {}
        }

        let now = self.clock.now();
        if let Some(gated) = self.gate(state, now) {
            return gated;
        }
        let analysis = analyze_event(state, event);
        self.act_on(state, analysis, now, event.timestamp)
    }

    /// Periodic lateness check, run on every monitoring tick.
    pub fn periodic_check(&self, state: &mut RouteReoptimizationState, now: Timestamp) -> EventOutcome {
        if let Some(gated) = self.gate(state, now) {
            return gated;
        }
        let analysis = analyze_lateness(state, now, self.config.late_arrival_threshold);
        self.act_on(state, analysis, now, now)
    }

    fn gate(&self, state: &mut RouteReoptimizationState, now: Timestamp) -> Option<EventOutcome> {
        if let Some(remaining) = state.cooldown_remaining(now, self.config.cooldown) {
            debug!(route_id = %state.route_id(), remaining = %remaining, "cooling down");
            return Some(EventOutcome::CoolingDown { remaining });
        }

        let count = state.reoptimizations_within(now, self.config.rate_limit_window);
        if count >= self.config.max_reoptimizations {
            debug!(route_id = %state.route_id(), count, "rate limited");
            return Some(EventOutcome::RateLimited { count });
        }
        None
    }

    fn act_on(
        &self,
        state: &mut RouteReoptimizationState,
        analysis: ReoptimizationAnalysis,
        now: Timestamp,
        departure: Timestamp,
    ) -> EventOutcome {
        if !analysis.is_recommended {
            debug!(route_id = %state.route_id(), reason = %analysis.reason, "reoptimization not recommended");
            return EventOutcome::NotRecommended(analysis);
        }

        let (baseline, candidate) = match self.candidate(state, departure) {
            Ok(Some(routes)) => routes,
            Ok(None) => return EventOutcome::NothingToOptimize(analysis),
            Err(error) => {
                warn!(route_id = %state.route_id(), error = %error, "reoptimization failed, keeping current route");
                return EventOutcome::Failed { analysis, error };
            }
        };

        let improvement = RouteImprovement::between(&baseline, &candidate);
        if !improvement.is_significant(&self.config.acceptance) {
            debug!(
                route_id = %state.route_id(),
                time_saving = %improvement.time_saving,
                distance_saving_km = improvement.distance_saving_km,
                score_improvement = improvement.score_improvement,
                "candidate rejected"
            );
            return EventOutcome::Rejected { analysis, improvement };
        }

        // Persist first so a store failure leaves state untouched.
        if let Err(err) = self.store.replace_route(&candidate) {
            warn!(route_id = %state.route_id(), error = %err, "failed to persist reoptimized route");
            return EventOutcome::Failed {
                analysis,
                error: err.into(),
            };
        }

        let update = RouteUpdate {
            route_id: state.route_id().clone(),
            driver_id: state.driver_id().clone(),
            waypoints: candidate.waypoints.clone(),
            optimization_score: candidate.optimization_score,
            reason: analysis.reason.clone(),
            improvement,
            timestamp: now,
        };
        let notification = notify(state.driver_id(), state.route_id(), &improvement, now);
        info!(
            route_id = %state.route_id(),
            reason = %analysis.reason,
            time_saving = %improvement.time_saving,
            distance_saving_km = improvement.distance_saving_km,
            "route reoptimized"
        );
        state.record_reoptimization(candidate, now);

        EventOutcome::Accepted {
            analysis,
            update,
            notification,
        }
    }

    /// Current visiting order and the solver's best, both rebuilt over the
    /// same remaining orders from the same position. Orders already picked up
    /// only contribute their delivery.
    fn candidate(
        &self,
        state: &RouteReoptimizationState,
        departure: Timestamp,
    ) -> Result<Option<(OptimizedRoute, OptimizedRoute)>, ReoptimizationError> {
        let orders: Vec<Order> = self
            .store
            .remaining_orders(state.route_id())?
            .into_iter()
            .filter(|order| !state.is_delivered(&order.id))
            .collect();
        if orders.is_empty() {
            return Ok(None);
        }

        let collected: Vec<&OrderId> = orders
            .iter()
            .filter(|order| state.is_completed(&order.id, StopRole::Pickup))
            .map(|order| &order.id)
            .collect();

        let location = self.driver_location(state)?;
        let current = state.current_route();
        let batch = self
            .optimizer
            .prepare(&orders, location, Some(current.criteria), departure)?
            .with_identity(RouteIdentity {
                route_id: current.id.clone(),
                batch_id: current.batch_id.clone(),
            })
            .with_collected(collected);

        let baseline = batch.build_sequence(&batch.sequence_for(current.order_sequence()))?;
        let candidate = batch.solve(&mut self.optimizer.rng())?;
        Ok(Some((baseline, candidate)))
    }

    fn driver_location(&self, state: &RouteReoptimizationState) -> Result<Coordinate, ReoptimizationError> {
        match self.locations.current_location(state.driver_id()) {
            Ok(location) => Ok(location),
            Err(err) => match state.last_known_location() {
                Some(location) => {
                    warn!(driver_id = %state.driver_id(), error = %err, "using last known driver location");
                    Ok(location)
                }
                None => Err(err.into()),
            },
        }
    }
}

fn notify(
    driver_id: &DriverId,
    route_id: &RouteId,
    improvement: &RouteImprovement,
    at: Timestamp,
) -> DriverNotification {
    let minutes = improvement.time_saving.as_secs_f64() / 60.0;
    DriverNotification {
        driver_id: driver_id.clone(),
        route_id: route_id.clone(),
        title: "Route updated".to_string(),
        message: format!(
            "Your route was reoptimized: {:.0} min and {:.1} km saved",
            minutes.max(0.0),
            improvement.distance_saving_km.max(0.0)
        ),
        time_saved: improvement.time_saving,
        distance_saved_km: improvement.distance_saving_km,
        timestamp: at,
    }
}
