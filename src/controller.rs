//! Registry of monitored routes and their workers.
//!
//! Each route gets a bounded queue drained by one task, so events for the same
//! route are evaluated strictly one after another while different routes run
//! in parallel. Solves happen on the blocking pool.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use jiff::Timestamp;
use tokio::sync::{RwLock, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::analysis::ReoptimizationAnalysis;
use crate::error::{ControllerError, ReoptimizationError};
use crate::events::RouteEvent;
use crate::model::{DriverId, OptimizedRoute, RouteId};
use crate::reoptimize::{DriverNotification, EventOutcome, ReoptimizationPipeline, RouteUpdate};
use crate::state::{RouteReoptimizationState, RoutePhase, RouteStatus};

struct Envelope {
    event: RouteEvent,
    reply: Option<oneshot::Sender<EventOutcome>>,
}

enum Job {
    Event(RouteEvent),
    Tick(Timestamp),
}

struct RouteMonitor {
    events: mpsc::Sender<Envelope>,
    status: watch::Receiver<RouteStatus>,
    shutdown: oneshot::Sender<()>,
    worker: JoinHandle<RouteReoptimizationState>,
}

#[derive(Clone)]
struct Outputs {
    updates: broadcast::Sender<RouteUpdate>,
    notifications: broadcast::Sender<DriverNotification>,
}

impl Outputs {
    fn publish(&self, outcome: &EventOutcome) {
        if let EventOutcome::Accepted {
            update, notification, ..
        } = outcome
        {
            if let Err(err) = self.updates.send(update.clone()) {
                debug!(route_id = %update.route_id, error = %err, "route update not delivered");
            }
            if let Err(err) = self.notifications.send(notification.clone()) {
                debug!(route_id = %notification.route_id, error = %err, "driver notification not delivered");
            }
        }
    }
}

/// Owns every monitored route. Share it behind an `Arc`.
pub struct ReoptimizationController {
    pipeline: Arc<ReoptimizationPipeline>,
    routes: RwLock<HashMap<RouteId, RouteMonitor>>,
    outputs: Outputs,
}

impl ReoptimizationController {
    pub fn new(pipeline: ReoptimizationPipeline) -> Self {
        let capacity = pipeline.config().channel_capacity.max(1);
        let (updates, _) = broadcast::channel(capacity);
        let (notifications, _) = broadcast::channel(capacity);
        Self {
            pipeline: Arc::new(pipeline),
            routes: RwLock::new(HashMap::new()),
            outputs: Outputs { updates, notifications },
        }
    }

    /// Starts monitoring `route` for `driver_id` under `route_id`.
    pub async fn initialize_route_monitoring(
        &self,
        driver_id: DriverId,
        route_id: RouteId,
        mut route: OptimizedRoute,
    ) -> Result<(), ControllerError> {
        if route.waypoints.is_empty() {
            return Err(ControllerError::EmptyRoute(route_id));
        }

        let mut routes = self.routes.write().await;
        if routes.contains_key(&route_id) {
            return Err(ControllerError::AlreadyMonitored(route_id));
        }

        route.id = route_id.clone();
        let config = self.pipeline.config();
        let state = RouteReoptimizationState::new(driver_id.clone(), route, self.pipeline.now(), config.event_history);
        let (status_tx, status_rx) = watch::channel(state.snapshot());
        let (events_tx, events_rx) = mpsc::channel(config.channel_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let worker = tokio::spawn(run_worker(
            Arc::clone(&self.pipeline),
            self.outputs.clone(),
            state,
            events_rx,
            shutdown_rx,
            status_tx,
        ));

        routes.insert(
            route_id.clone(),
            RouteMonitor {
                events: events_tx,
                status: status_rx,
                shutdown: shutdown_tx,
                worker,
            },
        );
        info!(route_id = %route_id, driver_id = %driver_id, "route monitoring started");
        Ok(())
    }

    /// Stops the worker and releases the route; returns its final status.
    ///
    /// Events still queued for the route are dropped.
    pub async fn stop_route_monitoring(&self, route_id: &RouteId) -> Result<RouteStatus, ControllerError> {
        let monitor = self
            .routes
            .write()
            .await
            .remove(route_id)
            .ok_or_else(|| ControllerError::NotMonitored(route_id.clone()))?;

        let last_status = monitor.status.borrow().clone();
        let _ = monitor.shutdown.send(());
        drop(monitor.events);

        let status = match monitor.worker.await {
            Ok(state) => state.snapshot(),
            Err(err) => {
                error!(route_id = %route_id, error = %err, "route worker ended abnormally");
                RouteStatus {
                    phase: RoutePhase::Stopped,
                    ..last_status
                }
            }
        };
        info!(route_id = %route_id, "route monitoring stopped");
        Ok(status)
    }

    /// Queues `event` for its route without waiting for the evaluation.
    ///
    /// Waits for queue space when the route is backed up.
    pub async fn submit(&self, event: RouteEvent) -> Result<(), ControllerError> {
        self.enqueue(Envelope { event, reply: None }).await
    }

    /// Queues `event` and waits until its route worker has evaluated it.
    pub async fn process(&self, event: RouteEvent) -> Result<EventOutcome, ControllerError> {
        let route_id = event.route_id.clone();
        let (reply, outcome) = oneshot::channel();
        self.enqueue(Envelope {
            event,
            reply: Some(reply),
        })
        .await?;
        outcome
            .await
            .map_err(|_| ControllerError::WorkerUnavailable(route_id))
    }

    async fn enqueue(&self, envelope: Envelope) -> Result<(), ControllerError> {
        let route_id = envelope.event.route_id.clone();
        // Never hold the registry lock across a send on a full queue.
        let sender = self
            .routes
            .read()
            .await
            .get(&route_id)
            .map(|monitor| monitor.events.clone())
            .ok_or_else(|| ControllerError::NotMonitored(route_id.clone()))?;

        sender
            .send(envelope)
            .await
            .map_err(|_| ControllerError::WorkerUnavailable(route_id))
    }

    pub async fn status(&self, route_id: &RouteId) -> Option<RouteStatus> {
        self.routes
            .read()
            .await
            .get(route_id)
            .map(|monitor| monitor.status.borrow().clone())
    }

    pub async fn monitored_routes(&self) -> Vec<RouteId> {
        self.routes.read().await.keys().cloned().collect()
    }

    /// Stream of accepted route changes across all routes.
    pub fn subscribe_updates(&self) -> broadcast::Receiver<RouteUpdate> {
        self.outputs.updates.subscribe()
    }

    /// Stream of driver-facing messages across all routes.
    pub fn subscribe_notifications(&self) -> broadcast::Receiver<DriverNotification> {
        self.outputs.notifications.subscribe()
    }
}

async fn run_worker(
    pipeline: Arc<ReoptimizationPipeline>,
    outputs: Outputs,
    mut state: RouteReoptimizationState,
    mut events: mpsc::Receiver<Envelope>,
    mut shutdown: oneshot::Receiver<()>,
    status: watch::Sender<RouteStatus>,
) -> RouteReoptimizationState {
    let period = Duration::try_from(pipeline.config().tick_interval)
        .unwrap_or_default()
        .max(Duration::from_millis(1));
    let mut tick = tokio::time::interval_at(Instant::now() + period, period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let (job, reply) = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            envelope = events.recv() => match envelope {
                Some(Envelope { event, reply }) => (Job::Event(event), reply),
                None => break,
            },
            _ = tick.tick() => (Job::Tick(pipeline.now()), None),
        };

        status.send_modify(|snapshot| snapshot.phase = RoutePhase::Evaluating);
        let (next, outcome) = evaluate(Arc::clone(&pipeline), state, job).await;
        state = next;
        status.send_replace(state.snapshot());

        outputs.publish(&outcome);
        if let Some(reply) = reply {
            // The caller may have stopped waiting.
            let _ = reply.send(outcome);
        }
    }

    state.stop();
    status.send_replace(state.snapshot());
    debug!(route_id = %state.route_id(), "route worker finished");
    state
}

/// Runs one job on the blocking pool. A panicking solve leaves the route as
/// it was before the job, marks the event as seen and reports `Failed`.
async fn evaluate(
    pipeline: Arc<ReoptimizationPipeline>,
    state: RouteReoptimizationState,
    job: Job,
) -> (RouteReoptimizationState, EventOutcome) {
    let mut fallback = state.clone();
    let event_id = match &job {
        Job::Event(event) => Some(event.id.clone()),
        Job::Tick(_) => None,
    };
    let task = tokio::task::spawn_blocking(move || {
        let mut state = state;
        let outcome = match job {
            Job::Event(event) => pipeline.handle_event(&mut state, &event),
            Job::Tick(now) => pipeline.periodic_check(&mut state, now),
        };
        (state, outcome)
    });

    match task.await {
        Ok(evaluated) => evaluated,
        Err(err) => {
            error!(route_id = %fallback.route_id(), error = %err, "evaluation task failed, keeping current route");
            if let Some(event_id) = event_id {
                fallback.remember_event(&event_id);
            }
            let outcome = EventOutcome::Failed {
                analysis: ReoptimizationAnalysis::not_recommended("evaluation aborted"),
                error: ReoptimizationError::Aborted(err.to_string()),
            };
            (fallback, outcome)
        }
    }
}
