//! Route optimization entry point.
//!
//! Gathers the collaborator inputs for a batch, picks a solver, and turns the
//! winning sequence into an [`OptimizedRoute`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use jiff::Timestamp;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::{debug, warn};

use crate::config::EngineOptions;
use crate::error::PlannerError;
use crate::haversine::HaversineMatrix;
use crate::matrix::DistanceMatrix;
use crate::model::{Coordinate, OptimizationCriteria, OptimizedRoute, Order, OrderId, TrafficCondition};
use crate::route_builder::{RouteBuilder, RouteIdentity};
use crate::scoring::ScoringContext;
use crate::solver::{solve_sequence, SequenceProblem};
use crate::traffic::TimeOfDayTraffic;
use crate::traits::{DistanceMatrixProvider, NoPreparationData, PreparationPredictor, TrafficSource};

/// Computes optimal visiting orders for single-driver batches.
///
/// Stateless apart from configuration; safe to share across threads.
#[derive(Clone)]
pub struct RouteOptimizer {
    options: EngineOptions,
    matrix_provider: Arc<dyn DistanceMatrixProvider>,
    predictor: Arc<dyn PreparationPredictor>,
    traffic: Arc<dyn TrafficSource>,
}

impl RouteOptimizer {
    /// Haversine distances, no preparation data and simulated UTC traffic.
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            matrix_provider: Arc::new(HaversineMatrix),
            predictor: Arc::new(NoPreparationData),
            traffic: Arc::new(TimeOfDayTraffic::default()),
        }
    }

    pub fn with_matrix_provider(mut self, provider: impl DistanceMatrixProvider + 'static) -> Self {
        self.matrix_provider = Arc::new(provider);
        self
    }

    pub fn with_predictor(mut self, predictor: impl PreparationPredictor + 'static) -> Self {
        self.predictor = Arc::new(predictor);
        self
    }

    pub fn with_traffic_source(mut self, traffic: impl TrafficSource + 'static) -> Self {
        self.traffic = Arc::new(traffic);
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Best route for `orders` starting now from `driver_location`.
    ///
    /// Uses the default criteria when `criteria` is `None`.
    pub fn calculate_optimal_route(
        &self,
        orders: &[Order],
        driver_location: Coordinate,
        criteria: Option<OptimizationCriteria>,
    ) -> Result<OptimizedRoute, PlannerError> {
        self.prepare(orders, driver_location, criteria, Timestamp::now())?
            .solve(&mut self.rng())
    }

    /// Collects distances, preparation windows and traffic for a batch
    /// departing at `departure`, without solving it yet.
    pub fn prepare(
        &self,
        orders: &[Order],
        driver_location: Coordinate,
        criteria: Option<OptimizationCriteria>,
        departure: Timestamp,
    ) -> Result<PreparedBatch<'_>, PlannerError> {
        if orders.is_empty() {
            return Err(PlannerError::EmptyOrders);
        }

        let matrix = DistanceMatrix::for_orders(driver_location, orders, self.matrix_provider.as_ref())?;

        let mut predictions = self.predictor.predict(orders).unwrap_or_else(|err| {
            warn!(error = %err, "preparation predictions unavailable, scoring without them");
            HashMap::new()
        });
        let windows = orders.iter().map(|order| predictions.remove(&order.id)).collect();

        let conditions: HashMap<OrderId, TrafficCondition> = self
            .traffic
            .lookup(orders, driver_location, departure)
            .unwrap_or_else(|err| {
                warn!(error = %err, "traffic lookup failed, treating traffic as unknown");
                HashMap::new()
            });
        let traffic = orders
            .iter()
            .map(|order| conditions.get(&order.id).copied().unwrap_or_default())
            .collect();

        let context = ScoringContext::new(matrix, windows, traffic, departure, &self.options)?;
        debug!(orders = orders.len(), %departure, "batch prepared");

        Ok(PreparedBatch {
            options: &self.options,
            orders: orders.to_vec(),
            context,
            criteria: criteria.unwrap_or_default(),
            identity: RouteIdentity::generate(),
        })
    }

    /// Random source for one solve: seeded when configured, from entropy otherwise.
    pub fn rng(&self) -> SmallRng {
        match self.options.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        }
    }
}

/// A batch with all inputs gathered, ready to be solved or rebuilt in a fixed order.
pub struct PreparedBatch<'e> {
    options: &'e EngineOptions,
    orders: Vec<Order>,
    context: ScoringContext,
    criteria: OptimizationCriteria,
    identity: RouteIdentity,
}

impl PreparedBatch<'_> {
    /// Keeps the identifiers of an existing route instead of generating new ones.
    pub fn with_identity(mut self, identity: RouteIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Marks orders already in the vehicle: they keep their delivery but get
    /// no pickup stop, no pickup dwell and no preparation wait.
    pub fn with_collected<'a>(mut self, collected: impl IntoIterator<Item = &'a OrderId>) -> Self {
        let collected: HashSet<&OrderId> = collected.into_iter().collect();
        let flags = self.orders.iter().map(|order| collected.contains(&order.id)).collect();
        self.context = self.context.with_collected(flags);
        self
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn context(&self) -> &ScoringContext {
        &self.context
    }

    pub fn solve(&self, rng: &mut SmallRng) -> Result<OptimizedRoute, PlannerError> {
        let problem = SequenceProblem::new(&self.context, &self.criteria);
        let best = solve_sequence(&problem, self.options, rng);
        self.build_sequence(&best.sequence)
    }

    /// Builds the route visiting orders in `sequence` (indices into [`orders`](Self::orders)).
    pub fn build_sequence(&self, sequence: &[usize]) -> Result<OptimizedRoute, PlannerError> {
        RouteBuilder::new(self.options).build(
            &self.orders,
            sequence,
            &self.context,
            &self.criteria,
            self.identity.clone(),
        )
    }

    /// Indices of the batch orders following `preferred`; orders it does not
    /// mention are appended in batch order, unknown ids are skipped.
    pub fn sequence_for<'a>(&self, preferred: impl IntoIterator<Item = &'a OrderId>) -> Vec<usize> {
        let mut placed = vec![false; self.orders.len()];
        let mut sequence = Vec::with_capacity(self.orders.len());
        for order_id in preferred {
            if let Some(index) = self.orders.iter().position(|order| &order.id == order_id) {
                if !placed[index] {
                    placed[index] = true;
                    sequence.push(index);
                }
            }
        }
        sequence.extend((0..self.orders.len()).filter(|&index| !placed[index]));
        sequence
    }
}
