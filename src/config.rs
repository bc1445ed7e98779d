//! Tunables for the optimizer and the reoptimization controller.
//!
//! Every field has a default; partial configs deserialize with the rest filled in.

use jiff::SignedDuration;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Assumed average driving speed in km/h.
    pub average_speed_kmh: f64,
    pub pickup_dwell: SignedDuration,
    pub delivery_dwell: SignedDuration,
    /// Multiplier turning total duration into traffic-adjusted duration.
    pub traffic_factor: f64,
    /// Route length at which the distance score reaches zero.
    pub distance_ceiling_km: f64,
    /// Waiting time for an unready order at which its preparation score reaches zero.
    pub preparation_grace_minutes: f64,
    /// Largest order count solved exactly.
    pub exact_max_orders: usize,
    /// Largest order count solved by the genetic algorithm; above it the hybrid heuristic runs.
    pub genetic_max_orders: usize,
    pub genetic: GeneticParams,
    pub annealing: AnnealingParams,
    /// Distinct starting orders tried by the nearest-neighbour heuristic.
    pub nearest_neighbor_starts: usize,
    /// Cap on full 2-opt passes.
    pub two_opt_max_passes: usize,
    /// Seed for the randomized solvers. `None` seeds from entropy on every solve.
    pub seed: Option<u64>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            average_speed_kmh: 40.0,
            pickup_dwell: SignedDuration::from_mins(5),
            delivery_dwell: SignedDuration::from_mins(3),
            traffic_factor: 1.2,
            distance_ceiling_km: 50.0,
            preparation_grace_minutes: 30.0,
            exact_max_orders: 4,
            genetic_max_orders: 8,
            genetic: GeneticParams::default(),
            annealing: AnnealingParams::default(),
            nearest_neighbor_starts: 3,
            two_opt_max_passes: 50,
            seed: None,
        }
    }
}

impl EngineOptions {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Driving time for `km` at the average speed. Saturates instead of overflowing.
    pub fn travel_time(&self, km: f64) -> SignedDuration {
        if self.average_speed_kmh <= 0.0 || !km.is_finite() {
            return SignedDuration::ZERO;
        }
        SignedDuration::try_from_secs_f64(km / self.average_speed_kmh * 3600.0).unwrap_or(SignedDuration::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneticParams {
    pub population_size: usize,
    pub generations: usize,
    /// Share of the population carried over unchanged.
    pub elite_ratio: f64,
    pub tournament_size: usize,
    pub mutation_rate: f64,
    /// Share of the initial population that is random permutations.
    pub random_share: f64,
}

impl Default for GeneticParams {
    fn default() -> Self {
        Self {
            population_size: 50,
            generations: 100,
            elite_ratio: 0.1,
            tournament_size: 3,
            mutation_rate: 0.1,
            random_share: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnealingParams {
    pub initial_temperature: f64,
    /// Temperature multiplier applied after every iteration.
    pub cooling_rate: f64,
    pub iterations: usize,
}

impl Default for AnnealingParams {
    fn default() -> Self {
        Self {
            initial_temperature: 1000.0,
            cooling_rate: 0.95,
            iterations: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Minimum time between accepted reoptimizations of one route.
    pub cooldown: SignedDuration,
    /// Maximum accepted reoptimizations within `rate_limit_window`.
    pub max_reoptimizations: usize,
    pub rate_limit_window: SignedDuration,
    /// Period of the monitoring tick.
    pub tick_interval: SignedDuration,
    /// Number of processed event ids remembered for duplicate suppression.
    pub event_history: usize,
    /// Capacity of each route's event queue.
    pub channel_capacity: usize,
    /// Lateness on the next pending waypoint that flags the route on a tick.
    pub late_arrival_threshold: SignedDuration,
    pub acceptance: AcceptanceThresholds,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            cooldown: SignedDuration::from_mins(5),
            max_reoptimizations: 6,
            rate_limit_window: SignedDuration::from_hours(1),
            tick_interval: SignedDuration::from_mins(2),
            event_history: 50,
            channel_capacity: 64,
            late_arrival_threshold: SignedDuration::from_mins(10),
            acceptance: AcceptanceThresholds::default(),
        }
    }
}

/// A candidate route replaces the current one only if it beats one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptanceThresholds {
    pub min_time_saving: SignedDuration,
    pub min_distance_saving_km: f64,
    pub min_score_improvement: f64,
}

impl Default for AcceptanceThresholds {
    fn default() -> Self {
        Self {
            min_time_saving: SignedDuration::from_mins(5),
            min_distance_saving_km: 2.0,
            min_score_improvement: 0.1,
        }
    }
}
