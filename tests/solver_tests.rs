//! Solver family tests on real Kuala Lumpur locations.
//!
//! The randomised solvers are checked to land within a fixed score tolerance
//! of the brute-force optimum. Generated exact-solver cases live in
//! `property_tests.rs`.

mod fixtures;

use jiff::Timestamp;
use rand::SeedableRng;
use rand::rngs::SmallRng;

use delivery_planner::config::EngineOptions;
use delivery_planner::engine::{PreparedBatch, RouteOptimizer};
use delivery_planner::model::{OptimizationCriteria, Order, StopRole};
use delivery_planner::scoring::is_permutation;
use delivery_planner::solver::{ExactSolver, GeneticSolver, HybridSolver, SequenceProblem, SequenceSolver};

use fixtures::{DRIVER_START, city_orders, nearby_orders};

/// Randomised solvers must score within this of the optimum.
const SCORE_TOLERANCE: f64 = 0.02;

// ============================================================================
// Helpers
// ============================================================================

fn prepare<'e>(optimizer: &'e RouteOptimizer, orders: &[Order]) -> PreparedBatch<'e> {
    optimizer
        .prepare(orders, DRIVER_START, None, Timestamp::UNIX_EPOCH)
        .unwrap()
}

fn permutations(n: usize) -> Vec<Vec<usize>> {
    fn extend(prefix: &mut Vec<usize>, used: &mut [bool], out: &mut Vec<Vec<usize>>) {
        if prefix.len() == used.len() {
            out.push(prefix.clone());
            return;
        }
        for i in 0..used.len() {
            if !used[i] {
                used[i] = true;
                prefix.push(i);
                extend(prefix, used, out);
                prefix.pop();
                used[i] = false;
            }
        }
    }

    let mut out = Vec::new();
    extend(&mut Vec::new(), &mut vec![false; n], &mut out);
    out
}

fn brute_force_best(problem: &SequenceProblem<'_>) -> f64 {
    permutations(problem.order_count())
        .iter()
        .map(|sequence| problem.score(sequence))
        .fold(f64::NEG_INFINITY, f64::max)
}

fn rng(seed: u64) -> SmallRng {
    SmallRng::seed_from_u64(seed)
}

// ============================================================================
// Exact
// ============================================================================

#[test]
fn exact_respects_distance_heavy_criteria() {
    let optimizer = RouteOptimizer::new(EngineOptions::default());
    let criteria = OptimizationCriteria::new(0.7, 0.1, 0.1, 0.1).unwrap();
    let orders = city_orders(4);
    let batch = prepare(&optimizer, &orders);
    let problem = SequenceProblem::new(batch.context(), &criteria);

    let sequence = ExactSolver.solve(&problem, &mut rng(0));
    assert!((problem.score(&sequence) - brute_force_best(&problem)).abs() < 1e-9);
}

// ============================================================================
// Randomised solvers
// ============================================================================

#[test]
fn genetic_lands_near_optimum() {
    let options = EngineOptions::default();
    let optimizer = RouteOptimizer::new(options.clone());
    let criteria = OptimizationCriteria::default();
    let orders = city_orders(6);
    let batch = prepare(&optimizer, &orders);
    let problem = SequenceProblem::new(batch.context(), &criteria);

    let solver = GeneticSolver::new(options.genetic.clone());
    let sequence = solver.solve(&problem, &mut rng(11));
    assert!(is_permutation(&sequence, 6));
    let best = brute_force_best(&problem);
    assert!(problem.score(&sequence) >= best - SCORE_TOLERANCE);
}

#[test]
fn hybrid_lands_near_optimum() {
    let options = EngineOptions::default();
    let optimizer = RouteOptimizer::new(options.clone());
    let criteria = OptimizationCriteria::default();
    let orders = city_orders(7);
    let batch = prepare(&optimizer, &orders);
    let problem = SequenceProblem::new(batch.context(), &criteria);

    let solver = HybridSolver::new(
        options.annealing.clone(),
        options.nearest_neighbor_starts,
        options.two_opt_max_passes,
    );
    let sequence = solver.solve(&problem, &mut rng(5));
    assert!(is_permutation(&sequence, 7));
    let best = brute_force_best(&problem);
    assert!(problem.score(&sequence) >= best - SCORE_TOLERANCE);
}

#[test]
fn seeded_optimizer_is_deterministic_for_large_batches() {
    let optimizer = RouteOptimizer::new(EngineOptions::default().with_seed(42));
    let orders = city_orders(12);

    let first = prepare(&optimizer, &orders).solve(&mut optimizer.rng()).unwrap();
    let second = prepare(&optimizer, &orders).solve(&mut optimizer.rng()).unwrap();
    assert_eq!(first.order_sequence(), second.order_sequence());
    assert_eq!(first.optimization_score, second.optimization_score);
}

// ============================================================================
// End to end
// ============================================================================

#[test]
fn nearby_batch_scores_high_on_distance() {
    let optimizer = RouteOptimizer::new(EngineOptions::default());
    let orders = nearby_orders();
    let route = optimizer
        .calculate_optimal_route(&orders, DRIVER_START, None)
        .unwrap();

    let batch = prepare(&optimizer, &orders);
    let sequence = batch.sequence_for(route.order_sequence());
    let scores = batch.context().sub_scores(&sequence);
    assert!(scores.distance > 0.9, "distance score {}", scores.distance);
    assert!(route.total_distance_km < 5.0);
}

#[test]
fn route_visits_all_pickups_before_deliveries() {
    let optimizer = RouteOptimizer::new(EngineOptions::default().with_seed(3));
    let orders = city_orders(9);
    let route = optimizer
        .calculate_optimal_route(&orders, DRIVER_START, None)
        .unwrap();

    assert_eq!(route.waypoints.len(), 18);
    let first_delivery = route
        .waypoints
        .iter()
        .position(|waypoint| waypoint.role() == StopRole::Delivery)
        .unwrap();
    assert_eq!(first_delivery, 9);
    for (i, waypoint) in route.waypoints.iter().enumerate() {
        assert_eq!(waypoint.sequence, i);
    }
    assert!(route.optimization_score > 0.0 && route.optimization_score <= 100.0);
    assert!(route.traffic_adjusted_duration > route.total_duration);
}

#[test]
fn pickup_falls_back_to_delivery_location() {
    let optimizer = RouteOptimizer::new(EngineOptions::default());
    let mut orders = nearby_orders();
    orders[0].pickup = None;
    let route = optimizer
        .calculate_optimal_route(&orders, DRIVER_START, None)
        .unwrap();

    let pickup = route.waypoint(&orders[0].id, StopRole::Pickup).unwrap();
    assert_eq!(pickup.stop.location, orders[0].delivery);
}
