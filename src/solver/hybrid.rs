//! Hybrid heuristic for large batches.
//!
//! Nearest-neighbour construction from a few starting orders and simulated
//! annealing run side by side; 2-opt then polishes the better of the two.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::local::{best_starts, inversion_mutation, nearest_neighbor, random_permutation, swap_mutation, two_opt};
use super::{Candidate, SequenceProblem, SequenceSolver};
use crate::config::AnnealingParams;

#[derive(Debug, Clone)]
pub struct HybridSolver {
    annealing: AnnealingParams,
    starts: usize,
    two_opt_passes: usize,
}

impl HybridSolver {
    pub fn new(annealing: AnnealingParams, starts: usize, two_opt_passes: usize) -> Self {
        Self {
            annealing,
            starts,
            two_opt_passes,
        }
    }
}

impl SequenceSolver for HybridSolver {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    fn solve(&self, problem: &SequenceProblem<'_>, rng: &mut SmallRng) -> Vec<usize> {
        let annealing_seed: u64 = rng.r#gen();

        let (greedy, annealed) = rayon::join(
            || nearest_neighbor_variants(problem, self.starts),
            || {
                let mut rng = SmallRng::seed_from_u64(annealing_seed);
                simulated_annealing(problem, &self.annealing, &mut rng)
            },
        );

        let base = if annealed.score > greedy.score { &annealed } else { &greedy };
        let polished = two_opt(problem, base.clone(), self.two_opt_passes);

        greedy.best(annealed).best(polished).sequence
    }
}

/// Best nearest-neighbour sequence over up to `starts` distinct first orders.
fn nearest_neighbor_variants(problem: &SequenceProblem<'_>, starts: usize) -> Candidate {
    best_starts(problem, starts.max(1))
        .into_iter()
        .map(|start| problem.candidate(nearest_neighbor(problem, Some(start))))
        .reduce(Candidate::best)
        .unwrap_or_else(|| problem.candidate(Vec::new()))
}

/// Metropolis search over swap and inversion moves with geometric cooling.
fn simulated_annealing(problem: &SequenceProblem<'_>, params: &AnnealingParams, rng: &mut SmallRng) -> Candidate {
    let n = problem.order_count();
    let mut current = problem.candidate(random_permutation(n, rng));
    let mut best = current.clone();
    if n < 2 {
        return best;
    }

    let mut temperature = params.initial_temperature;
    for _ in 0..params.iterations {
        let mut neighbour = current.sequence.clone();
        if rng.gen_bool(0.5) {
            swap_mutation(&mut neighbour, rng);
        } else {
            inversion_mutation(&mut neighbour, rng);
        }
        let neighbour = problem.candidate(neighbour);

        let delta = neighbour.score - current.score;
        let accept = delta >= 0.0 || (temperature > 0.0 && rng.r#gen::<f64>() < (delta / temperature).exp());
        if accept {
            current = neighbour;
            if current.score > best.score {
                best = current.clone();
            }
        }

        temperature *= params.cooling_rate;
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineOptions;
    use crate::haversine::HaversineMatrix;
    use crate::matrix::DistanceMatrix;
    use crate::model::{Coordinate, OptimizationCriteria, Order, TrafficCondition};
    use crate::scoring::{ScoringContext, is_permutation};
    use jiff::Timestamp;

    fn context(n: usize) -> ScoringContext {
        let orders: Vec<Order> = (0..n)
            .map(|i| {
                let lng = 0.005 * (i as f64 + 1.0);
                Order::new(format!("o{i}"), Some(Coordinate::new(0.0, lng)), Coordinate::new(0.002, lng))
            })
            .collect();
        let matrix = DistanceMatrix::for_orders(Coordinate::new(0.0, 0.0), &orders, &HaversineMatrix).unwrap();
        ScoringContext::new(
            matrix,
            vec![None; n],
            vec![TrafficCondition::Clear; n],
            Timestamp::UNIX_EPOCH,
            &EngineOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn annealing_returns_permutation_no_worse_than_start() {
        let ctx = context(10);
        let criteria = OptimizationCriteria::default();
        let problem = SequenceProblem::new(&ctx, &criteria);
        let mut rng = SmallRng::seed_from_u64(4);

        let result = simulated_annealing(&problem, &AnnealingParams::default(), &mut rng);
        assert!(is_permutation(&result.sequence, 10));
        assert!((problem.score(&result.sequence) - result.score).abs() < 1e-12);
    }

    #[test]
    fn nearest_neighbor_walks_the_line() {
        let ctx = context(10);
        let criteria = OptimizationCriteria::default();
        let problem = SequenceProblem::new(&ctx, &criteria);

        let greedy = nearest_neighbor_variants(&problem, 3);
        assert_eq!(greedy.sequence, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn hybrid_is_deterministic_for_a_seed() {
        let ctx = context(12);
        let criteria = OptimizationCriteria::default();
        let problem = SequenceProblem::new(&ctx, &criteria);
        let solver = HybridSolver::new(AnnealingParams::default(), 3, 50);

        let first = solver.solve(&problem, &mut SmallRng::seed_from_u64(99));
        let second = solver.solve(&problem, &mut SmallRng::seed_from_u64(99));
        assert_eq!(first, second);
        assert!(is_permutation(&first, 12));
    }
}
