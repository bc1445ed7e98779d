//! Single-driver sequencing solvers.
//!
//! Every solver answers the same question: in which order should the driver
//! visit the orders of a batch? The answer is a permutation of order indices,
//! scored by [`ScoringContext::evaluate_sequence`]. Which algorithm runs is
//! decided once, by order count, in [`Strategy::select`].

mod exact;
mod genetic;
mod hybrid;
pub mod local;

use rand::rngs::SmallRng;
use tracing::debug;

use crate::config::EngineOptions;
use crate::model::OptimizationCriteria;
use crate::scoring::{ScoringContext, TransitionTable};

pub use exact::ExactSolver;
pub use genetic::GeneticSolver;
pub use hybrid::HybridSolver;

/// Inputs shared by all solvers: the scoring context (distances, traffic,
/// preparation windows), the criteria and the precomputed transition scores.
pub struct SequenceProblem<'a> {
    context: &'a ScoringContext,
    criteria: &'a OptimizationCriteria,
    transitions: TransitionTable,
}

impl<'a> SequenceProblem<'a> {
    pub fn new(context: &'a ScoringContext, criteria: &'a OptimizationCriteria) -> Self {
        Self {
            context,
            criteria,
            transitions: TransitionTable::new(context, criteria),
        }
    }

    pub fn order_count(&self) -> usize {
        self.context.order_count()
    }

    pub fn score(&self, sequence: &[usize]) -> f64 {
        self.context.evaluate_sequence(sequence, self.criteria)
    }

    pub fn transition(&self, from: Option<usize>, to: usize) -> f64 {
        self.transitions.get(from, to)
    }

    pub fn candidate(&self, sequence: Vec<usize>) -> Candidate {
        let score = self.score(&sequence);
        Candidate { sequence, score }
    }
}

/// A sequence together with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub sequence: Vec<usize>,
    pub score: f64,
}

impl Candidate {
    /// The better of two candidates; `self` wins ties.
    pub fn best(self, other: Candidate) -> Candidate {
        if other.score > self.score { other } else { self }
    }
}

pub trait SequenceSolver {
    fn name(&self) -> &'static str;

    /// Returns the best sequence found, a permutation of `0..problem.order_count()`.
    fn solve(&self, problem: &SequenceProblem<'_>, rng: &mut SmallRng) -> Vec<usize>;
}

/// The solver family.
#[derive(Debug, Clone)]
pub enum Strategy {
    Exact(ExactSolver),
    Genetic(GeneticSolver),
    Hybrid(HybridSolver),
}

impl Strategy {
    pub fn select(order_count: usize, options: &EngineOptions) -> Self {
        if order_count <= options.exact_max_orders {
            Strategy::Exact(ExactSolver)
        } else if order_count <= options.genetic_max_orders {
            Strategy::Genetic(GeneticSolver::new(options.genetic.clone()))
        } else {
            Strategy::Hybrid(HybridSolver::new(
                options.annealing.clone(),
                options.nearest_neighbor_starts,
                options.two_opt_max_passes,
            ))
        }
    }
}

impl SequenceSolver for Strategy {
    fn name(&self) -> &'static str {
        match self {
            Strategy::Exact(solver) => solver.name(),
            Strategy::Genetic(solver) => solver.name(),
            Strategy::Hybrid(solver) => solver.name(),
        }
    }

    fn solve(&self, problem: &SequenceProblem<'_>, rng: &mut SmallRng) -> Vec<usize> {
        match self {
            Strategy::Exact(solver) => solver.solve(problem, rng),
            Strategy::Genetic(solver) => solver.solve(problem, rng),
            Strategy::Hybrid(solver) => solver.solve(problem, rng),
        }
    }
}

/// Picks the strategy for the problem size and runs it.
pub fn solve_sequence(problem: &SequenceProblem<'_>, options: &EngineOptions, rng: &mut SmallRng) -> Candidate {
    let strategy = Strategy::select(problem.order_count(), options);
    let candidate = problem.candidate(strategy.solve(problem, rng));
    debug!(
        solver = strategy.name(),
        orders = problem.order_count(),
        score = candidate.score,
        "sequence solved"
    );
    candidate
}
