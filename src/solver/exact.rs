//! Exhaustive branch-and-bound over all visiting orders.
//!
//! Explores every permutation, so it is only selected for small batches.
//! Children are expanded best transition first and every complete sequence is
//! scored in full, which makes the result the global optimum of the scoring
//! model. Deterministic.

use rand::rngs::SmallRng;

use super::{SequenceProblem, SequenceSolver};

/// Full scores closer than this are treated as equal.
const SCORE_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, Default)]
pub struct ExactSolver;

impl SequenceSolver for ExactSolver {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn solve(&self, problem: &SequenceProblem<'_>, _rng: &mut SmallRng) -> Vec<usize> {
        let n = problem.order_count();
        let mut search = Search {
            problem,
            partial: Vec::with_capacity(n),
            used: vec![false; n],
            best: None,
        };
        search.extend(None, 0.0);
        search.best.map(|best| best.sequence).unwrap_or_default()
    }
}

struct Best {
    sequence: Vec<usize>,
    score: f64,
    transition_sum: f64,
}

struct Search<'p, 'a> {
    problem: &'p SequenceProblem<'a>,
    partial: Vec<usize>,
    used: Vec<bool>,
    best: Option<Best>,
}

impl Search<'_, '_> {
    /// `transition_sum` accumulates the incremental scores of the partial
    /// sequence; between equally scored sequences the larger sum wins.
    fn extend(&mut self, last: Option<usize>, transition_sum: f64) {
        let n = self.used.len();
        if self.partial.len() == n {
            self.offer(transition_sum);
            return;
        }

        let mut children: Vec<(usize, f64)> = (0..n)
            .filter(|&order| !self.used[order])
            .map(|order| (order, self.problem.transition(last, order)))
            .collect();
        children.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        for (order, transition) in children {
            self.used[order] = true;
            self.partial.push(order);
            self.extend(Some(order), transition_sum + transition);
            self.partial.pop();
            self.used[order] = false;
        }
    }

    fn offer(&mut self, transition_sum: f64) {
        let score = self.problem.score(&self.partial);
        let better = match &self.best {
            None => true,
            Some(best) if score > best.score + SCORE_EPSILON => true,
            Some(best) => (score - best.score).abs() <= SCORE_EPSILON && transition_sum > best.transition_sum,
        };
        if better {
            self.best = Some(Best {
                sequence: self.partial.clone(),
                score,
                transition_sum,
            });
        }
    }
}
