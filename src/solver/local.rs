//! Construction heuristics, local search and mutation moves on sequences.

use rand::Rng;
use rand::seq::SliceRandom;

use super::{Candidate, SequenceProblem};

/// Greedy construction: from the current stop, always append the unvisited
/// order with the best transition score. `start` fixes the first order.
pub fn nearest_neighbor(problem: &SequenceProblem<'_>, start: Option<usize>) -> Vec<usize> {
    let n = problem.order_count();
    let mut visited = vec![false; n];
    let mut sequence = Vec::with_capacity(n);
    let mut last = None;

    if let Some(first) = start.filter(|&first| first < n) {
        visited[first] = true;
        sequence.push(first);
        last = Some(first);
    }

    while sequence.len() < n {
        let mut best: Option<(usize, f64)> = None;
        for candidate in (0..n).filter(|&order| !visited[order]) {
            let score = problem.transition(last, candidate);
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((candidate, score));
            }
        }
        let Some((next, _)) = best else { break };
        visited[next] = true;
        sequence.push(next);
        last = Some(next);
    }

    sequence
}

/// Orders with the best transition from the driver origin, best first.
pub fn best_starts(problem: &SequenceProblem<'_>, count: usize) -> Vec<usize> {
    let mut starts: Vec<usize> = (0..problem.order_count()).collect();
    starts.sort_by(|a, b| {
        problem
            .transition(None, *b)
            .total_cmp(&problem.transition(None, *a))
            .then(a.cmp(b))
    });
    starts.truncate(count);
    starts
}

/// 2-opt: reverse a segment of the sequence if that improves the score.
/// Returns true if an improvement was made.
fn two_opt_improve(problem: &SequenceProblem<'_>, current: &mut Candidate) -> bool {
    let n = current.sequence.len();
    if n < 2 {
        return false;
    }

    for i in 0..n - 1 {
        for j in i + 1..n {
            let mut candidate = current.sequence.clone();
            candidate[i..=j].reverse();

            let score = problem.score(&candidate);
            if score > current.score {
                current.sequence = candidate;
                current.score = score;
                return true;
            }
        }
    }

    false
}

/// Run 2-opt until no more improvements or `max_passes` reached.
pub fn two_opt(problem: &SequenceProblem<'_>, start: Candidate, max_passes: usize) -> Candidate {
    let mut current = start;
    for _ in 0..max_passes {
        if !two_opt_improve(problem, &mut current) {
            break;
        }
    }
    current
}

pub fn random_permutation<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<usize> {
    let mut sequence: Vec<usize> = (0..n).collect();
    sequence.shuffle(rng);
    sequence
}

/// Two distinct positions of a sequence of length `n >= 2`.
fn two_positions<R: Rng + ?Sized>(n: usize, rng: &mut R) -> (usize, usize) {
    let i = rng.gen_range(0..n);
    let mut j = rng.gen_range(0..n - 1);
    if j >= i {
        j += 1;
    }
    (i, j)
}

pub fn swap_mutation<R: Rng + ?Sized>(sequence: &mut [usize], rng: &mut R) {
    if sequence.len() < 2 {
        return;
    }
    let (i, j) = two_positions(sequence.len(), rng);
    sequence.swap(i, j);
}

/// Moves one order to another position.
pub fn insertion_mutation<R: Rng + ?Sized>(sequence: &mut Vec<usize>, rng: &mut R) {
    if sequence.len() < 2 {
        return;
    }
    let (from, to) = two_positions(sequence.len(), rng);
    let order = sequence.remove(from);
    sequence.insert(to, order);
}

/// Reverses the segment between two positions.
pub fn inversion_mutation<R: Rng + ?Sized>(sequence: &mut [usize], rng: &mut R) {
    if sequence.len() < 2 {
        return;
    }
    let (i, j) = two_positions(sequence.len(), rng);
    let (lo, hi) = if i < j { (i, j) } else { (j, i) };
    sequence[lo..=hi].reverse();
}

/// Applies one of swap, insertion or inversion, chosen uniformly.
pub fn random_mutation<R: Rng + ?Sized>(sequence: &mut Vec<usize>, rng: &mut R) {
    match rng.gen_range(0..3) {
        0 => swap_mutation(sequence, rng),
        1 => insertion_mutation(sequence, rng),
        _ => inversion_mutation(sequence, rng),
    }
}
