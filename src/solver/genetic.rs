//! Genetic algorithm for mid-sized batches.
//!
//! Population seeded with random permutations, one nearest-neighbour
//! sequence and mutated copies of it. Each generation keeps the elite,
//! then refills by tournament selection, order crossover and mutation.

use rand::Rng;
use rand::rngs::SmallRng;
use rayon::prelude::*;

use super::local::{nearest_neighbor, random_mutation, random_permutation};
use super::{SequenceProblem, SequenceSolver};
use crate::config::GeneticParams;

#[derive(Debug, Clone)]
pub struct GeneticSolver {
    params: GeneticParams,
}

#[derive(Debug, Clone)]
struct Individual {
    genes: Vec<usize>,
    /// `None` until evaluated.
    fitness: Option<f64>,
}

impl Individual {
    fn new(genes: Vec<usize>) -> Self {
        Self { genes, fitness: None }
    }

    fn fitness(&self) -> f64 {
        self.fitness.unwrap_or(f64::NEG_INFINITY)
    }
}

impl GeneticSolver {
    pub fn new(params: GeneticParams) -> Self {
        Self { params }
    }

    fn initial_population(&self, problem: &SequenceProblem<'_>, rng: &mut SmallRng) -> Vec<Individual> {
        let n = problem.order_count();
        let size = self.params.population_size.max(1);
        let random_count = ((size as f64 * self.params.random_share).round() as usize).min(size - 1);

        let mut population = Vec::with_capacity(size);
        for _ in 0..random_count {
            population.push(Individual::new(random_permutation(n, rng)));
        }

        let seed = nearest_neighbor(problem, None);
        population.push(Individual::new(seed.clone()));

        while population.len() < size {
            let mut genes = seed.clone();
            random_mutation(&mut genes, rng);
            population.push(Individual::new(genes));
        }

        population
    }

    fn elite_count(&self, size: usize) -> usize {
        ((size as f64 * self.params.elite_ratio).round() as usize).clamp(1, size)
    }
}

impl SequenceSolver for GeneticSolver {
    fn name(&self) -> &'static str {
        "genetic"
    }

    fn solve(&self, problem: &SequenceProblem<'_>, rng: &mut SmallRng) -> Vec<usize> {
        let n = problem.order_count();
        if n < 2 {
            return (0..n).collect();
        }

        let mut population = self.initial_population(problem, rng);
        let size = population.len();
        let elites = self.elite_count(size);
        let mutation_rate = self.params.mutation_rate.clamp(0.0, 1.0);
        let tournament_size = self.params.tournament_size.max(1);

        for _ in 0..self.params.generations {
            evaluate(&mut population, problem);
            population.sort_by(|a, b| b.fitness().total_cmp(&a.fitness()));

            let mut next: Vec<Individual> = population[..elites].to_vec();
            while next.len() < size {
                let first = tournament(&population, tournament_size, rng);
                let second = tournament(&population, tournament_size, rng);
                let mut child = order_crossover(&first.genes, &second.genes, rng);
                if rng.gen_bool(mutation_rate) {
                    random_mutation(&mut child, rng);
                }
                next.push(Individual::new(child));
            }
            population = next;
        }

        evaluate(&mut population, problem);
        population
            .into_iter()
            .max_by(|a, b| a.fitness().total_cmp(&b.fitness()))
            .map(|best| best.genes)
            .unwrap_or_else(|| (0..n).collect())
    }
}

fn evaluate(population: &mut [Individual], problem: &SequenceProblem<'_>) {
    population
        .par_iter_mut()
        .filter(|individual| individual.fitness.is_none())
        .for_each(|individual| individual.fitness = Some(problem.score(&individual.genes)));
}

/// Best of `size` individuals drawn with replacement.
fn tournament<'p>(population: &'p [Individual], size: usize, rng: &mut SmallRng) -> &'p Individual {
    let mut best = &population[rng.gen_range(0..population.len())];
    for _ in 1..size {
        let contender = &population[rng.gen_range(0..population.len())];
        if contender.fitness() > best.fitness() {
            best = contender;
        }
    }
    best
}

/// Order crossover (OX): keep a random slice of `first` in place, fill the
/// other positions with the remaining orders in the order they appear in `second`.
fn order_crossover<R: Rng + ?Sized>(first: &[usize], second: &[usize], rng: &mut R) -> Vec<usize> {
    let n = first.len();
    let a = rng.gen_range(0..n);
    let b = rng.gen_range(0..n);
    let (start, end) = if a <= b { (a, b) } else { (b, a) };

    let mut taken = vec![false; n];
    for &order in &first[start..=end] {
        taken[order] = true;
    }

    let mut fill = second.iter().copied().filter(|&order| !taken[order]);
    (0..n)
        .map(|position| {
            if (start..=end).contains(&position) {
                first[position]
            } else {
                // both parents are permutations, so exactly enough orders remain
                fill.next().unwrap_or(first[position])
            }
        })
        .collect()
}
