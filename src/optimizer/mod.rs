//! A differential evolution optimizer for bounded, derivative-free
//! minimization of expensive black box objectives.
//!
//! Uses the best/2/bin strategy with deferred updating, the whole population
//! of trial vectors for a generation is evaluated before any replacement
//! happens, so evaluations within a generation are independent and can be
//! dispatched to any [`EvaluationScheduler`].

use rand::{Rng, SeedableRng, rngs::StdRng};
use rayon::prelude::*;
use crate::error::{OptimizationError, RateModelFittingError};


/// Hyperparameters for [`differential_evolution`]
#[derive(Clone, Debug, PartialEq)]
pub struct DifferentialEvolutionSettings {
    /// Population size as a multiple of the number of dimensions
    pub population_multiplier: usize,
    /// Maximum number of generations
    pub max_iterations: usize,
    /// Absolute tolerance on the population fitness spread
    pub absolute_tolerance: f64,
    /// Relative tolerance on the population fitness spread
    pub relative_tolerance: f64,
    /// Crossover probability for binomial recombination
    pub recombination: f64,
    /// Differential weight applied to mutation difference vectors
    pub mutation: f64,
    /// Seed for the search's random number generator, random when `None`
    ///
    /// All random draws happen in the single threaded orchestrator, so a
    /// fixed seed reproduces the search exactly regardless of scheduler
    pub seed: Option<u64>,
}

impl Default for DifferentialEvolutionSettings {
    fn default() -> Self {
        DifferentialEvolutionSettings {
            population_multiplier: 15,
            max_iterations: 700,
            absolute_tolerance: 1e-3,
            relative_tolerance: 0.01,
            recombination: 0.7,
            mutation: 0.3,
            seed: None,
        }
    }
}

impl DifferentialEvolutionSettings {
    fn check(&self, bounds: &[(f64, f64)]) -> Result<(), OptimizationError> {
        if bounds.is_empty() {
            return Err(
                OptimizationError::InvalidSettings(String::from("Bounds must not be empty"))
            );
        }

        for (i, (lower, upper)) in bounds.iter().enumerate() {
            if !lower.is_finite() || !upper.is_finite() || lower > upper {
                return Err(
                    OptimizationError::InvalidSettings(
                        format!("Bound {} must be a finite interval with lower <= upper", i)
                    )
                );
            }
        }

        if self.population_multiplier == 0 {
            return Err(
                OptimizationError::InvalidSettings(String::from("Population multiplier must be nonzero"))
            );
        }
        if !(0.0..=1.0).contains(&self.recombination) {
            return Err(
                OptimizationError::InvalidSettings(String::from("Recombination rate must be within [0, 1]"))
            );
        }
        if !(0.0..2.0).contains(&self.mutation) {
            return Err(
                OptimizationError::InvalidSettings(String::from("Mutation factor must be within [0, 2)"))
            );
        }
        if self.absolute_tolerance < 0. || self.relative_tolerance < 0. {
            return Err(
                OptimizationError::InvalidSettings(String::from("Tolerances must be non-negative"))
            );
        }

        Ok(())
    }
}

/// Best candidate found by a [`differential_evolution`] run
///
/// Carries no converged versus iteration capped distinction, termination by
/// tolerance and termination by hitting the cap report the same way
#[derive(Clone, Debug, PartialEq)]
pub struct OptimizationResult {
    /// Best parameter vector found
    pub best: Vec<f64>,
    /// Objective value of the best vector
    pub best_score: f64,
    /// Number of generations consumed
    pub iterations: usize,
}

/// Dispatches one generation's worth of independent objective evaluations,
/// implementors decide whether evaluation happens sequentially, on a thread
/// pool, or elsewhere, the optimizer itself stays agnostic
pub trait EvaluationScheduler {
    /// Evaluates the objective on every candidate, preserving candidate
    /// order, any single failure fails the whole generation
    fn evaluate<F>(
        &self,
        candidates: &[Vec<f64>],
        objective: &F,
    ) -> Result<Vec<f64>, RateModelFittingError>
    where
        F: Fn(&[f64]) -> Result<f64, RateModelFittingError> + Sync;
}

/// Evaluates candidates one after another on the calling thread
pub struct SequentialScheduler;

impl EvaluationScheduler for SequentialScheduler {
    fn evaluate<F>(
        &self,
        candidates: &[Vec<f64>],
        objective: &F,
    ) -> Result<Vec<f64>, RateModelFittingError>
    where
        F: Fn(&[f64]) -> Result<f64, RateModelFittingError> + Sync,
    {
        candidates.iter()
            .map(|candidate| objective(candidate))
            .collect()
    }
}

/// Evaluates candidates in parallel on a rayon thread pool, either the
/// global pool or a dedicated pool with an explicit worker count
pub struct ThreadPoolScheduler {
    pool: Option<rayon::ThreadPool>,
}

impl ThreadPoolScheduler {
    /// Uses the global rayon pool, one worker per available core
    pub fn new() -> Self {
        ThreadPoolScheduler { pool: None }
    }

    /// Builds a dedicated pool with the given number of workers
    pub fn with_workers(workers: usize) -> Result<Self, OptimizationError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| OptimizationError::InvalidSettings(
                format!("Could not build thread pool: {}", e)
            ))?;

        Ok(ThreadPoolScheduler { pool: Some(pool) })
    }
}

impl Default for ThreadPoolScheduler {
    fn default() -> Self {
        ThreadPoolScheduler::new()
    }
}

impl EvaluationScheduler for ThreadPoolScheduler {
    fn evaluate<F>(
        &self,
        candidates: &[Vec<f64>],
        objective: &F,
    ) -> Result<Vec<f64>, RateModelFittingError>
    where
        F: Fn(&[f64]) -> Result<f64, RateModelFittingError> + Sync,
    {
        let run = || {
            candidates.par_iter()
                .map(|candidate| objective(candidate))
                .collect()
        };

        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }
}

fn clamp_to_bounds(value: f64, (lower, upper): (f64, f64)) -> f64 {
    value.min(upper).max(lower)
}

/// Uniform draw that stays well defined for degenerate intervals
fn sample_within(rng: &mut StdRng, (lower, upper): (f64, f64)) -> f64 {
    lower + rng.gen::<f64>() * (upper - lower)
}

/// Picks `count` distinct population indices, all different from `exclude`
fn distinct_indices(rng: &mut StdRng, population_size: usize, exclude: usize, count: usize) -> Vec<usize> {
    let mut chosen: Vec<usize> = Vec::with_capacity(count);

    while chosen.len() < count {
        let index = rng.gen_range(0..population_size);
        if index != exclude && !chosen.contains(&index) {
            chosen.push(index);
        }
    }

    chosen
}

fn best_index(scores: &[f64]) -> usize {
    scores.iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(index, _)| index)
        .unwrap_or(0)
}

/// Fitness spread test, `std(scores) <= atol + rtol * |mean(scores)|`,
/// never satisfied while any score is non-finite
fn has_converged(scores: &[f64], absolute_tolerance: f64, relative_tolerance: f64) -> bool {
    if scores.iter().any(|score| !score.is_finite()) {
        return false;
    }

    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    let variance = scores.iter()
        .map(|score| (score - mean).powi(2))
        .sum::<f64>() / scores.len() as f64;

    variance.sqrt() <= absolute_tolerance + relative_tolerance * mean.abs()
}

/// Builds a best/2/bin trial vector for target index `i`
fn build_trial(
    rng: &mut StdRng,
    population: &[Vec<f64>],
    best: &[f64],
    target: usize,
    bounds: &[(f64, f64)],
    settings: &DifferentialEvolutionSettings,
) -> Vec<f64> {
    let dims = bounds.len();
    let donors = distinct_indices(rng, population.len(), target, 4);
    let fill_dim = rng.gen_range(0..dims);

    let mut trial = population[target].clone();
    for dim in 0..dims {
        if dim == fill_dim || rng.gen::<f64>() <= settings.recombination {
            let mutated = best[dim] + settings.mutation * (
                population[donors[0]][dim] + population[donors[1]][dim]
                - population[donors[2]][dim] - population[donors[3]][dim]
            );

            trial[dim] = clamp_to_bounds(mutated, bounds[dim]);
        }
    }

    trial
}

/// Minimizes `objective` over the box `bounds` with differential evolution
/// (best/2/bin, deferred updating)
///
/// The initial population is drawn uniformly within bounds with
/// `initial_guess` injected as the first member, each generation every trial
/// vector is built against the current best and the whole generation is
/// evaluated through `scheduler` before pairwise replacement, an objective
/// failure anywhere aborts the run rather than skewing the search
///
/// - `objective` : black box function to minimize, must be pure so that
///   evaluations can run concurrently
///
/// - `bounds` : closed interval per dimension, candidates never leave the box
///
/// - `initial_guess` : starting vector, clamped into bounds, length must
///   match `bounds`
///
/// - `settings` : population sizing, rates, tolerances, and iteration cap
///
/// - `scheduler` : work distribution backend for a generation's evaluations
///
/// - `verbose` : use `true` to print per generation progress
pub fn differential_evolution<F, S>(
    objective: &F,
    bounds: &[(f64, f64)],
    initial_guess: &[f64],
    settings: &DifferentialEvolutionSettings,
    scheduler: &S,
    verbose: bool,
) -> Result<OptimizationResult, RateModelFittingError>
where
    F: Fn(&[f64]) -> Result<f64, RateModelFittingError> + Sync,
    S: EvaluationScheduler,
{
    settings.check(bounds)?;

    if initial_guess.len() != bounds.len() {
        return Err(
            OptimizationError::InvalidSettings(
                format!(
                    "Initial guess has {} dimensions but bounds have {}",
                    initial_guess.len(),
                    bounds.len(),
                )
            ).into()
        );
    }

    let mut rng = match settings.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let dims = bounds.len();
    // best/2/bin needs the best vector plus four distinct donors
    let population_size = (settings.population_multiplier * dims).max(5);

    let mut population: Vec<Vec<f64>> = (0..population_size)
        .map(|member| {
            if member == 0 {
                initial_guess.iter()
                    .zip(bounds.iter())
                    .map(|(&value, &bound)| clamp_to_bounds(value, bound))
                    .collect()
            } else {
                bounds.iter()
                    .map(|&bound| sample_within(&mut rng, bound))
                    .collect()
            }
        })
        .collect();

    let mut scores = scheduler.evaluate(&population, objective)?;
    let mut best = best_index(&scores);
    let mut iterations = 0;

    for generation in 0..settings.max_iterations {
        let best_vector = population[best].clone();

        let trials: Vec<Vec<f64>> = (0..population_size)
            .map(|target| build_trial(&mut rng, &population, &best_vector, target, bounds, settings))
            .collect();

        // deferred updating, the full generation is scored before any
        // member is replaced
        let trial_scores = scheduler.evaluate(&trials, objective)?;

        for (member, (trial, trial_score)) in trials.into_iter().zip(trial_scores.into_iter()).enumerate() {
            if trial_score <= scores[member] {
                population[member] = trial;
                scores[member] = trial_score;
            }
        }

        best = best_index(&scores);
        iterations = generation + 1;

        if verbose {
            println!("differential evolution iteration: {}, best score: {}", iterations, scores[best]);
        }

        if has_converged(&scores, settings.absolute_tolerance, settings.relative_tolerance) {
            break;
        }
    }

    Ok(
        OptimizationResult {
            best: population[best].clone(),
            best_score: scores[best],
            iterations,
        }
    )
}
