//! A set of tools to fit the conductance-driven rate model to reference
//! firing rate recordings from a detailed biophysical simulation.

use std::f64::consts::LN_2;
use ndarray::Array2;
use serde::Serialize;
use crate::error::{OptimizationError, RateModelFittingError, TrialBatchError};
use crate::optimizer::{
    DifferentialEvolutionSettings, EvaluationScheduler, differential_evolution,
};
use crate::rate_model::{ParameterBounds, RateModelNeuron, RateModelParameters};


/// A fixed collection of independent trial recordings sharing one time base,
/// each trial pairs two conductance input channels with a target firing rate
/// trace, all stored as time by trials matrices
///
/// Immutable once constructed, shared read-only across every loss evaluation
/// of a fitting run
#[derive(Clone, Debug, PartialEq)]
pub struct TrialBatch {
    excitatory_conductance: Array2<f64>,
    inhibitory_conductance: Array2<f64>,
    target_firing_rate: Array2<f64>,
}

impl TrialBatch {
    /// Builds a batch from time by trials matrices, all three must share the
    /// same shape and contain at least one trial and one time step
    pub fn new(
        excitatory_conductance: Array2<f64>,
        inhibitory_conductance: Array2<f64>,
        target_firing_rate: Array2<f64>,
    ) -> Result<Self, TrialBatchError> {
        if excitatory_conductance.dim() != inhibitory_conductance.dim() {
            return Err(TrialBatchError::ConductanceShapeMismatch);
        }
        if excitatory_conductance.dim() != target_firing_rate.dim() {
            return Err(TrialBatchError::TargetShapeMismatch);
        }

        let (time_steps, trial_count) = excitatory_conductance.dim();
        if time_steps == 0 || trial_count == 0 {
            return Err(TrialBatchError::EmptyBatch);
        }

        Ok(
            TrialBatch {
                excitatory_conductance,
                inhibitory_conductance,
                target_firing_rate,
            }
        )
    }

    /// Stacks per trial `(excitatory, inhibitory, target)` sequences into a
    /// batch, the shape the external data source yields trials in, every
    /// sequence across every trial must have the same length
    pub fn from_trials(trials: &[(Vec<f64>, Vec<f64>, Vec<f64>)]) -> Result<Self, TrialBatchError> {
        if trials.is_empty() {
            return Err(TrialBatchError::EmptyBatch);
        }

        let time_steps = trials[0].0.len();
        for (excitatory, inhibitory, target) in trials.iter() {
            if excitatory.len() != time_steps
                || inhibitory.len() != time_steps
                || target.len() != time_steps {
                return Err(TrialBatchError::TrialLengthMismatch);
            }
        }

        let trial_count = trials.len();
        let mut excitatory_conductance = Array2::zeros((time_steps, trial_count));
        let mut inhibitory_conductance = Array2::zeros((time_steps, trial_count));
        let mut target_firing_rate = Array2::zeros((time_steps, trial_count));

        for (trial, (excitatory, inhibitory, target)) in trials.iter().enumerate() {
            for step in 0..time_steps {
                excitatory_conductance[[step, trial]] = excitatory[step];
                inhibitory_conductance[[step, trial]] = inhibitory[step];
                target_firing_rate[[step, trial]] = target[step];
            }
        }

        TrialBatch::new(excitatory_conductance, inhibitory_conductance, target_firing_rate)
    }

    /// Number of trials in the batch
    pub fn trial_count(&self) -> usize {
        self.excitatory_conductance.dim().1
    }

    /// Number of time steps per trial
    pub fn time_steps(&self) -> usize {
        self.excitatory_conductance.dim().0
    }

    /// Target firing rate matrix (time by trials)
    pub fn target_firing_rate(&self) -> &Array2<f64> {
        &self.target_firing_rate
    }

    /// Excitatory conductance matrix (time by trials)
    pub fn excitatory_conductance(&self) -> &Array2<f64> {
        &self.excitatory_conductance
    }

    /// Inhibitory conductance matrix (time by trials)
    pub fn inhibitory_conductance(&self) -> &Array2<f64> {
        &self.inhibitory_conductance
    }
}

/// Runs the rate model over every trial in the batch with one shared
/// parameter vector and returns the simulated trajectories as a time by
/// trials matrix aligned with the batch target
///
/// Each trial gets its own model instance starting from the resting
/// baseline, trials never share state
pub fn run_batch(
    parameters: &RateModelParameters,
    dt: f64,
    batch: &TrialBatch,
) -> Array2<f64> {
    let time_steps = batch.time_steps();
    let trial_count = batch.trial_count();

    let mut neurons: Vec<RateModelNeuron> = (0..trial_count)
        .map(|_| RateModelNeuron::new(*parameters, dt))
        .collect();

    let mut output = Array2::zeros((time_steps, trial_count));
    for step in 0..time_steps {
        for (trial, neuron) in neurons.iter_mut().enumerate() {
            output[[step, trial]] = neuron.iterate(
                batch.excitatory_conductance[[step, trial]],
                batch.inhibitory_conductance[[step, trial]],
            );
        }
    }

    output
}

/// Numerically stable log-cosh, `log(cosh(x))` without overflowing for
/// large arguments
fn log_cosh(x: f64) -> f64 {
    x.abs() + (-2. * x.abs()).exp().ln_1p() - LN_2
}

/// Mean log-cosh error between the simulated and target trajectories across
/// all trials and time steps, reduced to one non-negative scalar, lower is
/// better, if the reduction is not a number `f64::INFINITY` is returned so
/// derivative-free search bookkeeping is never corrupted
///
/// Pure function of the parameters and the fixed batch, safe to call
/// repeatedly and concurrently
pub fn evaluate_loss(
    parameters: &RateModelParameters,
    dt: f64,
    batch: &TrialBatch,
) -> f64 {
    let simulated = run_batch(parameters, dt, batch);

    let total: f64 = simulated.iter()
        .zip(batch.target_firing_rate.iter())
        .map(|(simulated_rate, target_rate)| log_cosh(simulated_rate - target_rate))
        .sum();

    let loss = total / (batch.time_steps() * batch.trial_count()) as f64;

    if loss.is_nan() {
        f64::INFINITY
    } else {
        // rounding in the per sample log-cosh can leave a tiny negative sum
        loss.max(0.)
    }
}

/// Converged parameters and their loss for one fitting run, never mutated
/// after creation
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FitResult {
    /// Best fit parameters
    pub parameters: RateModelParameters,
    /// Loss of the best fit parameters
    pub loss: f64,
    /// Number of optimizer generations consumed
    pub iterations: usize,
}

/// Fits the rate model to the batch's target firing rates by minimizing
/// [`evaluate_loss`] with differential evolution
///
/// Every candidate the optimizer produces is checked against the declared
/// bounds before simulation, a candidate outside its interval is a contract
/// violation and fails the run rather than being silently clamped
///
/// - `batch` : trial recordings to fit against
///
/// - `dt` : simulation timestep (ms), must match the recordings' time base
///
/// - `initial_guess` : starting parameter vector seeded into the population
///
/// - `bounds` : closed search interval per parameter
///
/// - `settings` : differential evolution hyperparameters
///
/// - `scheduler` : work distribution backend for candidate evaluation
///
/// - `verbose` : use `true` to print per generation progress
pub fn fit_rate_model<S: EvaluationScheduler>(
    batch: &TrialBatch,
    dt: f64,
    initial_guess: &RateModelParameters,
    bounds: &ParameterBounds,
    settings: &DifferentialEvolutionSettings,
    scheduler: &S,
    verbose: bool,
) -> Result<FitResult, RateModelFittingError> {
    let bound_array = bounds.to_array();

    let objective = |candidate: &[f64]| -> Result<f64, RateModelFittingError> {
        let parameters = RateModelParameters::from_slice(candidate)?;

        if !bounds.contains(&parameters) {
            return Err(
                OptimizationError::ParameterOutOfBounds(
                    format!("Candidate {:?} escaped the declared bounds", candidate)
                ).into()
            );
        }

        Ok(evaluate_loss(&parameters, dt, batch))
    };

    let result = differential_evolution(
        &objective,
        &bound_array,
        &initial_guess.to_array(),
        settings,
        scheduler,
        verbose,
    )?;

    let parameters = RateModelParameters::from_slice(&result.best)?;

    Ok(
        FitResult {
            parameters,
            loss: result.best_score,
            iterations: result.iterations,
        }
    )
}
