//! # Rate Model Fitting
//!
//! `rate_model_fitting` fits a reduced conductance-driven firing rate model
//! to reference firing rate traces recorded from a detailed biophysical
//! simulation. The rate model carries a firing rate state and a slow
//! adaptation state, is driven by excitatory and inhibitory conductance
//! input, and has nine free parameters that are tuned by a differential
//! evolution search against many independent trials at once. Loss
//! evaluations are pure and stateless, so a generation of candidates can be
//! scored sequentially or across a thread pool through the same scheduler
//! interface.
//!
//! ## Example Code
//!
//! ### Fitting the model to a synthetic batch
//!
//! ```rust,no_run
//! use ndarray::Array2;
//! use rate_model_fitting::{
//!     error::RateModelFittingError,
//!     fitting::{TrialBatch, fit_rate_model, run_batch},
//!     optimizer::{DifferentialEvolutionSettings, ThreadPoolScheduler},
//!     rate_model::{ParameterBounds, RateModelParameters},
//! };
//!
//! fn main() -> Result<(), RateModelFittingError> {
//!     let time_steps = 1000;
//!     let trial_count = 10;
//!     let dt = 0.1;
//!
//!     // constant drive stands in for recorded conductance traces
//!     let excitatory = Array2::from_elem((time_steps, trial_count), 1.0);
//!     let inhibitory = Array2::from_elem((time_steps, trial_count), 0.05);
//!
//!     // target produced by a known ground truth parameter set
//!     let ground_truth = RateModelParameters::default();
//!     let placeholder = Array2::zeros((time_steps, trial_count));
//!     let inputs = TrialBatch::new(excitatory.clone(), inhibitory.clone(), placeholder)?;
//!     let target = run_batch(&ground_truth, dt, &inputs);
//!
//!     let batch = TrialBatch::new(excitatory, inhibitory, target)?;
//!
//!     let result = fit_rate_model(
//!         &batch,
//!         dt,
//!         &RateModelParameters::default(),
//!         &ParameterBounds::default(),
//!         &DifferentialEvolutionSettings::default(),
//!         &ThreadPoolScheduler::new(),
//!         true,
//!     )?;
//!
//!     println!("loss: {}", result.loss);
//!     println!("parameters: {:#?}", result.parameters);
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Running a single trial directly
//!
//! ```rust
//! use rate_model_fitting::rate_model::{RateModelNeuron, RateModelParameters};
//!
//! let mut neuron = RateModelNeuron::new(RateModelParameters::default(), 0.1);
//!
//! let excitatory = vec![1.0; 500];
//! let inhibitory = vec![0.0; 500];
//!
//! let trajectory = neuron.run_trial(&excitatory, &inhibitory);
//!
//! assert_eq!(trajectory.len(), 500);
//! assert!(trajectory.iter().all(|rate| rate.is_finite()));
//! ```

pub mod error;
pub mod rate_model;
pub mod optimizer;
pub mod fitting;
