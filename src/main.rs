use std::{
    env,
    fs::{File, create_dir_all, read_to_string},
    io::{BufReader, BufWriter, Error, ErrorKind, Result, Write},
    path::Path,
};
use ndarray::Array2;
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal};
use serde::Deserialize;
use toml::from_str;
use rate_model_fitting::error::RateModelFittingError;
use rate_model_fitting::fitting::{FitResult, TrialBatch, evaluate_loss, fit_rate_model, run_batch};
use rate_model_fitting::optimizer::{
    DifferentialEvolutionSettings, SequentialScheduler, ThreadPoolScheduler,
};
use rate_model_fitting::rate_model::{ParameterBounds, RateModelParameters};


fn default_dt() -> f64 { 0.1 }
fn default_time_steps() -> usize { 5000 }
fn default_trial_count() -> usize { 10 }
fn default_seed() -> u64 { 42 }

#[derive(Clone, Debug, Deserialize)]
struct SimulationConfiguration {
    #[serde(default = "default_dt")]
    dt: f64,
    #[serde(default = "default_time_steps")]
    time_steps: usize,
    #[serde(default = "default_trial_count")]
    trial_count: usize,
    #[serde(default = "default_seed")]
    seed: u64,
}

impl Default for SimulationConfiguration {
    fn default() -> Self {
        SimulationConfiguration {
            dt: default_dt(),
            time_steps: default_time_steps(),
            trial_count: default_trial_count(),
            seed: default_seed(),
        }
    }
}

fn default_max_iterations() -> usize { 100 }

#[derive(Clone, Debug, Deserialize)]
struct OptimizerConfiguration {
    #[serde(default = "default_max_iterations")]
    max_iterations: usize,
    /// Number of worker threads for candidate evaluation, 0 uses all
    /// available cores
    #[serde(default)]
    workers: usize,
    #[serde(default)]
    seed: Option<u64>,
}

impl Default for OptimizerConfiguration {
    fn default() -> Self {
        OptimizerConfiguration {
            max_iterations: default_max_iterations(),
            workers: 0,
            seed: None,
        }
    }
}

fn default_true() -> bool { true }
fn default_output_path() -> String { String::from("optim_results/demo_optim_res.json") }

/// Recognized run options, an explicit record rather than ambient flags
#[derive(Clone, Debug, Deserialize)]
struct RunOptions {
    /// Run the differential evolution fit
    #[serde(default = "default_true")]
    fit: bool,
    /// Load previously persisted parameters instead of fitting
    #[serde(default)]
    load_existing: bool,
    #[serde(default = "default_output_path")]
    output_path: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            fit: true,
            load_existing: false,
            output_path: default_output_path(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
struct Configuration {
    #[serde(default)]
    simulation: SimulationConfiguration,
    #[serde(default)]
    optimizer: OptimizerConfiguration,
    #[serde(default)]
    run: RunOptions,
}

fn read_configuration() -> Result<Configuration> {
    let args: Vec<String> = env::args().collect();

    match args.get(1) {
        Some(path) => {
            let contents = read_to_string(path)?;

            from_str(&contents)
                .map_err(|e| Error::new(ErrorKind::InvalidData, format!("Could not parse configuration: {}", e)))
        },
        None => Ok(Configuration::default()),
    }
}

/// Ornstein-Uhlenbeck style conductance trace, mean reverting with Gaussian
/// increments, clamped to non-negative values
fn generate_conductance_trace(
    rng: &mut StdRng,
    noise: &Normal<f64>,
    time_steps: usize,
    dt: f64,
    mean: f64,
    tau: f64,
    sigma: f64,
) -> Vec<f64> {
    let mut trace = Vec::with_capacity(time_steps);
    let mut value = mean;

    for _ in 0..time_steps {
        value += (mean - value) * dt / tau + sigma * dt.sqrt() * noise.sample(rng);
        value = value.max(0.);
        trace.push(value);
    }

    trace
}

/// Builds a synthetic trial batch whose target firing rates come from a
/// known ground truth parameter vector, standing in for the external
/// dataset loader
fn generate_synthetic_batch(
    config: &SimulationConfiguration,
    ground_truth: &RateModelParameters,
) -> Result<TrialBatch> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let noise = Normal::new(0., 1.)
        .map_err(|e| Error::new(ErrorKind::InvalidInput, format!("Could not build noise distribution: {}", e)))?;

    let mut excitatory = Array2::zeros((config.time_steps, config.trial_count));
    let mut inhibitory = Array2::zeros((config.time_steps, config.trial_count));

    for trial in 0..config.trial_count {
        let excitatory_trace = generate_conductance_trace(
            &mut rng, &noise, config.time_steps, config.dt, 1.0, 5.0, 0.3,
        );
        let inhibitory_trace = generate_conductance_trace(
            &mut rng, &noise, config.time_steps, config.dt, 0.05, 8.0, 0.02,
        );

        for step in 0..config.time_steps {
            excitatory[[step, trial]] = excitatory_trace[step];
            inhibitory[[step, trial]] = inhibitory_trace[step];
        }
    }

    let placeholder = Array2::zeros((config.time_steps, config.trial_count));
    let inputs = TrialBatch::new(excitatory.clone(), inhibitory.clone(), placeholder)
        .map_err(convert_error)?;
    let target = run_batch(ground_truth, config.dt, &inputs);

    TrialBatch::new(excitatory, inhibitory, target).map_err(convert_error)
}

fn convert_error<E: std::fmt::Display>(error: E) -> Error {
    Error::new(ErrorKind::Other, format!("{}", error))
}

fn write_fit_result(result: &FitResult, path: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, result)?;
    writer.flush()?;

    Ok(())
}

fn load_parameters(path: &str) -> Result<RateModelParameters> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    #[derive(Deserialize)]
    struct PersistedResult {
        parameters: RateModelParameters,
    }

    let persisted: PersistedResult = serde_json::from_reader(reader)?;

    Ok(persisted.parameters)
}

fn run_fit(
    batch: &TrialBatch,
    config: &Configuration,
    initial_guess: &RateModelParameters,
    bounds: &ParameterBounds,
) -> std::result::Result<FitResult, RateModelFittingError> {
    let settings = DifferentialEvolutionSettings {
        max_iterations: config.optimizer.max_iterations,
        seed: config.optimizer.seed,
        ..DifferentialEvolutionSettings::default()
    };

    match config.optimizer.workers {
        0 => fit_rate_model(
            batch, config.simulation.dt, initial_guess, bounds,
            &settings, &ThreadPoolScheduler::new(), true,
        ),
        1 => fit_rate_model(
            batch, config.simulation.dt, initial_guess, bounds,
            &settings, &SequentialScheduler, true,
        ),
        workers => fit_rate_model(
            batch, config.simulation.dt, initial_guess, bounds,
            &settings, &ThreadPoolScheduler::with_workers(workers)?, true,
        ),
    }
}

fn main() -> Result<()> {
    let config = read_configuration()?;

    let ground_truth = RateModelParameters {
        max_fr: 0.6,
        sfr: 400.,
        th: 0.4,
        r: 0.2,
        q: 0.8,
        s: 0.5,
        tau_fr: 15.,
        tau_a: 200.,
        winh: 3.,
    };

    println!("generating synthetic batch...");
    let batch = generate_synthetic_batch(&config.simulation, &ground_truth)?;

    let bounds = ParameterBounds::default();
    let initial_guess = RateModelParameters::default();

    let parameters = if config.run.load_existing {
        println!("loading existing parameters from {}", config.run.output_path);
        load_parameters(&config.run.output_path)?
    } else if config.run.fit {
        println!("fitting rate model...");
        let result = run_fit(&batch, &config, &initial_guess, &bounds).map_err(convert_error)?;

        println!("best loss: {}", result.loss);
        println!("iterations: {}", result.iterations);

        write_fit_result(&result, &config.run.output_path)?;
        println!("saved fit result to {}", config.run.output_path);

        result.parameters
    } else {
        initial_guess
    };

    let final_loss = evaluate_loss(&parameters, config.simulation.dt, &batch);
    let trajectories = run_batch(&parameters, config.simulation.dt, &batch);

    println!("final loss against targets: {}", final_loss);
    println!(
        "simulated {} trials of {} steps each",
        trajectories.dim().1,
        trajectories.dim().0,
    );

    Ok(())
}
