#[cfg(test)]
mod tests {
    use ndarray::Array2;
    use rate_model_fitting::error::TrialBatchError;
    use rate_model_fitting::fitting::{TrialBatch, evaluate_loss, run_batch};
    use rate_model_fitting::rate_model::RateModelParameters;

    fn synthetic_trial(trial: usize, time_steps: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let excitatory: Vec<f64> = (0..time_steps)
            .map(|i| 0.8 + 0.4 * ((i + trial * 17) as f64 * 0.015).sin())
            .collect();
        let inhibitory: Vec<f64> = (0..time_steps)
            .map(|i| 0.05 + 0.03 * ((i + trial * 31) as f64 * 0.01).cos())
            .collect();
        let target = vec![0.; time_steps];

        (excitatory, inhibitory, target)
    }

    /// Batch whose target is the model's own output for the given parameters
    fn self_consistent_batch(
        parameters: &RateModelParameters,
        dt: f64,
        trial_count: usize,
        time_steps: usize,
    ) -> TrialBatch {
        let trials: Vec<(Vec<f64>, Vec<f64>, Vec<f64>)> = (0..trial_count)
            .map(|trial| synthetic_trial(trial, time_steps))
            .collect();

        let inputs = TrialBatch::from_trials(&trials).expect("Error constructing batch");
        let target = run_batch(parameters, dt, &inputs);

        TrialBatch::new(
            inputs.excitatory_conductance().clone(),
            inputs.inhibitory_conductance().clone(),
            target,
        ).expect("Error constructing batch")
    }

    #[test]
    pub fn test_self_target_loss_is_zero() {
        let parameters = RateModelParameters::default();
        let batch = self_consistent_batch(&parameters, 0.1, 5, 500);

        let loss = evaluate_loss(&parameters, 0.1, &batch);

        assert!(loss.abs() < 1e-12);
    }

    #[test]
    pub fn test_wrong_parameters_have_positive_loss() {
        let parameters = RateModelParameters::default();
        let batch = self_consistent_batch(&parameters, 0.1, 5, 500);

        let wrong = RateModelParameters {
            th: -1.,
            winh: 50.,
            ..parameters
        };

        let loss = evaluate_loss(&wrong, 0.1, &batch);

        assert!(loss.is_finite());
        assert!(loss > 0.);
    }

    #[test]
    pub fn test_loss_is_invariant_to_trial_order() {
        let parameters = RateModelParameters::default();

        let trials: Vec<(Vec<f64>, Vec<f64>, Vec<f64>)> = (0..4)
            .map(|trial| synthetic_trial(trial, 400))
            .collect();
        let permuted: Vec<(Vec<f64>, Vec<f64>, Vec<f64>)> = [2, 0, 3, 1]
            .iter()
            .map(|&trial| trials[trial].clone())
            .collect();

        let batch = TrialBatch::from_trials(&trials).expect("Error constructing batch");
        let permuted_batch = TrialBatch::from_trials(&permuted).expect("Error constructing batch");

        let loss = evaluate_loss(&parameters, 0.1, &batch);
        let permuted_loss = evaluate_loss(&parameters, 0.1, &permuted_batch);

        assert!((loss - permuted_loss).abs() < 1e-12);
    }

    #[test]
    pub fn test_run_batch_matches_target_shape() {
        let parameters = RateModelParameters::default();

        let trials: Vec<(Vec<f64>, Vec<f64>, Vec<f64>)> = (0..3)
            .map(|trial| synthetic_trial(trial, 250))
            .collect();
        let batch = TrialBatch::from_trials(&trials).expect("Error constructing batch");

        let simulated = run_batch(&parameters, 0.1, &batch);

        assert_eq!(simulated.dim(), batch.target_firing_rate().dim());
        assert_eq!(simulated.dim(), (250, 3));
    }

    #[test]
    pub fn test_batch_trials_are_independent() {
        let parameters = RateModelParameters::default();

        let trials: Vec<(Vec<f64>, Vec<f64>, Vec<f64>)> = (0..3)
            .map(|trial| synthetic_trial(trial, 300))
            .collect();
        let batch = TrialBatch::from_trials(&trials).expect("Error constructing batch");
        let simulated = run_batch(&parameters, 0.1, &batch);

        // each column must match a standalone single trial simulation
        for (trial, (excitatory, inhibitory, _)) in trials.iter().enumerate() {
            let single = TrialBatch::from_trials(
                &[(excitatory.clone(), inhibitory.clone(), vec![0.; 300])]
            ).expect("Error constructing batch");
            let single_simulated = run_batch(&parameters, 0.1, &single);

            for step in 0..300 {
                assert_eq!(simulated[[step, trial]], single_simulated[[step, 0]]);
            }
        }
    }

    #[test]
    pub fn test_mismatched_conductance_shapes_are_rejected() {
        let excitatory = Array2::zeros((100, 3));
        let inhibitory = Array2::zeros((100, 2));
        let target = Array2::zeros((100, 3));

        let result = TrialBatch::new(excitatory, inhibitory, target);

        assert!(matches!(result, Err(TrialBatchError::ConductanceShapeMismatch)));
    }

    #[test]
    pub fn test_mismatched_target_shape_is_rejected() {
        let excitatory = Array2::zeros((100, 3));
        let inhibitory = Array2::zeros((100, 3));
        let target = Array2::zeros((99, 3));

        let result = TrialBatch::new(excitatory, inhibitory, target);

        assert!(matches!(result, Err(TrialBatchError::TargetShapeMismatch)));
    }

    #[test]
    pub fn test_empty_batch_is_rejected() {
        let excitatory = Array2::zeros((0, 0));
        let inhibitory = Array2::zeros((0, 0));
        let target = Array2::zeros((0, 0));

        let result = TrialBatch::new(excitatory, inhibitory, target);

        assert!(matches!(result, Err(TrialBatchError::EmptyBatch)));

        let result = TrialBatch::from_trials(&[]);

        assert!(matches!(result, Err(TrialBatchError::EmptyBatch)));
    }

    #[test]
    pub fn test_uneven_trial_lengths_are_rejected() {
        let trials = vec![
            (vec![0.; 100], vec![0.; 100], vec![0.; 100]),
            (vec![0.; 100], vec![0.; 99], vec![0.; 100]),
        ];

        let result = TrialBatch::from_trials(&trials);

        assert!(matches!(result, Err(TrialBatchError::TrialLengthMismatch)));
    }
}
