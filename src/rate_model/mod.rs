//! An implementation of a conductance-driven firing rate model with
//! spike frequency adaptation.

use serde::{Deserialize, Serialize};
use crate::error::OptimizationError;


/// Number of free parameters in the rate model
pub const PARAMETER_COUNT: usize = 9;

/// Free parameters of the conductance-driven rate model, serialized with
/// the key names used by existing result tooling
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateModelParameters {
    /// Saturating maximum firing rate
    #[serde(rename = "MaxFR")]
    pub max_fr: f64,
    /// Gain of the firing rate nonlinearity
    #[serde(rename = "Sfr")]
    pub sfr: f64,
    /// Drive threshold
    pub th: f64,
    /// Adaptation drive coefficient
    pub r: f64,
    /// Excitatory mixing coefficient
    pub q: f64,
    /// Adaptation feedback weight
    pub s: f64,
    /// Firing rate time constant (ms)
    #[serde(rename = "tau_FR")]
    pub tau_fr: f64,
    /// Adaptation time constant (ms)
    #[serde(rename = "tau_A")]
    pub tau_a: f64,
    /// Inhibitory conductance weight
    pub winh: f64,
}

impl Default for RateModelParameters {
    fn default() -> Self {
        RateModelParameters {
            max_fr: 0.9,
            sfr: 625.,
            th: 0.5,
            r: 0.1,
            q: 0.9,
            s: 0.9,
            tau_fr: 10.,
            tau_a: 100.,
            winh: 5.,
        }
    }
}

impl RateModelParameters {
    /// Returns the parameters as an ordered array for optimizer interop
    pub fn to_array(&self) -> [f64; PARAMETER_COUNT] {
        [
            self.max_fr, self.sfr, self.th, self.r, self.q,
            self.s, self.tau_fr, self.tau_a, self.winh,
        ]
    }

    /// Builds parameters from an ordered slice, the inverse of [`RateModelParameters::to_array`]
    pub fn from_slice(values: &[f64]) -> Result<Self, OptimizationError> {
        if values.len() != PARAMETER_COUNT {
            return Err(
                OptimizationError::InvalidSettings(
                    format!("Expected {} parameter values, got {}", PARAMETER_COUNT, values.len())
                )
            );
        }

        Ok(
            RateModelParameters {
                max_fr: values[0],
                sfr: values[1],
                th: values[2],
                r: values[3],
                q: values[4],
                s: values[5],
                tau_fr: values[6],
                tau_a: values[7],
                winh: values[8],
            }
        )
    }
}

/// Closed search intervals for each rate model parameter, enforced by the
/// optimizer as box constraints, a degenerate interval (lower equal to
/// upper) pins the parameter to a single value
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParameterBounds {
    /// Bounds on the saturating maximum firing rate
    pub max_fr: (f64, f64),
    /// Bounds on the nonlinearity gain
    pub sfr: (f64, f64),
    /// Bounds on the drive threshold
    pub th: (f64, f64),
    /// Bounds on the adaptation drive coefficient
    pub r: (f64, f64),
    /// Bounds on the excitatory mixing coefficient
    pub q: (f64, f64),
    /// Bounds on the adaptation feedback weight
    pub s: (f64, f64),
    /// Bounds on the firing rate time constant (ms)
    pub tau_fr: (f64, f64),
    /// Bounds on the adaptation time constant (ms)
    pub tau_a: (f64, f64),
    /// Bounds on the inhibitory conductance weight
    pub winh: (f64, f64),
}

impl Default for ParameterBounds {
    fn default() -> Self {
        ParameterBounds {
            max_fr: (0.2, 1.0),
            sfr: (100., 10000.),
            th: (-100., 100.),
            r: (0.0001, 1.0),
            q: (0.0001, 1.0),
            s: (0.0001, 1.0),
            tau_fr: (0.1, 100.),
            tau_a: (0.1, 1000.),
            winh: (0.1, 100.),
        }
    }
}

impl ParameterBounds {
    /// Returns the bounds as an ordered array for optimizer interop
    pub fn to_array(&self) -> [(f64, f64); PARAMETER_COUNT] {
        [
            self.max_fr, self.sfr, self.th, self.r, self.q,
            self.s, self.tau_fr, self.tau_a, self.winh,
        ]
    }

    /// Returns `true` if every parameter lies within its closed interval
    pub fn contains(&self, parameters: &RateModelParameters) -> bool {
        self.to_array()
            .iter()
            .zip(parameters.to_array().iter())
            .all(|((lower, upper), value)| lower <= value && value <= upper)
    }

    /// Builds parameters pinned to the lower bound of each interval,
    /// useful for sweeping bound corners
    pub fn lower_corner(&self) -> RateModelParameters {
        let values: Vec<f64> = self.to_array().iter().map(|(lower, _)| *lower).collect();

        // length is PARAMETER_COUNT by construction
        RateModelParameters::from_slice(&values).unwrap()
    }

    /// Builds parameters pinned to the upper bound of each interval
    pub fn upper_corner(&self) -> RateModelParameters {
        let values: Vec<f64> = self.to_array().iter().map(|(_, upper)| *upper).collect();

        RateModelParameters::from_slice(&values).unwrap()
    }
}

/// Numerically stable logistic function
fn sigmoid(x: f64) -> f64 {
    if x >= 0. {
        1. / (1. + (-x).exp())
    } else {
        let exponential = x.exp();
        exponential / (1. + exponential)
    }
}

/// A population firing rate model driven by excitatory and inhibitory
/// synaptic conductance input
///
/// The firing rate state relaxes toward a saturating logistic function of the
/// net drive with time constant `tau_fr`, while a slow adaptation state
/// integrates firing activity with time constant `tau_a` and feeds back
/// negatively into the drive, reproducing spike frequency adaptation
#[derive(Clone, Debug, PartialEq)]
pub struct RateModelNeuron {
    /// Instantaneous firing rate state
    pub firing_rate: f64,
    /// Slow adaptation state
    pub adaptation: f64,
    /// Model parameters
    pub parameters: RateModelParameters,
    /// Timestep (ms)
    pub dt: f64,
}

impl RateModelNeuron {
    /// Creates a model at the resting baseline with the given parameters
    pub fn new(parameters: RateModelParameters, dt: f64) -> Self {
        RateModelNeuron {
            firing_rate: 0.,
            adaptation: 0.,
            parameters,
            dt,
        }
    }

    /// Resets the firing rate and adaptation states to baseline,
    /// state never carries across trials
    pub fn reset(&mut self) {
        self.firing_rate = 0.;
        self.adaptation = 0.;
    }

    /// Saturating steady state rate for the current adaptation level and
    /// the given conductance input
    fn steady_state_rate(&self, g_exc: f64, g_inh: f64) -> f64 {
        let drive = self.parameters.q * g_exc
            - self.parameters.winh * g_inh
            - self.parameters.th
            - self.parameters.s * self.adaptation;

        self.parameters.max_fr * sigmoid(self.parameters.sfr * drive)
    }

    fn get_firing_rate_change(&self, g_exc: f64, g_inh: f64) -> f64 {
        let alpha = (self.dt / self.parameters.tau_fr).min(1.);

        (self.steady_state_rate(g_exc, g_inh) - self.firing_rate) * alpha
    }

    fn get_adaptation_change(&self) -> f64 {
        let alpha = (self.dt / self.parameters.tau_a).min(1.);

        (self.parameters.r * self.firing_rate - self.adaptation) * alpha
    }

    /// Advances the model by one timestep given one sample of excitatory and
    /// inhibitory conductance and returns the updated firing rate, a step
    /// that would produce a non-finite state clamps to a finite sentinel
    /// instead so downstream loss values stay valid
    pub fn iterate(&mut self, g_exc: f64, g_inh: f64) -> f64 {
        let d_firing_rate = self.get_firing_rate_change(g_exc, g_inh);
        let d_adaptation = self.get_adaptation_change();

        let firing_rate = self.firing_rate + d_firing_rate;
        let adaptation = self.adaptation + d_adaptation;

        self.firing_rate = if firing_rate.is_finite() {
            firing_rate.clamp(0., self.parameters.max_fr)
        } else {
            self.parameters.max_fr
        };
        self.adaptation = if adaptation.is_finite() {
            adaptation.max(0.)
        } else {
            0.
        };

        self.firing_rate
    }

    /// Runs one full trial from the resting baseline, output sample `k` is
    /// the firing rate after consuming conductance sample `k` so the
    /// trajectory length always equals the input length
    ///
    /// Both the fitting loss and any rerun with converged parameters go
    /// through this method so the two paths can never disagree on alignment
    pub fn run_trial(&mut self, g_exc: &[f64], g_inh: &[f64]) -> Vec<f64> {
        self.reset();

        g_exc.iter()
            .zip(g_inh.iter())
            .map(|(&excitatory, &inhibitory)| self.iterate(excitatory, inhibitory))
            .collect()
    }
}
