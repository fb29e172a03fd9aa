use std::fmt::{Display, Debug, Formatter, Result};


/// Error set for potential trial batch construction errors
pub enum TrialBatchError {
    /// Excitatory and inhibitory conductance matrices have different shapes
    ConductanceShapeMismatch,
    /// Target firing rate matrix shape does not match the conductance matrices
    TargetShapeMismatch,
    /// Per trial sequences have inconsistent lengths
    TrialLengthMismatch,
    /// Batch contains no trials or no time steps
    EmptyBatch,
}

impl Display for TrialBatchError {
    fn fmt(&self, f: &mut Formatter) -> Result {
        let err_msg = match self {
            TrialBatchError::ConductanceShapeMismatch => "Excitatory and inhibitory conductance matrices must have the same shape",
            TrialBatchError::TargetShapeMismatch => "Target firing rate matrix must have the same shape as the conductance matrices",
            TrialBatchError::TrialLengthMismatch => "All trial sequences must have the same length",
            TrialBatchError::EmptyBatch => "Batch must contain at least one trial and one time step",
        };

        write!(f, "{}", err_msg)
    }
}

impl Debug for TrialBatchError {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "file: {}, line: {}, error: {}", file!(), line!(), self)
    }
}

/// Error set for potential optimization errors
pub enum OptimizationError {
    /// Objective function could not be evaluated
    ObjectiveFunctionFailure(String),
    /// Optimizer settings or bounds are malformed
    InvalidSettings(String),
    /// A candidate parameter vector escaped its declared bounds
    /// (a contract violation, not a recoverable runtime condition)
    ParameterOutOfBounds(String),
}

impl Display for OptimizationError {
    fn fmt(&self, f: &mut Formatter) -> Result {
        match self {
            OptimizationError::ObjectiveFunctionFailure(msg) => write!(f, "Objective function failure: {}", msg),
            OptimizationError::InvalidSettings(msg) => write!(f, "Invalid optimizer settings: {}", msg),
            OptimizationError::ParameterOutOfBounds(msg) => write!(f, "Parameter out of bounds: {}", msg),
        }
    }
}

impl Debug for OptimizationError {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "file: {}, line: {}, error: {}", file!(), line!(), self)
    }
}

/// A set of errors that may occur when using the library
pub enum RateModelFittingError {
    /// Errors related to trial batch construction
    TrialBatchRelatedError(TrialBatchError),
    /// Errors related to optimization
    OptimizationRelatedError(OptimizationError),
}

impl Display for RateModelFittingError {
    fn fmt(&self, f: &mut Formatter) -> Result {
        match self {
            RateModelFittingError::TrialBatchRelatedError(err) => write!(f, "{}", err),
            RateModelFittingError::OptimizationRelatedError(err) => write!(f, "{}", err),
        }
    }
}

impl Debug for RateModelFittingError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "file: {}, line: {}, error: {}", file!(), line!(), self)
    }
}

impl From<TrialBatchError> for RateModelFittingError {
    fn from(err: TrialBatchError) -> RateModelFittingError {
        RateModelFittingError::TrialBatchRelatedError(err)
    }
}

impl From<OptimizationError> for RateModelFittingError {
    fn from(err: OptimizationError) -> RateModelFittingError {
        RateModelFittingError::OptimizationRelatedError(err)
    }
}
