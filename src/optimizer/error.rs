use thiserror::Error;

use super::solver::SolveStatus;
use crate::domain::{BatteryError, FrameError};

/// Failures of a dispatch optimization run.
///
/// Nothing is partially applied when one of these is returned.
#[derive(Debug, Error)]
pub enum OptimizerError {
    #[error(transparent)]
    InvalidBatteryParameter(#[from] BatteryError),

    #[error("Forecast data misaligned: {0}")]
    InputDataMisalignment(#[from] FrameError),

    #[error("Optimization failed with solver status {status}")]
    OptimizationFailed { status: SolveStatus },

    #[error("Invalid optimizer settings: {0}")]
    InvalidSettings(String),

    #[error("Solver unavailable: {0}")]
    SolverUnavailable(String),
}
