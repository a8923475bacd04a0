//! Error types for simulation operations.

use crate::config::ValidationError;
use gs_core::{GsError, StageNumber, StepNumber};
use gs_problem::ProblemError;
use gs_results::ResultsError;
use thiserror::Error;

/// Errors raised while configuring or running a simulation.
#[derive(Error, Debug)]
pub enum SimError {
    #[error(transparent)]
    Core(#[from] GsError),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution failed at step {step}, stage {stage}: {source}")]
    Execution {
        step: StepNumber,
        stage: StageNumber,
        #[source]
        source: ProblemError,
    },

    #[error("Problem error: {0}")]
    Problem(#[from] ProblemError),

    #[error("Results error: {0}")]
    Results(#[from] ResultsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type SimResult<T> = Result<T, SimError>;
