//! Error types for problem lifecycle operations.

use gs_cache::CacheError;
use gs_core::GsError;
use gs_results::ResultsError;
use thiserror::Error;

/// Errors raised while building, solving or persisting a problem.
#[derive(Error, Debug)]
pub enum ProblemError {
    #[error(transparent)]
    Core(#[from] GsError),

    #[error("Cannot {operation} problem {problem} in state {status}")]
    InvalidState {
        problem: String,
        operation: &'static str,
        status: String,
    },

    #[error("Build failed for {problem}: {source}")]
    BuildFailure {
        problem: String,
        #[source]
        source: Box<ProblemError>,
    },

    #[error("Solve failed for {problem}: {message}")]
    SolveFailure { problem: String, message: String },

    #[error("Collaborator error: {message}")]
    Collaborator { message: String },

    #[error("Time series error: {0}")]
    Cache(#[from] CacheError),

    #[error("Results error: {0}")]
    Results(#[from] ResultsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

impl ProblemError {
    /// Failure reported by an external builder or solver.
    pub fn collaborator(message: impl Into<String>) -> Self {
        ProblemError::Collaborator {
            message: message.into(),
        }
    }

    /// True for build or solve failures that fault-tolerant callers may skip.
    pub fn is_execution_failure(&self) -> bool {
        matches!(
            self,
            ProblemError::BuildFailure { .. } | ProblemError::SolveFailure { .. }
        )
    }
}

pub type ProblemResult<T> = Result<T, ProblemError>;
