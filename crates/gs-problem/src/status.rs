//! Build and run status of a problem.

use std::fmt;

/// Build lifecycle. `reset` returns any state to `Empty`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BuildStatus {
    #[default]
    Empty,
    InProgress,
    Built,
    Failed,
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildStatus::Empty => "EMPTY",
            BuildStatus::InProgress => "IN_PROGRESS",
            BuildStatus::Built => "BUILT",
            BuildStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Outcome of the latest solve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RunStatus {
    #[default]
    NotReady,
    Ready,
    Running,
    Successful,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::NotReady => "NOT_READY",
            RunStatus::Ready => "READY",
            RunStatus::Running => "RUNNING",
            RunStatus::Successful => "SUCCESSFUL",
            RunStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}
