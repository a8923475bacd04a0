//! Optimization problem lifecycle for gridseq.
//!
//! This crate owns everything a single stage problem carries between builds:
//! the optimization container with its variables, constraints, parameters,
//! duals and initial conditions, the build/solve state machine, and the
//! versioned snapshot used to persist a problem definition. Model construction
//! and solving are delegated to collaborators behind the [`ModelBuilder`] and
//! [`Solver`] traits.

pub mod container;
pub mod error;
pub mod problem;
pub mod settings;
pub mod snapshot;
pub mod status;
pub mod traits;

pub use container::{ConstraintRef, OptimizationContainer, Table, ValueTable, VariableRef};
pub use error::{ProblemError, ProblemResult};
pub use problem::{DecisionModel, SimulationProblem};
pub use settings::{ProblemTemplate, Settings, SystemRef};
pub use snapshot::{ProblemSnapshot, SNAPSHOT_SCHEMA_VERSION};
pub use status::{BuildStatus, RunStatus};
pub use traits::{AuxVariableCalculator, BuildContext, ModelBuilder, Solver, TerminationStatus};
