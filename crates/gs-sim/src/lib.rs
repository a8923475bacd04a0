//! Production-cost simulation sequencing.
//!
//! Provides:
//! - Simulation reference: per-(step, stage) execution counters, step dates and logical time
//! - Run workspace preparation (`raw_output/`, `models_json/`, `results/`)
//! - Per-stage execution counters and chronology hand-off
//! - YAML simulation configuration with validation
//! - The simulation loop driving reset → build → solve → flush for every stage problem

pub mod config;
pub mod error;
pub mod execution;
pub mod reference;
pub mod simulation;
pub mod workspace;

pub use config::{
    CacheConfig, CacheRuleConfig, SimulationConfig, StageConfig, ValidationError, load_yaml,
    save_yaml, validate_config,
};
pub use error::{SimError, SimResult};
pub use execution::{Chronology, ExecutionCounter};
pub use reference::SimulationReference;
pub use simulation::{ExecutionFailure, Simulation, SimulationStatus, SimulationSummary};
pub use workspace::{RunWorkspace, prepare_workspace, prepare_workspace_at};
