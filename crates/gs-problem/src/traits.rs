//! Collaborator traits: model construction, solving and auxiliary variables.

use crate::container::{ConstraintRef, OptimizationContainer, ValueTable, VariableRef};
use crate::error::ProblemResult;
use crate::settings::{ProblemTemplate, SystemRef};
use chrono::{DateTime, Utc};
use gs_cache::{SeriesWindow, TimeSeriesCache, TimeSeriesKey, TimeSeriesSource};
use gs_core::Resolution;

/// How a solve ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TerminationStatus {
    Feasible,
    Infeasible,
    Error(String),
}

/// Build-time view of the problem's time window and time-series data.
pub struct BuildContext<'a> {
    initial_time: DateTime<Utc>,
    horizon: usize,
    resolution: Resolution,
    series: &'a mut TimeSeriesCache,
    source: &'a dyn TimeSeriesSource,
}

impl<'a> BuildContext<'a> {
    pub fn new(
        initial_time: DateTime<Utc>,
        horizon: usize,
        resolution: Resolution,
        series: &'a mut TimeSeriesCache,
        source: &'a dyn TimeSeriesSource,
    ) -> Self {
        Self {
            initial_time,
            horizon,
            resolution,
            series,
            source,
        }
    }

    pub fn initial_time(&self) -> DateTime<Utc> {
        self.initial_time
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Series values for the build window, read through the problem's cache.
    pub fn time_series(&mut self, key: &TimeSeriesKey) -> ProblemResult<SeriesWindow> {
        Ok(self
            .series
            .get_window(key, self.initial_time, self.horizon, self.source)?)
    }
}

/// Turns a template and system into a solver model, registering artifacts in the container.
pub trait ModelBuilder {
    type Model;

    fn build_model(
        &mut self,
        template: &ProblemTemplate,
        system: &SystemRef,
        container: &mut OptimizationContainer,
        ctx: &mut BuildContext<'_>,
    ) -> ProblemResult<Self::Model>;

    /// Name stored in snapshots; a restore must come from the same builder type.
    fn problem_type(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Solver backend for models produced by a [`ModelBuilder`].
pub trait Solver<M> {
    fn optimize(&mut self, model: &mut M) -> TerminationStatus;

    fn primal(&self, model: &M, variable: VariableRef) -> ProblemResult<f64>;

    fn dual(&self, model: &M, constraint: ConstraintRef) -> ProblemResult<f64>;
}

/// Derived quantity computed from solved values after each successful solve.
pub trait AuxVariableCalculator {
    fn compute(&self, container: &OptimizationContainer) -> ProblemResult<ValueTable>;
}
