//! Problem lifecycle: reset, build, solve, and result hand-off.

use crate::container::OptimizationContainer;
use crate::error::{ProblemError, ProblemResult};
use crate::settings::{ProblemTemplate, Settings, SystemRef};
use crate::snapshot::{ProblemSnapshot, SNAPSHOT_SCHEMA_VERSION};
use crate::status::{BuildStatus, RunStatus};
use crate::traits::{AuxVariableCalculator, BuildContext, ModelBuilder, Solver, TerminationStatus};
use chrono::{DateTime, Utc};
use gs_cache::{CacheFlushRules, FlushReport, OptimizationResultCacheKey, OutputCache, TimeSeriesCache, TimeSeriesSource};
use gs_core::timing::{AccumulatingTimer, Timer};
use gs_core::{ArtifactKind, ContainerKey, GsError};
use gs_results::ResultStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Object-safe view of a problem, as driven by the simulation loop.
pub trait SimulationProblem {
    fn name(&self) -> &str;

    fn settings(&self) -> &Settings;

    /// Move the build window. Only valid while the problem is empty.
    fn set_initial_time(&mut self, initial_time: DateTime<Utc>) -> ProblemResult<()>;

    /// Drop the container and solver model and start over from the settings.
    fn reset(&mut self);

    fn build(&mut self) -> ProblemResult<BuildStatus>;

    fn solve(&mut self) -> ProblemResult<RunStatus>;

    fn build_status(&self) -> BuildStatus;

    fn run_status(&self) -> RunStatus;

    fn last_error(&self) -> Option<&str>;

    /// Push buffered results into `store`. Without `force` this only flushes
    /// once the output cache reaches its minimum flush size.
    fn flush_results(&mut self, store: &mut dyn ResultStore, force: bool) -> ProblemResult<FlushReport>;

    fn snapshot(&self) -> ProblemSnapshot;
}

/// A stage problem: owns its container, solver model and caches.
pub struct DecisionModel<B: ModelBuilder, S> {
    name: String,
    template: ProblemTemplate,
    system: SystemRef,
    settings: Settings,
    builder: B,
    solver: S,
    source: Arc<dyn TimeSeriesSource>,
    container: OptimizationContainer,
    model: Option<B::Model>,
    time_series: TimeSeriesCache,
    outputs: OutputCache,
    aux_variables: Vec<(ContainerKey, Box<dyn AuxVariableCalculator>)>,
    build_status: BuildStatus,
    run_status: RunStatus,
    last_error: Option<String>,
    build_timer: AccumulatingTimer,
    solve_timer: AccumulatingTimer,
}

impl<B, S> DecisionModel<B, S>
where
    B: ModelBuilder,
    S: Solver<B::Model>,
{
    pub fn new(
        name: impl Into<String>,
        template: ProblemTemplate,
        system: SystemRef,
        settings: Settings,
        builder: B,
        solver: S,
        source: Arc<dyn TimeSeriesSource>,
    ) -> ProblemResult<Self> {
        let name = name.into();
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(GsError::invalid_argument(format!("invalid problem name {name:?}")).into());
        }
        let time_series = TimeSeriesCache::new(settings.time_series_cache, settings.resolution);
        Ok(Self {
            name,
            template,
            system,
            container: OptimizationContainer::new(settings.clone()),
            settings,
            builder,
            solver,
            source,
            model: None,
            time_series,
            outputs: OutputCache::default(),
            aux_variables: Vec::new(),
            build_status: BuildStatus::Empty,
            run_status: RunStatus::NotReady,
            last_error: None,
            build_timer: AccumulatingTimer::new(),
            solve_timer: AccumulatingTimer::new(),
        })
    }

    /// Rebuild a problem from a snapshot. The builder must be of the type that wrote it.
    pub fn from_snapshot(
        snapshot: ProblemSnapshot,
        builder: B,
        solver: S,
        source: Arc<dyn TimeSeriesSource>,
    ) -> ProblemResult<Self> {
        snapshot.ensure_type(builder.problem_type())?;
        let system = SystemRef {
            name: snapshot.name.clone(),
            file: snapshot.system_file,
        };
        Self::new(
            snapshot.name,
            snapshot.template,
            system,
            snapshot.settings,
            builder,
            solver,
            source,
        )
    }

    pub fn with_cache_rules(mut self, rules: CacheFlushRules) -> Self {
        self.outputs = OutputCache::new(rules);
        self
    }

    /// Register an auxiliary variable, recomputed after every successful solve.
    pub fn add_aux_variable(
        &mut self,
        key: ContainerKey,
        calculator: Box<dyn AuxVariableCalculator>,
    ) -> ProblemResult<()> {
        if key.kind != ArtifactKind::AuxVariable {
            return Err(GsError::invalid_argument(format!("{key} is not an auxiliary variable")).into());
        }
        if self.aux_variables.iter().any(|(k, _)| *k == key) {
            return Err(GsError::consistency(format!("{key} is already registered")).into());
        }
        self.aux_variables.push((key, calculator));
        Ok(())
    }

    pub fn container(&self) -> &OptimizationContainer {
        &self.container
    }

    pub fn container_mut(&mut self) -> &mut OptimizationContainer {
        &mut self.container
    }

    pub fn template(&self) -> &ProblemTemplate {
        &self.template
    }

    pub fn system(&self) -> &SystemRef {
        &self.system
    }

    pub fn time_series_cache(&self) -> &TimeSeriesCache {
        &self.time_series
    }

    pub fn output_cache(&self) -> &OutputCache {
        &self.outputs
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn build_timer(&self) -> &AccumulatingTimer {
        &self.build_timer
    }

    pub fn solve_timer(&self) -> &AccumulatingTimer {
        &self.solve_timer
    }

    fn invalid_state(&self, operation: &'static str) -> ProblemError {
        ProblemError::InvalidState {
            problem: self.name.clone(),
            operation,
            status: self.build_status.to_string(),
        }
    }

    fn fail_build(&mut self, cause: ProblemError) -> ProblemResult<BuildStatus> {
        self.build_status = BuildStatus::Failed;
        self.run_status = RunStatus::NotReady;
        self.last_error = Some(cause.to_string());
        error!(problem = %self.name, error = %cause, "build failed");
        if self.settings.allow_fails {
            return Ok(BuildStatus::Failed);
        }
        Err(ProblemError::BuildFailure {
            problem: self.name.clone(),
            source: Box::new(cause),
        })
    }

    fn fail_solve(&mut self, message: String) -> ProblemResult<RunStatus> {
        self.run_status = RunStatus::Failed;
        self.last_error = Some(message.clone());
        error!(problem = %self.name, error = %message, "solve failed");
        if self.settings.allow_fails {
            return Ok(RunStatus::Failed);
        }
        Err(ProblemError::SolveFailure {
            problem: self.name.clone(),
            message,
        })
    }

    /// Read primal values for every variable and duals for every exported constraint.
    fn collect_solution(&mut self) -> ProblemResult<()> {
        let Some(model) = self.model.as_ref() else {
            return Err(self.invalid_state("read solution of"));
        };
        let solver = &self.solver;

        let mut primal = BTreeMap::new();
        for (key, handles) in self.container.variables() {
            primal.insert(key.clone(), handles.try_map(|v| solver.primal(model, v))?);
        }
        let mut duals = BTreeMap::new();
        for key in &self.template.duals {
            let handles = self.container.constraint(key)?;
            duals.insert(key.clone(), handles.try_map(|c| solver.dual(model, c))?);
        }

        for (key, values) in primal {
            self.container.record_primal(key, values);
        }
        for (key, values) in duals {
            self.container.record_dual(key, values);
        }
        Ok(())
    }

    fn compute_aux_variables(&mut self) -> ProblemResult<()> {
        for (key, calculator) in &self.aux_variables {
            let values = calculator.compute(&self.container)?;
            self.container.record_aux(key.clone(), values);
        }
        Ok(())
    }

    fn process_solution(&mut self) -> ProblemResult<()> {
        self.collect_solution()?;
        self.compute_aux_variables()?;
        self.write_results()
    }

    /// Buffer every solved table in the output cache, stamped with the build's initial time.
    fn write_results(&mut self) -> ProblemResult<()> {
        let Some(timestamp) = self.container.initial_time() else {
            return Err(GsError::invalid_argument("solved container has no initial time").into());
        };
        for (key, table) in self.container.solved_tables() {
            let cache_key = OptimizationResultCacheKey::new(self.name.clone(), key.clone());
            self.outputs.append(cache_key, timestamp, table.data().to_vec())?;
        }
        Ok(())
    }
}

impl<B, S> SimulationProblem for DecisionModel<B, S>
where
    B: ModelBuilder,
    S: Solver<B::Model>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn set_initial_time(&mut self, initial_time: DateTime<Utc>) -> ProblemResult<()> {
        if self.build_status != BuildStatus::Empty {
            return Err(self.invalid_state("move initial time of"));
        }
        self.settings.initial_time = Some(initial_time);
        self.container = OptimizationContainer::new(self.settings.clone());
        Ok(())
    }

    fn reset(&mut self) {
        self.container = OptimizationContainer::new(self.settings.clone());
        self.model = None;
        self.time_series.clear();
        self.build_status = BuildStatus::Empty;
        self.run_status = RunStatus::NotReady;
        self.last_error = None;
        debug!(problem = %self.name, "problem reset");
    }

    fn build(&mut self) -> ProblemResult<BuildStatus> {
        if self.build_status != BuildStatus::Empty {
            return Err(self.invalid_state("build"));
        }
        let Some(initial_time) = self.settings.initial_time else {
            return Err(GsError::invalid_argument(format!(
                "problem {} has no initial time",
                self.name
            ))
            .into());
        };

        self.build_status = BuildStatus::InProgress;
        info!(problem = %self.name, %initial_time, horizon = self.settings.horizon, "building problem");
        let timer = Timer::start("build");
        let mut ctx = BuildContext::new(
            initial_time,
            self.settings.horizon,
            self.settings.resolution,
            &mut self.time_series,
            self.source.as_ref(),
        );
        let result = self
            .builder
            .build_model(&self.template, &self.system, &mut self.container, &mut ctx);
        self.build_timer.record(timer.stop_and_log());

        match result {
            Ok(model) => {
                self.model = Some(model);
                self.build_status = BuildStatus::Built;
                self.run_status = RunStatus::Ready;
                info!(
                    problem = %self.name,
                    variables = self.container.variable_count(),
                    constraints = self.container.constraint_count(),
                    "problem built"
                );
                Ok(BuildStatus::Built)
            }
            Err(e) => self.fail_build(e),
        }
    }

    fn solve(&mut self) -> ProblemResult<RunStatus> {
        if self.build_status != BuildStatus::Built {
            return Err(self.invalid_state("solve"));
        }
        let Some(model) = self.model.as_mut() else {
            return Err(self.invalid_state("solve"));
        };

        self.run_status = RunStatus::Running;
        let timer = Timer::start("solve");
        let termination = self.solver.optimize(model);
        self.solve_timer.record(timer.stop_and_log());

        match termination {
            TerminationStatus::Feasible => {}
            TerminationStatus::Infeasible => {
                return self.fail_solve("solver reported an infeasible model".to_string());
            }
            TerminationStatus::Error(message) => return self.fail_solve(message),
        }

        if let Err(e) = self.process_solution() {
            return self.fail_solve(e.to_string());
        }

        self.run_status = RunStatus::Successful;
        info!(problem = %self.name, "problem solved");
        Ok(RunStatus::Successful)
    }

    fn build_status(&self) -> BuildStatus {
        self.build_status
    }

    fn run_status(&self) -> RunStatus {
        self.run_status
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn flush_results(&mut self, store: &mut dyn ResultStore, force: bool) -> ProblemResult<FlushReport> {
        if !force && !self.outputs.should_flush() {
            return Ok(FlushReport::default());
        }
        let report = self.outputs.flush(|key, timestamp, values| {
            store.write(&key.model, key.key.kind, &key.key.file_stem(), timestamp, values)
        })?;
        if report.rows_written > 0 {
            debug!(
                problem = %self.name,
                rows = report.rows_written,
                bytes = report.bytes_written,
                "results flushed"
            );
        }
        Ok(report)
    }

    fn snapshot(&self) -> ProblemSnapshot {
        ProblemSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            problem_type: self.builder.problem_type().to_string(),
            name: self.name.clone(),
            template: self.template.clone(),
            system_file: self.system.file.clone(),
            settings: self.settings.clone(),
        }
    }
}
