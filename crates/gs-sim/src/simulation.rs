//! The simulation loop.
//!
//! Within a step, executions run in initial-time order; executions that start
//! at the same time run in declared stage order. Each execution resets the
//! stage problem, moves it to its initial time, builds, solves and hands its
//! results to the output cache.

use crate::config::{SimulationConfig, validate_config};
use crate::error::{SimError, SimResult};
use crate::execution::ExecutionCounter;
use crate::reference::SimulationReference;
use chrono::{DateTime, TimeDelta, Utc};
use gs_core::timing::Timer;
use gs_core::{GsError, StageNumber, StepNumber};
use gs_problem::{BuildStatus, ProblemResult, RunStatus, SimulationProblem};
use gs_results::ResultStore;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SimulationStatus {
    #[default]
    Ready,
    Running,
    Successful,
    Failed,
}

/// One build or solve that failed without stopping the run.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutionFailure {
    pub step: StepNumber,
    pub stage: StageNumber,
    pub problem: String,
    pub initial_time: DateTime<Utc>,
    pub error: String,
}

#[derive(Clone, Debug, Default)]
pub struct SimulationSummary {
    pub executions: u64,
    pub failures: Vec<ExecutionFailure>,
    pub rows_written: usize,
    pub status: SimulationStatus,
    pub elapsed_s: f64,
}

struct StageRunner {
    number: StageNumber,
    interval: TimeDelta,
    handoff_step: usize,
    counter: ExecutionCounter,
    problem: Box<dyn SimulationProblem>,
}

/// A configured multi-stage run over a fixed number of steps.
pub struct Simulation<R> {
    name: String,
    initial_time: DateTime<Utc>,
    step_length: TimeDelta,
    fault_tolerant: bool,
    reference: SimulationReference,
    stages: Vec<StageRunner>,
    store: R,
    status: SimulationStatus,
}

impl<R: ResultStore> Simulation<R> {
    /// Wire one problem per configured stage, matched by name.
    pub fn new(
        config: &SimulationConfig,
        reference: SimulationReference,
        problems: Vec<Box<dyn SimulationProblem>>,
        store: R,
    ) -> SimResult<Self> {
        validate_config(config)?;
        let mut declared = config.stage_keys();
        declared.sort_unstable();
        if reference.stage_keys() != declared || reference.steps() != config.steps {
            return Err(GsError::consistency(format!(
                "reference declares {} steps of stages {:?}, configuration has {} steps of stages {:?}",
                reference.steps(),
                reference.stage_keys(),
                config.steps,
                declared
            ))
            .into());
        }

        let mut by_name: HashMap<String, Box<dyn SimulationProblem>> = HashMap::new();
        for problem in problems {
            let name = problem.name().to_string();
            if by_name.insert(name.clone(), problem).is_some() {
                return Err(GsError::invalid_argument(format!("problem {name} given twice")).into());
            }
        }

        let mut stages = Vec::with_capacity(config.stages.len());
        for stage in &config.stages {
            let problem = by_name
                .remove(&stage.name)
                .ok_or_else(|| GsError::key_not_found(format!("problem for stage {}", stage.name)))?;
            let resolution = stage.resolution()?;
            if problem.settings().resolution != resolution {
                return Err(GsError::consistency(format!(
                    "problem {} resolution {}s differs from stage resolution {}s",
                    stage.name,
                    problem.settings().resolution.seconds(),
                    resolution.seconds()
                ))
                .into());
            }
            if problem.settings().horizon != stage.horizon {
                return Err(GsError::consistency(format!(
                    "problem {} horizon {} differs from stage horizon {}",
                    stage.name,
                    problem.settings().horizon,
                    stage.horizon
                ))
                .into());
            }
            stages.push(StageRunner {
                number: stage.number,
                interval: stage.interval(),
                handoff_step: stage.chronology.end_of_interval_step(stage.interval(), resolution)?,
                counter: ExecutionCounter::new(config.executions_per_step(stage))?,
                problem,
            });
        }
        if let Some(extra) = by_name.keys().next() {
            return Err(GsError::invalid_argument(format!("no stage named {extra}")).into());
        }

        Ok(Self {
            name: config.name.clone(),
            initial_time: config.initial_time,
            step_length: config.step_length(),
            fault_tolerant: config.fault_tolerant,
            reference,
            stages,
            store,
            status: SimulationStatus::Ready,
        })
    }

    pub fn status(&self) -> SimulationStatus {
        self.status
    }

    pub fn reference(&self) -> &SimulationReference {
        &self.reference
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    pub fn into_store(self) -> R {
        self.store
    }

    pub fn problem(&self, stage: StageNumber) -> Option<&dyn SimulationProblem> {
        self.stages
            .iter()
            .find(|s| s.number == stage)
            .map(|s| s.problem.as_ref())
    }

    /// Period whose end state seeds the stage's next execution.
    pub fn handoff_step(&self, stage: StageNumber) -> Option<usize> {
        self.stages
            .iter()
            .find(|s| s.number == stage)
            .map(|s| s.handoff_step)
    }

    /// Run every step. A simulation runs once.
    pub fn run(&mut self) -> SimResult<SimulationSummary> {
        if self.status != SimulationStatus::Ready {
            return Err(GsError::consistency(format!("simulation {} has already run", self.name)).into());
        }
        self.initialize()?;
        self.status = SimulationStatus::Running;
        info!(
            simulation = %self.name,
            steps = self.reference.steps(),
            stages = self.stages.len(),
            "simulation started"
        );

        let timer = Timer::start("simulation");
        let mut summary = SimulationSummary::default();
        if let Err(e) = self.run_steps(&mut summary) {
            self.status = SimulationStatus::Failed;
            error!(simulation = %self.name, error = %e, "simulation failed");
            return Err(e);
        }

        self.status = SimulationStatus::Successful;
        summary.status = self.status;
        summary.elapsed_s = timer.stop();
        info!(
            simulation = %self.name,
            executions = summary.executions,
            failures = summary.failures.len(),
            elapsed_s = summary.elapsed_s,
            "simulation finished"
        );
        Ok(summary)
    }

    /// Persist every problem definition once, before the first execution.
    fn initialize(&mut self) -> SimResult<()> {
        if !self.reference.is_reset() {
            return Ok(());
        }
        let models_dir = self.reference.models_dir().to_path_buf();
        for stage in &self.stages {
            stage.problem.snapshot().save(&models_dir)?;
        }
        self.reference.mark_initialized();
        Ok(())
    }

    fn step_start(&self, step: StepNumber) -> DateTime<Utc> {
        self.initial_time + self.step_length * (step as i32 - 1)
    }

    /// `(initial time, stage index)` of every execution in a step, in run order.
    fn schedule(&self, step_start: DateTime<Utc>) -> Vec<(DateTime<Utc>, usize)> {
        let mut schedule = Vec::new();
        for (idx, stage) in self.stages.iter().enumerate() {
            for k in 0..stage.counter.executions() {
                schedule.push((step_start + stage.interval * k as i32, idx));
            }
        }
        schedule.sort_unstable();
        schedule
    }

    fn run_steps(&mut self, summary: &mut SimulationSummary) -> SimResult<()> {
        for step in 1..=self.reference.steps() {
            let step_start = self.step_start(step);
            self.reference.record_date(step, step_start)?;
            info!(step, %step_start, "step started");
            for (initial_time, idx) in self.schedule(step_start) {
                self.execute(step, idx, initial_time, summary)?;
            }
        }
        for stage in &mut self.stages {
            let report = stage.problem.flush_results(&mut self.store, true)?;
            summary.rows_written += report.rows_written;
        }
        Ok(())
    }

    fn execute(
        &mut self,
        step: StepNumber,
        idx: usize,
        initial_time: DateTime<Utc>,
        summary: &mut SimulationSummary,
    ) -> SimResult<()> {
        self.reference.set_current_time(initial_time)?;
        let stage = &mut self.stages[idx];
        let number = stage.number;
        debug!(
            step,
            stage = number,
            problem = %stage.problem.name(),
            %initial_time,
            handoff_step = stage.handoff_step,
            "execution started"
        );

        match run_problem(stage.problem.as_mut(), initial_time) {
            Ok(None) => {}
            Ok(Some(message)) => {
                warn!(step, stage = number, problem = %stage.problem.name(), error = %message, "execution failed, continuing");
                summary.failures.push(ExecutionFailure {
                    step,
                    stage: number,
                    problem: stage.problem.name().to_string(),
                    initial_time,
                    error: message,
                });
            }
            Err(e) if e.is_execution_failure() && self.fault_tolerant => {
                warn!(step, stage = number, problem = %stage.problem.name(), error = %e, "execution failed, continuing");
                summary.failures.push(ExecutionFailure {
                    step,
                    stage: number,
                    problem: stage.problem.name().to_string(),
                    initial_time,
                    error: e.to_string(),
                });
            }
            Err(e) => {
                return Err(SimError::Execution {
                    step,
                    stage: number,
                    source: e,
                });
            }
        }

        self.reference.advance(step, number)?;
        stage.counter.advance();
        summary.executions += 1;
        let report = stage.problem.flush_results(&mut self.store, false)?;
        summary.rows_written += report.rows_written;
        Ok(())
    }
}

/// Reset, build and solve one execution. `Ok(Some(error))` is a failure the
/// problem tolerated under `allow_fails`.
fn run_problem(problem: &mut dyn SimulationProblem, initial_time: DateTime<Utc>) -> ProblemResult<Option<String>> {
    problem.reset();
    problem.set_initial_time(initial_time)?;
    if problem.build()? != BuildStatus::Built {
        return Ok(Some(problem.last_error().unwrap_or("build failed").to_string()));
    }
    if problem.solve()? != RunStatus::Successful {
        return Ok(Some(problem.last_error().unwrap_or("solve failed").to_string()));
    }
    Ok(None)
}
