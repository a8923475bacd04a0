//! Simulation reference: the run-wide step/stage bookkeeping.

use chrono::{DateTime, Utc};
use gs_core::{GsError, GsResult, StageNumber, StepNumber};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Execution counters, step dates and logical time of one simulation run.
///
/// Steps are numbered from 1. Every (step, stage) pair is declared at
/// construction; lookups outside that table fail with `KeyNotFound`.
#[derive(Clone, Debug)]
pub struct SimulationReference {
    raw_dir: PathBuf,
    models_dir: PathBuf,
    results_dir: PathBuf,
    run_count: BTreeMap<StepNumber, BTreeMap<StageNumber, u64>>,
    date_ref: BTreeMap<StepNumber, DateTime<Utc>>,
    current_time: Option<DateTime<Utc>>,
    reset: bool,
}

impl SimulationReference {
    pub fn new(
        raw_dir: PathBuf,
        models_dir: PathBuf,
        results_dir: PathBuf,
        steps: StepNumber,
        stage_keys: &[StageNumber],
    ) -> GsResult<Self> {
        if steps < 1 {
            return Err(GsError::invalid_argument("simulation needs at least one step"));
        }
        if stage_keys.is_empty() {
            return Err(GsError::invalid_argument("simulation needs at least one stage"));
        }
        let unique: BTreeSet<StageNumber> = stage_keys.iter().copied().collect();
        if unique.len() != stage_keys.len() {
            return Err(GsError::invalid_argument(format!(
                "duplicate stage keys in {stage_keys:?}"
            )));
        }

        let stages: BTreeMap<StageNumber, u64> = unique.into_iter().map(|s| (s, 0)).collect();
        let run_count = (1..=steps).map(|step| (step, stages.clone())).collect();
        Ok(Self {
            raw_dir,
            models_dir,
            results_dir,
            run_count,
            date_ref: BTreeMap::new(),
            current_time: None,
            reset: true,
        })
    }

    fn counter_mut(&mut self, step: StepNumber, stage: StageNumber) -> GsResult<&mut u64> {
        self.run_count
            .get_mut(&step)
            .and_then(|stages| stages.get_mut(&stage))
            .ok_or_else(|| GsError::key_not_found(format!("step {step}, stage {stage}")))
    }

    /// Count one execution of `stage` in `step`. Returns the new count.
    pub fn advance(&mut self, step: StepNumber, stage: StageNumber) -> GsResult<u64> {
        let count = self.counter_mut(step, stage)?;
        *count += 1;
        Ok(*count)
    }

    pub fn run_count(&self, step: StepNumber, stage: StageNumber) -> GsResult<u64> {
        self.run_count
            .get(&step)
            .and_then(|stages| stages.get(&stage))
            .copied()
            .ok_or_else(|| GsError::key_not_found(format!("step {step}, stage {stage}")))
    }

    /// Record the start of `step`'s first forecast window. Repeats must agree.
    pub fn record_date(&mut self, step: StepNumber, timestamp: DateTime<Utc>) -> GsResult<()> {
        if !self.run_count.contains_key(&step) {
            return Err(GsError::key_not_found(format!("step {step}")));
        }
        match self.date_ref.get(&step) {
            Some(existing) if *existing != timestamp => Err(GsError::consistency(format!(
                "step {step} already started at {existing}, got {timestamp}"
            ))),
            Some(_) => Ok(()),
            None => {
                self.date_ref.insert(step, timestamp);
                Ok(())
            }
        }
    }

    pub fn date(&self, step: StepNumber) -> Option<DateTime<Utc>> {
        self.date_ref.get(&step).copied()
    }

    /// Advance logical time. Never moves backwards.
    pub fn set_current_time(&mut self, t: DateTime<Utc>) -> GsResult<()> {
        if let Some(current) = self.current_time
            && t < current
        {
            return Err(GsError::consistency(format!(
                "simulation time cannot move back from {current} to {t}"
            )));
        }
        self.current_time = Some(t);
        Ok(())
    }

    pub fn current_time(&self) -> Option<DateTime<Utc>> {
        self.current_time
    }

    pub fn total_executions(&self) -> u64 {
        self.run_count.values().flat_map(|stages| stages.values()).sum()
    }

    /// Zero every counter and forget recorded dates and time.
    pub fn reset_counts(&mut self) {
        for stages in self.run_count.values_mut() {
            stages.values_mut().for_each(|count| *count = 0);
        }
        self.date_ref.clear();
        self.current_time = None;
        self.reset = true;
    }

    pub fn mark_initialized(&mut self) {
        self.reset = false;
    }

    pub fn is_reset(&self) -> bool {
        self.reset
    }

    pub fn steps(&self) -> StepNumber {
        self.run_count.len() as StepNumber
    }

    pub fn stage_keys(&self) -> Vec<StageNumber> {
        self.run_count
            .values()
            .next()
            .map(|stages| stages.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn reference(steps: StepNumber, stages: &[StageNumber]) -> GsResult<SimulationReference> {
        SimulationReference::new(
            PathBuf::from("raw"),
            PathBuf::from("models"),
            PathBuf::from("results"),
            steps,
            stages,
        )
    }

    #[test]
    fn counters_start_at_zero() {
        let r = reference(2, &[1, 2]).unwrap();
        for step in 1..=2 {
            for stage in [1, 2] {
                assert_eq!(r.run_count(step, stage).unwrap(), 0);
            }
        }
        assert!(r.is_reset());
        assert_eq!(r.stage_keys(), vec![1, 2]);
    }

    #[test]
    fn construction_rejects_bad_input() {
        assert!(matches!(reference(0, &[1]), Err(GsError::InvalidArgument { .. })));
        assert!(matches!(reference(1, &[]), Err(GsError::InvalidArgument { .. })));
        assert!(matches!(reference(1, &[1, 1]), Err(GsError::InvalidArgument { .. })));
    }

    #[test]
    fn advance_only_touches_its_pair() {
        let mut r = reference(3, &[1, 2]).unwrap();
        for expected in 1..=3 {
            assert_eq!(r.advance(2, 1).unwrap(), expected);
        }
        for step in 1..=3 {
            for stage in [1, 2] {
                let expected = if (step, stage) == (2, 1) { 3 } else { 0 };
                assert_eq!(r.run_count(step, stage).unwrap(), expected);
            }
        }
        assert_eq!(r.total_executions(), 3);
    }

    #[test]
    fn undeclared_pair_is_key_not_found() {
        let mut r = reference(3, &[1, 2]).unwrap();
        assert!(matches!(r.advance(4, 1), Err(GsError::KeyNotFound { .. })));
        assert!(matches!(r.advance(1, 3), Err(GsError::KeyNotFound { .. })));
        assert!(matches!(r.run_count(0, 1), Err(GsError::KeyNotFound { .. })));
    }

    #[test]
    fn record_date_is_idempotent_and_checked() {
        let mut r = reference(2, &[1]).unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        r.record_date(1, t0).unwrap();
        r.record_date(1, t0).unwrap();
        assert_eq!(r.date(1), Some(t0));
        assert!(matches!(r.record_date(1, t1), Err(GsError::Consistency { .. })));
        assert!(matches!(r.record_date(3, t1), Err(GsError::KeyNotFound { .. })));
    }

    #[test]
    fn time_is_monotonic() {
        let mut r = reference(1, &[1]).unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
        r.set_current_time(t0).unwrap();
        r.set_current_time(t0).unwrap();
        r.set_current_time(t1).unwrap();
        assert!(matches!(r.set_current_time(t0), Err(GsError::Consistency { .. })));
        assert_eq!(r.current_time(), Some(t1));
    }

    #[test]
    fn reset_counts_clears_everything() {
        let mut r = reference(1, &[1]).unwrap();
        r.advance(1, 1).unwrap();
        r.mark_initialized();
        r.reset_counts();
        assert_eq!(r.total_executions(), 0);
        assert!(r.is_reset());
        assert!(r.current_time().is_none());
    }

    proptest! {
        #[test]
        fn counts_equal_number_of_advances(
            calls in proptest::collection::vec((1u32..=4, 1u32..=3), 0..64)
        ) {
            let mut r = reference(4, &[1, 2, 3]).unwrap();
            for (step, stage) in &calls {
                r.advance(*step, *stage).unwrap();
            }
            prop_assert_eq!(r.total_executions(), calls.len() as u64);
            for step in 1..=4 {
                for stage in 1..=3 {
                    let expected = calls.iter().filter(|c| **c == (step, stage)).count() as u64;
                    prop_assert_eq!(r.run_count(step, stage).unwrap(), expected);
                }
            }
        }
    }
}
