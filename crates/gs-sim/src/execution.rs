//! Per-stage execution counting and chronology hand-off.

use chrono::TimeDelta;
use gs_core::{GsError, GsResult, Resolution, periods_in};
use serde::{Deserialize, Serialize};

/// Position of a stage within the current step. Wraps back to zero once every
/// execution of the step has run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecutionCounter {
    count: u32,
    executions: u32,
}

impl ExecutionCounter {
    pub fn new(executions: u32) -> GsResult<Self> {
        if executions == 0 {
            return Err(GsError::invalid_argument("a stage runs at least once per step"));
        }
        Ok(Self {
            count: 0,
            executions,
        })
    }

    /// Count one execution; returns the new position.
    pub fn advance(&mut self) -> u32 {
        self.count += 1;
        if self.count >= self.executions {
            self.count = 0;
        }
        self.count
    }

    pub fn current(&self) -> u32 {
        self.count
    }

    pub fn executions(&self) -> u32 {
        self.executions
    }

    pub fn is_step_start(&self) -> bool {
        self.count == 0
    }
}

/// How a stage hands its state to the next execution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chronology {
    /// The next execution starts where this interval ends.
    #[default]
    Consecutive,
    /// The next execution starts one period later.
    RecedingHorizon,
}

impl Chronology {
    /// Period of this execution whose end state seeds the next one.
    pub fn end_of_interval_step(self, interval: TimeDelta, resolution: Resolution) -> GsResult<usize> {
        match self {
            Chronology::Consecutive => periods_in(interval, resolution),
            Chronology::RecedingHorizon => Ok(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn wraps_after_configured_executions() {
        let mut counter = ExecutionCounter::new(12).unwrap();
        for expected in 1..12 {
            assert_eq!(counter.advance(), expected);
        }
        assert_eq!(counter.advance(), 0);
        assert!(counter.is_step_start());
    }

    #[test]
    fn zero_executions_rejected() {
        assert!(ExecutionCounter::new(0).is_err());
    }

    #[test]
    fn consecutive_hands_off_at_interval_end() {
        let five_min = Resolution::from_minutes(5).unwrap();
        let hour = TimeDelta::hours(1);
        assert_eq!(Chronology::Consecutive.end_of_interval_step(hour, five_min).unwrap(), 12);
        assert_eq!(Chronology::RecedingHorizon.end_of_interval_step(hour, five_min).unwrap(), 1);
    }

    #[test]
    fn consecutive_requires_whole_periods() {
        let hour = Resolution::from_minutes(60).unwrap();
        assert!(Chronology::Consecutive
            .end_of_interval_step(TimeDelta::minutes(90), hour)
            .is_err());
        assert!(Chronology::Consecutive
            .end_of_interval_step(TimeDelta::zero(), hour)
            .is_err());
    }

    proptest! {
        #[test]
        fn position_is_advances_mod_executions(executions in 1u32..50, advances in 0usize..500) {
            let mut counter = ExecutionCounter::new(executions).unwrap();
            for _ in 0..advances {
                counter.advance();
            }
            prop_assert_eq!(counter.current(), (advances as u32) % executions);
        }
    }
}
