//! Time-period arithmetic for rolling horizons.

use crate::error::{GsError, GsResult};
use chrono::{DateTime, TimeDelta, Utc};
use core::fmt;
use serde::{Deserialize, Serialize};

/// Length of one optimization period, stored in whole seconds.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resolution(u64);

impl Resolution {
    pub fn from_seconds(seconds: u64) -> GsResult<Self> {
        if seconds == 0 {
            return Err(GsError::invalid_argument("resolution must be positive"));
        }
        Ok(Self(seconds))
    }

    pub fn from_minutes(minutes: u64) -> GsResult<Self> {
        Self::from_seconds(minutes.saturating_mul(60))
    }

    pub fn seconds(self) -> u64 {
        self.0
    }

    pub fn as_delta(self) -> TimeDelta {
        TimeDelta::seconds(self.0 as i64)
    }

    /// Timestamp `n` periods after `start`.
    pub fn offset(self, start: DateTime<Utc>, n: usize) -> DateTime<Utc> {
        start + TimeDelta::seconds((self.0 as i64).saturating_mul(n as i64))
    }

    /// Whole periods from `origin` to `t`. `None` when `t` precedes `origin` or is
    /// not aligned to the resolution.
    pub fn index_of(self, origin: DateTime<Utc>, t: DateTime<Utc>) -> Option<usize> {
        let delta = (t - origin).num_seconds();
        if delta < 0 || delta as u64 % self.0 != 0 {
            return None;
        }
        Some((delta as u64 / self.0) as usize)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resolution({}s)", self.0)
    }
}

/// Number of `resolution` periods that make up `interval`.
///
/// The interval must be a positive whole multiple of the resolution.
pub fn periods_in(interval: TimeDelta, resolution: Resolution) -> GsResult<usize> {
    let secs = interval.num_seconds();
    if secs <= 0 {
        return Err(GsError::invalid_argument(format!(
            "interval must be positive, got {secs}s"
        )));
    }
    let secs = secs as u64;
    if secs % resolution.seconds() != 0 {
        return Err(GsError::invalid_argument(format!(
            "interval {secs}s is not a multiple of resolution {}s",
            resolution.seconds()
        )));
    }
    Ok((secs / resolution.seconds()) as usize)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn index_of_inverts_offset(minutes in 1u64..=1440, n in 0usize..100_000) {
            let res = Resolution::from_minutes(minutes).unwrap();
            let origin = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            prop_assert_eq!(res.index_of(origin, res.offset(origin, n)), Some(n));
        }

        #[test]
        fn periods_in_counts_whole_multiples(minutes in 1u64..=1440, n in 1i64..1000) {
            let res = Resolution::from_minutes(minutes).unwrap();
            let interval = TimeDelta::minutes(minutes as i64 * n);
            prop_assert_eq!(periods_in(interval, res).unwrap(), n as usize);
        }
    }
}
