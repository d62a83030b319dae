//! Engine time: the simulated clock value every node, output and scheduler
//! entry is stamped with.
//!
//! `EngineTime` is microsecond-resolution and monotonically non-decreasing
//! across a run. It is deliberately not `chrono::DateTime` at the core: the
//! core only needs ordering, addition of a duration, and two sentinel
//! bounds. Collaborators that need wall-clock semantics convert at the
//! boundary (see `EvaluationClock::wall_clock_now`).

use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::time::Duration as StdDuration;

/// Microseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EngineTime(i64);

/// A signed duration in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EngineDuration(i64);

impl EngineTime {
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    pub const fn as_micros(self) -> i64 {
        self.0
    }

    pub fn checked_add(self, d: EngineDuration) -> Option<Self> {
        self.0.checked_add(d.0).map(Self)
    }
}

impl fmt::Display for EngineTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}us", self.0)
    }
}

impl EngineDuration {
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    pub const fn as_micros(self) -> i64 {
        self.0
    }

    pub fn from_std(d: StdDuration) -> Self {
        Self(d.as_micros() as i64)
    }
}

impl Add<EngineDuration> for EngineTime {
    type Output = EngineTime;
    fn add(self, rhs: EngineDuration) -> EngineTime {
        EngineTime(self.0 + rhs.0)
    }
}

impl AddAssign<EngineDuration> for EngineTime {
    fn add_assign(&mut self, rhs: EngineDuration) {
        self.0 += rhs.0;
    }
}

impl Sub for EngineTime {
    type Output = EngineDuration;
    fn sub(self, rhs: EngineTime) -> EngineDuration {
        EngineDuration(self.0 - rhs.0)
    }
}

/// Smallest representable positive increment: one microsecond.
///
/// Used to advance past the current evaluation time when a node wants to
/// be scheduled "as soon as possible but not this cycle" (e.g. feedback).
pub const MIN_TD: EngineDuration = EngineDuration::from_micros(1);

/// Sentinel lower bound. No real evaluation ever happens at this time;
/// it is used as the "never scheduled" marker in the scheduler and as the
/// default `sampled_time` for inputs that have never sampled.
pub const MIN_DT: EngineTime = EngineTime::from_micros(i64::MIN);

/// Sentinel upper bound. Used as "no next scheduled time" and as the
/// default horizon passed to `evaluate_graph` when the caller wants the
/// engine to run until externally stopped.
pub const MAX_DT: EngineTime = EngineTime::from_micros(i64::MAX);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_and_arithmetic() {
        let t0 = EngineTime::from_micros(100);
        let t1 = t0 + EngineDuration::from_micros(5);
        assert!(t1 > t0);
        assert_eq!(t1 - t0, EngineDuration::from_micros(5));
        assert_eq!(t0 + MIN_TD, EngineTime::from_micros(101));
    }

    #[test]
    fn sentinels_bound_real_times() {
        let t = EngineTime::from_micros(0);
        assert!(MIN_DT < t && t < MAX_DT);
    }
}
