//! The unified simulation / real-time clock (§4.1).
//!
//! `EvaluationClock` is the single source of truth for "what time is it"
//! during a cycle. Its contract is load-bearing: once a cycle begins at
//! time `T`, `evaluation_time` is frozen at `T` for the whole cycle even
//! if scheduling calls happen mid-cycle — those only ever mutate the
//! *future* scheduler, never the clock.

use dataflow_common::{EngineTime, MAX_DT, MIN_DT};

/// Which of the two modes described in §4.1 the engine is running under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockMode {
    /// `evaluation_time` advances freely to whatever is next scheduled;
    /// the engine never sleeps.
    Simulation,
    /// `evaluation_time` advances but the engine blocks until
    /// `wall_clock_now` catches up to it. Push-sources and wall-clock
    /// timers are the only things that can wake it early.
    RealTime,
}

#[derive(Debug)]
pub struct EvaluationClock {
    mode: ClockMode,
    evaluation_time: EngineTime,
    next_scheduled_evaluation_time: EngineTime,
    wall_clock_now: EngineTime,
}

impl EvaluationClock {
    pub fn new(mode: ClockMode, start_time: EngineTime) -> Self {
        Self {
            mode,
            evaluation_time: start_time,
            next_scheduled_evaluation_time: MAX_DT,
            wall_clock_now: start_time,
        }
    }

    pub fn mode(&self) -> ClockMode {
        self.mode
    }

    pub fn evaluation_time(&self) -> EngineTime {
        self.evaluation_time
    }

    pub fn next_scheduled_evaluation_time(&self) -> EngineTime {
        self.next_scheduled_evaluation_time
    }

    pub fn wall_clock_now(&self) -> EngineTime {
        self.wall_clock_now
    }

    /// Advance the clock to the start of a new cycle. Freezes
    /// `evaluation_time` at `to` for the duration of that cycle.
    pub fn begin_cycle(&mut self, to: EngineTime) {
        debug_assert!(
            to >= self.evaluation_time || self.evaluation_time == MIN_DT,
            "clock must not move backwards"
        );
        self.evaluation_time = to;
    }

    /// Record that some node wants to run at `time`. Only ever lowers
    /// `next_scheduled_evaluation_time`; never touches the frozen
    /// `evaluation_time` of the in-progress cycle.
    pub fn note_scheduled(&mut self, time: EngineTime) {
        if time < self.next_scheduled_evaluation_time {
            self.next_scheduled_evaluation_time = time;
        }
    }

    /// Reset the "next scheduled" watermark before recomputing it from
    /// the scheduler's current head (called once per cycle, after the
    /// due nodes for this cycle have been popped).
    pub fn reset_next_scheduled(&mut self) {
        self.next_scheduled_evaluation_time = MAX_DT;
    }

    pub fn advance_wall_clock(&mut self, now: EngineTime) {
        self.wall_clock_now = now;
    }

    pub fn is_real_time(&self) -> bool {
        matches!(self.mode, ClockMode::RealTime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataflow_common::EngineDuration;

    #[test]
    fn cycle_freezes_evaluation_time() {
        let mut clock = EvaluationClock::new(ClockMode::Simulation, EngineTime::from_micros(0));
        clock.begin_cycle(EngineTime::from_micros(10));
        clock.note_scheduled(EngineTime::from_micros(10) + EngineDuration::from_micros(5));
        assert_eq!(clock.evaluation_time(), EngineTime::from_micros(10));
        assert_eq!(
            clock.next_scheduled_evaluation_time(),
            EngineTime::from_micros(15)
        );
    }

    #[test]
    fn note_scheduled_only_lowers_watermark() {
        let mut clock = EvaluationClock::new(ClockMode::Simulation, EngineTime::from_micros(0));
        clock.note_scheduled(EngineTime::from_micros(20));
        clock.note_scheduled(EngineTime::from_micros(30));
        assert_eq!(clock.next_scheduled_evaluation_time(), EngineTime::from_micros(20));
    }
}
