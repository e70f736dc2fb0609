//! Discrete simulation clock
//!
//! The clock is monotonic and advances by a fixed step. Everything in a step
//! happens at the post-advance instant, so the step counter and the wall
//! clock always agree.

use chrono::{DateTime, Duration, Utc};

/// Advance an instant by a fractional number of seconds.
///
/// The delta is split into whole seconds (floor) and nanoseconds (rounded)
/// so repeated advancement does not accumulate sub-nanosecond drift.
pub fn advance_by_seconds(t: DateTime<Utc>, dt_sec: f64) -> DateTime<Utc> {
    let whole_sec = dt_sec.floor();
    let nanos = ((dt_sec - whole_sec) * 1e9).round() as i64;
    t + Duration::seconds(whole_sec as i64) + Duration::nanoseconds(nanos)
}

/// Monotonic discrete clock driving all per-step updates
#[derive(Debug, Clone)]
pub struct SimClock {
    start: DateTime<Utc>,
    now: DateTime<Utc>,
    step_sec: f64,
    step: u64,
}

impl SimClock {
    pub fn new(start: DateTime<Utc>, step_sec: f64) -> Self {
        Self {
            start,
            now: start,
            step_sec,
            step: 0,
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn step_sec(&self) -> f64 {
        self.step_sec
    }

    pub fn tick(&mut self) {
        self.now = advance_by_seconds(self.now, self.step_sec);
        self.step += 1;
    }
}
