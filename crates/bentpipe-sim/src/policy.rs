//! Ground-station link scheduling policies
//!
//! Each step, every ground station asks its policy which visible satellite
//! to service. A policy may keep per-station state (queues, connection
//! timers, an RNG) keyed by station id; the step loop owns the satellites
//! and sensors and hands the policy read-only views.
//!
//! Sensor lookups index the map directly: the step loop registers a sensor
//! for every satellite at construction, so a miss is an invariant violation
//! and aborts the run.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};

use bentpipe_core::BentPipeError;

use crate::sensor::Sensor;

/// Minimum dwell on a connected satellite before a voluntary switch
pub const MIN_CONNECTION_STEPS: u64 = 30;

/// Seed for the random policy; fixed so runs reproduce bit-identically
const RANDOM_POLICY_SEED: u64 = 42;

/// Per step and per ground station, selects one visible satellite (or none)
pub trait LinkPolicy {
    fn name(&self) -> &'static str;

    /// Returns the new selection, which may equal `current_sat` to hold.
    #[allow(clippy::too_many_arguments)]
    fn decide(
        &mut self,
        visible_sats: &[u32],
        sensors: &HashMap<u32, Sensor>,
        occupied: &HashMap<u32, bool>,
        now: DateTime<Utc>,
        gnd_id: u32,
        current_sat: Option<u32>,
        step: u64,
    ) -> Option<u32>;
}

fn buffered(sensors: &HashMap<u32, Sensor>, sat_id: u32) -> u64 {
    sensors[&sat_id].bits_buffered()
}

/// Smallest non-empty buffer among the visible satellites, ties to the
/// earliest in visibility order
fn smallest_buffered(visible_sats: &[u32], sensors: &HashMap<u32, Sensor>) -> Option<u32> {
    let mut best: Option<(u32, u64)> = None;
    for &sat_id in visible_sats {
        let buf = buffered(sensors, sat_id);
        if buf > 0 && best.map_or(true, |(_, best_buf)| buf < best_buf) {
            best = Some((sat_id, buf));
        }
    }
    best.map(|(sat_id, _)| sat_id)
}

/// Hold any visible current satellite; otherwise grab the fullest
/// unoccupied one.
///
/// The only policy that consults the `occupied` surface: a fresh pick never
/// collides with a satellite another station already holds this step.
pub struct StickyPolicy;

impl LinkPolicy for StickyPolicy {
    fn name(&self) -> &'static str {
        "Sticky"
    }

    fn decide(
        &mut self,
        visible_sats: &[u32],
        sensors: &HashMap<u32, Sensor>,
        occupied: &HashMap<u32, bool>,
        _now: DateTime<Utc>,
        _gnd_id: u32,
        current_sat: Option<u32>,
        _step: u64,
    ) -> Option<u32> {
        if let Some(current) = current_sat {
            if visible_sats.contains(&current) {
                return Some(current);
            }
        }

        let mut best: Option<u32> = None;
        let mut best_buf = 0u64;
        for &sat_id in visible_sats {
            let buf = buffered(sensors, sat_id);
            if !occupied.get(&sat_id).copied().unwrap_or(false) && buf > best_buf {
                best = Some(sat_id);
                best_buf = buf;
            }
        }
        best
    }
}

/// First-visibility-ordered service, completion-driven.
///
/// A connected satellite is held while it is visible and still has data;
/// there is no dwell timer. Queue membership is the queue itself, so an id
/// never appears twice.
pub struct FifoPolicy {
    queues: HashMap<u32, VecDeque<u32>>,
}

impl FifoPolicy {
    pub fn new() -> Self {
        Self {
            queues: HashMap::new(),
        }
    }
}

impl Default for FifoPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkPolicy for FifoPolicy {
    fn name(&self) -> &'static str {
        "FIFO"
    }

    fn decide(
        &mut self,
        visible_sats: &[u32],
        sensors: &HashMap<u32, Sensor>,
        _occupied: &HashMap<u32, bool>,
        _now: DateTime<Utc>,
        gnd_id: u32,
        current_sat: Option<u32>,
        _step: u64,
    ) -> Option<u32> {
        if let Some(current) = current_sat {
            if visible_sats.contains(&current) && buffered(sensors, current) > 0 {
                return Some(current);
            }
        }

        let queue = self.queues.entry(gnd_id).or_default();
        for &sat_id in visible_sats {
            if !queue.contains(&sat_id) {
                queue.push_back(sat_id);
            }
        }

        // Pop from the front until something is both visible and non-empty.
        // Skipped entries re-enter the queue on a later call while visible.
        while let Some(front) = queue.pop_front() {
            if visible_sats.contains(&front) && buffered(sensors, front) > 0 {
                return Some(front);
            }
        }
        None
    }
}

/// Time-sliced rotation over the first-visibility queue.
///
/// The current satellite is held for `MIN_CONNECTION_STEPS`; at expiry the
/// next queued satellite with data is taken. A selected id returns to the
/// back of the queue so rotation continues over a static visible set, and
/// departed satellites are pruned from queue and membership set together.
pub struct RoundRobinPolicy {
    queues: HashMap<u32, VecDeque<u32>>,
    in_queue: HashMap<u32, HashSet<u32>>,
    connection_start_step: HashMap<u32, u64>,
}

impl RoundRobinPolicy {
    pub fn new() -> Self {
        Self {
            queues: HashMap::new(),
            in_queue: HashMap::new(),
            connection_start_step: HashMap::new(),
        }
    }
}

impl Default for RoundRobinPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkPolicy for RoundRobinPolicy {
    fn name(&self) -> &'static str {
        "RoundRobin"
    }

    fn decide(
        &mut self,
        visible_sats: &[u32],
        sensors: &HashMap<u32, Sensor>,
        _occupied: &HashMap<u32, bool>,
        _now: DateTime<Utc>,
        gnd_id: u32,
        current_sat: Option<u32>,
        step: u64,
    ) -> Option<u32> {
        if let Some(current) = current_sat {
            let connection_steps =
                step - self.connection_start_step.get(&gnd_id).copied().unwrap_or(0);
            if visible_sats.contains(&current) && connection_steps < MIN_CONNECTION_STEPS {
                return Some(current);
            }
        }

        let queue = self.queues.entry(gnd_id).or_default();
        let members = self.in_queue.entry(gnd_id).or_default();
        for &sat_id in visible_sats {
            if members.insert(sat_id) {
                queue.push_back(sat_id);
            }
        }

        let visible_set: HashSet<u32> = visible_sats.iter().copied().collect();
        members.retain(|sat_id| visible_set.contains(sat_id));
        queue.retain(|sat_id| visible_set.contains(sat_id));

        // Rotate through the queue once looking for buffered data
        for _ in 0..queue.len() {
            if let Some(front) = queue.pop_front() {
                queue.push_back(front);
                if buffered(sensors, front) > 0 {
                    if current_sat != Some(front) {
                        self.connection_start_step.insert(gnd_id, step);
                    }
                    return Some(front);
                }
            }
        }
        None
    }
}

/// Uniform choice among visible satellites with data, behind the dwell timer
pub struct RandomPolicy {
    rng: StdRng,
    connection_start_step: HashMap<u32, u64>,
}

impl RandomPolicy {
    pub fn new() -> Self {
        Self {
            rng: StdRng::seed_from_u64(RANDOM_POLICY_SEED),
            connection_start_step: HashMap::new(),
        }
    }
}

impl Default for RandomPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkPolicy for RandomPolicy {
    fn name(&self) -> &'static str {
        "Random"
    }

    fn decide(
        &mut self,
        visible_sats: &[u32],
        sensors: &HashMap<u32, Sensor>,
        _occupied: &HashMap<u32, bool>,
        _now: DateTime<Utc>,
        gnd_id: u32,
        current_sat: Option<u32>,
        step: u64,
    ) -> Option<u32> {
        if let Some(current) = current_sat {
            let connection_steps =
                step - self.connection_start_step.get(&gnd_id).copied().unwrap_or(0);
            if visible_sats.contains(&current) && connection_steps < MIN_CONNECTION_STEPS {
                return Some(current);
            }
        }

        let eligible: Vec<u32> = visible_sats
            .iter()
            .copied()
            .filter(|&sat_id| buffered(sensors, sat_id) > 0)
            .collect();
        if eligible.is_empty() {
            return None;
        }

        let pick = eligible[self.rng.gen_range(0..eligible.len())];
        if current_sat != Some(pick) {
            self.connection_start_step.insert(gnd_id, step);
        }
        Some(pick)
    }
}

/// Shortest-job-first, non-preemptive.
///
/// A visible current satellite with data is never abandoned; the dwell
/// timer only gates walking away from a drained connection. At a genuine
/// switch moment the smallest non-empty buffer wins.
pub struct ShortestJobFirstPolicy {
    connection_start_step: HashMap<u32, u64>,
}

impl ShortestJobFirstPolicy {
    pub fn new() -> Self {
        Self {
            connection_start_step: HashMap::new(),
        }
    }
}

impl Default for ShortestJobFirstPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkPolicy for ShortestJobFirstPolicy {
    fn name(&self) -> &'static str {
        "ShortestJobFirst"
    }

    fn decide(
        &mut self,
        visible_sats: &[u32],
        sensors: &HashMap<u32, Sensor>,
        _occupied: &HashMap<u32, bool>,
        _now: DateTime<Utc>,
        gnd_id: u32,
        current_sat: Option<u32>,
        step: u64,
    ) -> Option<u32> {
        if let Some(current) = current_sat {
            if visible_sats.contains(&current) {
                let connection_steps =
                    step - self.connection_start_step.get(&gnd_id).copied().unwrap_or(0);
                if connection_steps < MIN_CONNECTION_STEPS || buffered(sensors, current) > 0 {
                    return Some(current);
                }
            }
        }

        let pick = smallest_buffered(visible_sats, sensors)?;
        if current_sat != Some(pick) {
            self.connection_start_step.insert(gnd_id, step);
        }
        Some(pick)
    }
}

/// Shortest-remaining-time-first, preemptive.
///
/// Every expiry of the dwell timer re-evaluates the visible set and takes
/// the smallest non-empty buffer, even when that abandons a current
/// satellite that still has data.
pub struct ShortestRemainingTimePolicy {
    connection_start_step: HashMap<u32, u64>,
}

impl ShortestRemainingTimePolicy {
    pub fn new() -> Self {
        Self {
            connection_start_step: HashMap::new(),
        }
    }
}

impl Default for ShortestRemainingTimePolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkPolicy for ShortestRemainingTimePolicy {
    fn name(&self) -> &'static str {
        "ShortestRemainingTime"
    }

    fn decide(
        &mut self,
        visible_sats: &[u32],
        sensors: &HashMap<u32, Sensor>,
        _occupied: &HashMap<u32, bool>,
        _now: DateTime<Utc>,
        gnd_id: u32,
        current_sat: Option<u32>,
        step: u64,
    ) -> Option<u32> {
        if let Some(current) = current_sat {
            let connection_steps =
                step - self.connection_start_step.get(&gnd_id).copied().unwrap_or(0);
            if visible_sats.contains(&current) && connection_steps < MIN_CONNECTION_STEPS {
                return Some(current);
            }
        }

        let pick = smallest_buffered(visible_sats, sensors)?;
        if current_sat != Some(pick) {
            self.connection_start_step.insert(gnd_id, step);
        }
        Some(pick)
    }
}

/// Build a link policy from its configuration name
pub fn make_policy(name: &str) -> Result<Box<dyn LinkPolicy>, BentPipeError> {
    match name {
        "sticky" | "greedy" => Ok(Box::new(StickyPolicy)),
        "fifo" => Ok(Box::new(FifoPolicy::new())),
        "roundrobin" => Ok(Box::new(RoundRobinPolicy::new())),
        "random" => Ok(Box::new(RandomPolicy::new())),
        "sjf" | "shortestjobfirst" => Ok(Box::new(ShortestJobFirstPolicy::new())),
        "srtf" | "shortestremainingtime" => Ok(Box::new(ShortestRemainingTimePolicy::new())),
        other => Err(BentPipeError::UnknownPolicy(other.to_string())),
    }
}
