//! Visibility oracle
//!
//! The simulator does not compute pass geometry; it consumes visibility as
//! an external input. `PassScheduleOracle` serves that input from a table of
//! pass windows, and `synthesize` builds a deterministic periodic schedule
//! so a run needs no external ephemeris tooling.

use serde::{Deserialize, Serialize};

/// Supplies, per step and per ground station, the ordered visible satellites
pub trait VisibilityOracle {
    /// Ordering is stable across calls while the visible set is unchanged;
    /// policies rely on it for tie-breaking.
    fn visible_sats(&self, gnd_id: u32, step: u64) -> Vec<u32>;
}

/// One contact window: the satellite is visible to the station for steps in
/// `start_step..end_step`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassWindow {
    pub gnd_id: u32,
    pub sat_id: u32,
    pub start_step: u64,
    pub end_step: u64,
}

/// Visibility served from a fixed table of pass windows
pub struct PassScheduleOracle {
    windows: Vec<PassWindow>,
}

impl PassScheduleOracle {
    pub fn new(windows: Vec<PassWindow>) -> Self {
        Self { windows }
    }

    /// Build a periodic pass schedule.
    ///
    /// Each (station, satellite) pair gets a pass of `pass_steps` every
    /// `period_steps`, staggered by satellite and station so contacts
    /// overlap partially rather than all at once. Deterministic: the same
    /// arguments always produce the same table.
    pub fn synthesize(
        gnd_ids: &[u32],
        sat_ids: &[u32],
        horizon_steps: u64,
        pass_steps: u64,
        period_steps: u64,
        stagger_steps: u64,
    ) -> Self {
        let mut windows = Vec::new();
        if period_steps == 0 || pass_steps == 0 {
            return Self::new(windows);
        }
        for (g, &gnd_id) in gnd_ids.iter().enumerate() {
            for (s, &sat_id) in sat_ids.iter().enumerate() {
                let offset = (s as u64 * stagger_steps + g as u64 * pass_steps) % period_steps;
                let mut start = offset;
                while start < horizon_steps {
                    windows.push(PassWindow {
                        gnd_id,
                        sat_id,
                        start_step: start,
                        end_step: (start + pass_steps).min(horizon_steps),
                    });
                    start += period_steps;
                }
            }
        }
        // Window order is the visibility order a station sees
        windows.sort_by_key(|w| (w.gnd_id, w.start_step, w.sat_id));
        Self::new(windows)
    }

    pub fn windows(&self) -> &[PassWindow] {
        &self.windows
    }
}

impl VisibilityOracle for PassScheduleOracle {
    fn visible_sats(&self, gnd_id: u32, step: u64) -> Vec<u32> {
        self.windows
            .iter()
            .filter(|w| w.gnd_id == gnd_id && w.start_step <= step && step < w.end_step)
            .map(|w| w.sat_id)
            .collect()
    }
}
