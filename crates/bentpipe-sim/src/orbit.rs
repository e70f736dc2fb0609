//! Orbital position source
//!
//! Propagation is an external concern; the simulator only needs ECI
//! positions per step. `CircularOrbit` is a closed-form source (no
//! integration) that places the constellation on one circular orbit with
//! evenly spread phases, which is enough to exercise distance-threshold
//! spacing end to end.

use std::collections::HashMap;

use bentpipe_core::{EciPosn, EARTH_RADIUS_KM};

/// Supplies each satellite's ECI position at a given step
pub trait PositionSource {
    fn position(&self, sat_id: u32, step: u64) -> EciPosn;
}

/// Equatorial circular orbit with per-satellite phase offsets
pub struct CircularOrbit {
    radius_km: f64,
    period_sec: f64,
    step_sec: f64,
    phase_rad: HashMap<u32, f64>,
}

impl CircularOrbit {
    /// Spread `sat_ids` evenly around a circular orbit at `altitude_km`
    pub fn new(altitude_km: f64, period_sec: f64, step_sec: f64, sat_ids: &[u32]) -> Self {
        let count = sat_ids.len().max(1) as f64;
        let phase_rad = sat_ids
            .iter()
            .enumerate()
            .map(|(i, &sat_id)| (sat_id, 2.0 * std::f64::consts::PI * i as f64 / count))
            .collect();
        Self {
            radius_km: EARTH_RADIUS_KM + altitude_km,
            period_sec,
            step_sec,
            phase_rad,
        }
    }
}

impl PositionSource for CircularOrbit {
    fn position(&self, sat_id: u32, step: u64) -> EciPosn {
        let phase = self.phase_rad.get(&sat_id).copied().unwrap_or(0.0);
        let elapsed_sec = step as f64 * self.step_sec;
        let theta = phase + 2.0 * std::f64::consts::PI * elapsed_sec / self.period_sec;
        EciPosn::new(
            self.radius_km * theta.cos(),
            self.radius_km * theta.sin(),
            0.0,
        )
    }
}
