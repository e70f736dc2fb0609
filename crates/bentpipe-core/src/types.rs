//! Core types shared across simulator components

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mean equatorial Earth radius in kilometers (WGS 84)
pub const EARTH_RADIUS_KM: f64 = 6378.137;

/// Cartesian position in the Earth-Centered Inertial frame, in kilometers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EciPosn {
    pub x_km: f64,
    pub y_km: f64,
    pub z_km: f64,
}

impl EciPosn {
    pub fn new(x_km: f64, y_km: f64, z_km: f64) -> Self {
        Self { x_km, y_km, z_km }
    }

    /// Distance from the geocenter in kilometers
    pub fn magnitude_km(&self) -> f64 {
        (self.x_km * self.x_km + self.y_km * self.y_km + self.z_km * self.z_km).sqrt()
    }

    /// Straight-line distance to another ECI position in kilometers
    pub fn distance_km(&self, other: &EciPosn) -> f64 {
        let dx = self.x_km - other.x_km;
        let dy = self.y_km - other.y_km;
        let dz = self.z_km - other.z_km;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl std::fmt::Display for EciPosn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3}) km", self.x_km, self.y_km, self.z_km)
    }
}

/// Altitude above the spherical Earth in kilometers
pub fn altitude_km(posn: &EciPosn) -> f64 {
    posn.magnitude_km() - EARTH_RADIUS_KM
}

/// Convert a bit count to megabytes
pub fn bits_to_megabytes(bits: u64) -> f64 {
    bits as f64 / (8.0 * 1024.0 * 1024.0)
}

/// A satellite in the constellation.
///
/// The local clock is independent of the global simulation clock; the
/// cluster-rephasing spacing strategy offsets it once at startup to spread
/// capture times across the constellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Satellite {
    pub id: u32,
    pub eci_posn: EciPosn,
    pub local_time: DateTime<Utc>,
}

impl Satellite {
    pub fn new(id: u32, eci_posn: EciPosn, local_time: DateTime<Utc>) -> Self {
        Self {
            id,
            eci_posn,
            local_time,
        }
    }
}

/// A ground station and its current downlink connection.
///
/// Richer per-station state (queues, timers, RNG) belongs to the link policy,
/// keyed by station id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundStation {
    pub id: u32,
    pub current_sat: Option<u32>,
}

impl GroundStation {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            current_sat: None,
        }
    }
}
