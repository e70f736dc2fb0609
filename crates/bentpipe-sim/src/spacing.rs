//! Observation spacing strategies
//!
//! A spacing strategy decides when the constellation captures imagery and
//! which satellites participate. The step loop evaluates the lead satellite
//! (the first in constellation order): once the lead has travelled its
//! threshold distance since its last capture, the strategy's `execute` runs;
//! otherwise `update_frame_state` lets the strategy refresh any reference
//! point it keeps.
//!
//! Variants:
//! - BentPipe: every threshold crossing triggers the whole constellation
//! - FrameSpaced: only every Nth crossing triggers, N = constellation size
//! - OrbitSpaced: crossings round-robin a single satellite at a time
//! - CloseOrbitSpaced: bent-pipe after a one-shot local-clock rephasing
//!   that groups satellites into temporal clusters

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use bentpipe_core::{altitude_km, BentPipeError, EciPosn, Satellite};

use crate::clock::advance_by_seconds;
use crate::logger::SimLog;
use crate::sensor::Sensor;

/// Decides when to trigger observation and which satellites sense
pub trait SpacingStrategy: std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// One-shot setup before step 0. Most strategies need none.
    fn initialize(&mut self, _satellites: &mut [Satellite]) {}

    /// Whether the current step is a capture opportunity
    #[allow(clippy::too_many_arguments)]
    fn should_trigger(
        &mut self,
        curr_posn: EciPosn,
        prev_sense_posn: EciPosn,
        prev_sense_datetime: DateTime<Utc>,
        now: DateTime<Utc>,
        distance_km: f64,
        threshold_km: f64,
        lead_sat_id: u32,
        satellites: &[Satellite],
    ) -> bool;

    /// Latch sense triggers on the chosen satellites and refresh their
    /// distance thresholds
    #[allow(clippy::too_many_arguments)]
    fn execute(
        &mut self,
        satellites: &[Satellite],
        sensors: &mut HashMap<u32, Sensor>,
        thresholds: &mut HashMap<u32, f64>,
        thresh_coeff: f64,
        now: DateTime<Utc>,
        log: &mut SimLog,
    );

    /// Called on steps where `should_trigger` returned false
    fn update_frame_state(
        &mut self,
        lead_sat_id: u32,
        curr_posn: EciPosn,
        now: DateTime<Utc>,
        sensors: &mut HashMap<u32, Sensor>,
    );
}

/// Trigger every satellite and refresh every threshold
fn trigger_all(
    satellites: &[Satellite],
    sensors: &mut HashMap<u32, Sensor>,
    thresholds: &mut HashMap<u32, f64>,
    thresh_coeff: f64,
    now: DateTime<Utc>,
    log: &mut SimLog,
) {
    log.evnt(now, "trigger-time");
    for sat in satellites {
        if let Some(sensor) = sensors.get_mut(&sat.id) {
            sensor.trigger_sense();
        }
        thresholds.insert(sat.id, thresh_coeff * altitude_km(&sat.eci_posn));
    }
}

/// Default strategy: every crossing triggers the whole constellation
#[derive(Debug)]
pub struct BentPipeStrategy;

impl SpacingStrategy for BentPipeStrategy {
    fn name(&self) -> &'static str {
        "bent-pipe"
    }

    fn should_trigger(
        &mut self,
        _curr_posn: EciPosn,
        _prev_sense_posn: EciPosn,
        _prev_sense_datetime: DateTime<Utc>,
        _now: DateTime<Utc>,
        distance_km: f64,
        threshold_km: f64,
        _lead_sat_id: u32,
        _satellites: &[Satellite],
    ) -> bool {
        distance_km >= threshold_km
    }

    fn execute(
        &mut self,
        satellites: &[Satellite],
        sensors: &mut HashMap<u32, Sensor>,
        thresholds: &mut HashMap<u32, f64>,
        thresh_coeff: f64,
        now: DateTime<Utc>,
        log: &mut SimLog,
    ) {
        trigger_all(satellites, sensors, thresholds, thresh_coeff, now, log);
    }

    fn update_frame_state(
        &mut self,
        _lead_sat_id: u32,
        _curr_posn: EciPosn,
        _now: DateTime<Utc>,
        _sensors: &mut HashMap<u32, Sensor>,
    ) {
    }
}

/// Only every Nth crossing triggers, holding the flock between frames.
///
/// Between triggering frames the lead's capture reference keeps marching
/// forward, so its distance metric re-arms once per step rather than staying
/// permanently above threshold.
#[derive(Debug)]
pub struct FrameSpacedStrategy {
    frame_count: usize,
    satellite_count: usize,
}

impl FrameSpacedStrategy {
    pub fn new() -> Self {
        Self {
            frame_count: 0,
            satellite_count: 0,
        }
    }
}

impl Default for FrameSpacedStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl SpacingStrategy for FrameSpacedStrategy {
    fn name(&self) -> &'static str {
        "frame-spaced"
    }

    fn should_trigger(
        &mut self,
        _curr_posn: EciPosn,
        _prev_sense_posn: EciPosn,
        _prev_sense_datetime: DateTime<Utc>,
        _now: DateTime<Utc>,
        distance_km: f64,
        threshold_km: f64,
        _lead_sat_id: u32,
        _satellites: &[Satellite],
    ) -> bool {
        distance_km >= threshold_km
    }

    fn execute(
        &mut self,
        satellites: &[Satellite],
        sensors: &mut HashMap<u32, Sensor>,
        thresholds: &mut HashMap<u32, f64>,
        thresh_coeff: f64,
        now: DateTime<Utc>,
        log: &mut SimLog,
    ) {
        self.satellite_count = satellites.len();
        self.frame_count += 1;
        if self.frame_count % self.satellite_count == 0 {
            self.frame_count = 0;
            trigger_all(satellites, sensors, thresholds, thresh_coeff, now, log);
        }
    }

    fn update_frame_state(
        &mut self,
        lead_sat_id: u32,
        curr_posn: EciPosn,
        now: DateTime<Utc>,
        sensors: &mut HashMap<u32, Sensor>,
    ) {
        // Keep the lead's reference moving while the flock is held
        if self.satellite_count > 0 && self.frame_count % self.satellite_count != 0 {
            if let Some(sensor) = sensors.get_mut(&lead_sat_id) {
                sensor.set_prev_sense(curr_posn, now);
            }
        }
    }
}

/// Round-robins observation across satellites over successive crossings
#[derive(Debug)]
pub struct OrbitSpacedStrategy {
    rotation_index: usize,
}

impl OrbitSpacedStrategy {
    pub fn new() -> Self {
        Self { rotation_index: 0 }
    }
}

impl Default for OrbitSpacedStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl SpacingStrategy for OrbitSpacedStrategy {
    fn name(&self) -> &'static str {
        "orbit-spaced"
    }

    fn should_trigger(
        &mut self,
        _curr_posn: EciPosn,
        _prev_sense_posn: EciPosn,
        _prev_sense_datetime: DateTime<Utc>,
        _now: DateTime<Utc>,
        distance_km: f64,
        threshold_km: f64,
        lead_sat_id: u32,
        satellites: &[Satellite],
    ) -> bool {
        if distance_km < threshold_km || satellites.is_empty() {
            return false;
        }
        // Only the rotation-indexed satellite may observe this crossing
        let active_sat_id = satellites[self.rotation_index % satellites.len()].id;
        lead_sat_id == active_sat_id
    }

    fn execute(
        &mut self,
        satellites: &[Satellite],
        sensors: &mut HashMap<u32, Sensor>,
        thresholds: &mut HashMap<u32, f64>,
        thresh_coeff: f64,
        now: DateTime<Utc>,
        log: &mut SimLog,
    ) {
        if satellites.is_empty() {
            return;
        }
        let active = &satellites[self.rotation_index % satellites.len()];
        self.rotation_index += 1;

        log.evnt(now, "trigger-time");
        if let Some(sensor) = sensors.get_mut(&active.id) {
            sensor.trigger_sense();
        }
        thresholds.insert(active.id, thresh_coeff * altitude_km(&active.eci_posn));
    }

    fn update_frame_state(
        &mut self,
        _lead_sat_id: u32,
        _curr_posn: EciPosn,
        _now: DateTime<Utc>,
        _sensors: &mut HashMap<u32, Sensor>,
    ) {
    }
}

/// Bent-pipe with a one-shot cluster rephasing of satellite local clocks.
///
/// At startup, satellite i inherits satellite i-1's local clock advanced by
/// `intra_dt_sec` within a cluster and `inter_dt_sec` across cluster
/// boundaries. The temporal spread is baked into the clocks, so triggering
/// afterwards is simultaneous.
#[derive(Debug)]
pub struct CloseOrbitSpacedStrategy {
    rephased: bool,
    cluster_size: usize,
    intra_dt_sec: f64,
    inter_dt_sec: f64,
}

impl CloseOrbitSpacedStrategy {
    pub fn new() -> Self {
        Self::with_clusters(5, 0.0, 540.0)
    }

    pub fn with_clusters(cluster_size: usize, intra_dt_sec: f64, inter_dt_sec: f64) -> Self {
        Self {
            rephased: false,
            cluster_size,
            intra_dt_sec,
            inter_dt_sec,
        }
    }
}

impl Default for CloseOrbitSpacedStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl SpacingStrategy for CloseOrbitSpacedStrategy {
    fn name(&self) -> &'static str {
        "close-orbit-spaced"
    }

    fn initialize(&mut self, satellites: &mut [Satellite]) {
        if self.rephased {
            return;
        }
        for i in 1..satellites.len() {
            let dt_sec = if i % self.cluster_size != 0 {
                self.intra_dt_sec
            } else {
                self.inter_dt_sec
            };
            satellites[i].local_time = advance_by_seconds(satellites[i - 1].local_time, dt_sec);
        }
        self.rephased = true;
    }

    fn should_trigger(
        &mut self,
        _curr_posn: EciPosn,
        _prev_sense_posn: EciPosn,
        _prev_sense_datetime: DateTime<Utc>,
        _now: DateTime<Utc>,
        distance_km: f64,
        threshold_km: f64,
        _lead_sat_id: u32,
        _satellites: &[Satellite],
    ) -> bool {
        distance_km >= threshold_km
    }

    fn execute(
        &mut self,
        satellites: &[Satellite],
        sensors: &mut HashMap<u32, Sensor>,
        thresholds: &mut HashMap<u32, f64>,
        thresh_coeff: f64,
        now: DateTime<Utc>,
        log: &mut SimLog,
    ) {
        trigger_all(satellites, sensors, thresholds, thresh_coeff, now, log);
    }

    fn update_frame_state(
        &mut self,
        _lead_sat_id: u32,
        _curr_posn: EciPosn,
        _now: DateTime<Utc>,
        _sensors: &mut HashMap<u32, Sensor>,
    ) {
    }
}

/// Build a spacing strategy from its configuration name
pub fn make_strategy(name: &str) -> Result<Box<dyn SpacingStrategy>, BentPipeError> {
    match name {
        "bent-pipe" | "bentpipe" | "close-spaced" | "close" | "closed" => {
            Ok(Box::new(BentPipeStrategy))
        }
        "frame-spaced" | "frame" => Ok(Box::new(FrameSpacedStrategy::new())),
        "orbit-spaced" | "orbit" => Ok(Box::new(OrbitSpacedStrategy::new())),
        "close-orbit-spaced" => Ok(Box::new(CloseOrbitSpacedStrategy::new())),
        other => Err(BentPipeError::UnknownSpacing(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn make_constellation(count: u32) -> (Vec<Satellite>, HashMap<u32, Sensor>) {
        let mut satellites = Vec::new();
        let mut sensors = HashMap::new();
        for id in 0..count {
            let posn = EciPosn::new(6928.137, id as f64, 0.0);
            satellites.push(Satellite::new(id, posn, epoch()));
            let mut sensor = Sensor::new(id, posn, epoch());
            sensor.set_bits_per_sense(100);
            sensors.insert(id, sensor);
        }
        (satellites, sensors)
    }

    fn triggered_ids(sensors: &HashMap<u32, Sensor>) -> Vec<u32> {
        let mut ids: Vec<u32> = sensors
            .values()
            .filter(|s| s.sense_trigger())
            .map(|s| s.id())
            .collect();
        ids.sort_unstable();
        ids
    }

    fn clear_triggers(sensors: &mut HashMap<u32, Sensor>) {
        let mut log = SimLog::new();
        for sensor in sensors.values_mut() {
            let posn = sensor.prev_sense_posn();
            sensor.update(epoch(), posn, &mut log);
        }
    }

    #[test]
    fn test_bent_pipe_triggers_all_and_refreshes_thresholds() {
        let (satellites, mut sensors) = make_constellation(3);
        let mut thresholds = HashMap::new();
        let mut log = SimLog::new();
        let mut strategy = BentPipeStrategy;

        assert!(strategy.should_trigger(
            satellites[0].eci_posn,
            EciPosn::new(0.0, 0.0, 0.0),
            epoch(),
            epoch(),
            300.0,
            275.0,
            0,
            &satellites,
        ));

        strategy.execute(
            &satellites,
            &mut sensors,
            &mut thresholds,
            0.5,
            epoch(),
            &mut log,
        );

        assert_eq!(triggered_ids(&sensors), vec![0, 1, 2]);
        assert_eq!(log.evnt_timestamps("trigger-time").unwrap().len(), 1);
        for sat in &satellites {
            let expected = 0.5 * altitude_km(&sat.eci_posn);
            assert!((thresholds[&sat.id] - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_bent_pipe_below_threshold_does_not_trigger() {
        let (satellites, _) = make_constellation(2);
        let mut strategy = BentPipeStrategy;
        assert!(!strategy.should_trigger(
            satellites[0].eci_posn,
            satellites[0].eci_posn,
            epoch(),
            epoch(),
            100.0,
            275.0,
            0,
            &satellites,
        ));
    }

    #[test]
    fn test_frame_spaced_triggers_every_nth_crossing() {
        let (satellites, mut sensors) = make_constellation(3);
        let mut thresholds = HashMap::new();
        let mut log = SimLog::new();
        let mut strategy = FrameSpacedStrategy::new();

        for crossing in 1..=6 {
            strategy.execute(
                &satellites,
                &mut sensors,
                &mut thresholds,
                0.5,
                epoch(),
                &mut log,
            );
            if crossing % 3 == 0 {
                assert_eq!(triggered_ids(&sensors), vec![0, 1, 2]);
                clear_triggers(&mut sensors);
            } else {
                assert!(triggered_ids(&sensors).is_empty());
            }
        }
        // Six crossings, two triggering frames
        assert_eq!(log.evnt_timestamps("trigger-time").unwrap().len(), 2);
    }

    #[test]
    fn test_frame_spaced_advances_lead_reference_between_frames() {
        let (satellites, mut sensors) = make_constellation(3);
        let mut thresholds = HashMap::new();
        let mut log = SimLog::new();
        let mut strategy = FrameSpacedStrategy::new();

        // One non-triggering crossing arms the held state
        strategy.execute(
            &satellites,
            &mut sensors,
            &mut thresholds,
            0.5,
            epoch(),
            &mut log,
        );

        let moved = EciPosn::new(6928.137, 500.0, 0.0);
        let later = epoch() + Duration::seconds(10);
        strategy.update_frame_state(0, moved, later, &mut sensors);

        assert_eq!(sensors[&0].prev_sense_posn(), moved);
        assert_eq!(sensors[&0].prev_sense_datetime(), later);
        // Only the lead moves
        assert_ne!(sensors[&1].prev_sense_posn(), moved);
    }

    #[test]
    fn test_frame_spaced_holds_lead_reference_before_any_crossing() {
        let (_, mut sensors) = make_constellation(2);
        let mut strategy = FrameSpacedStrategy::new();
        let before = sensors[&0].prev_sense_posn();

        strategy.update_frame_state(0, EciPosn::new(0.0, 1.0, 2.0), epoch(), &mut sensors);

        assert_eq!(sensors[&0].prev_sense_posn(), before);
    }

    #[test]
    fn test_orbit_spaced_rotates_across_crossings() {
        let (satellites, mut sensors) = make_constellation(3);
        let mut thresholds = HashMap::new();
        let mut log = SimLog::new();
        let mut strategy = OrbitSpacedStrategy::new();

        for expected in [0u32, 1, 2, 0] {
            strategy.execute(
                &satellites,
                &mut sensors,
                &mut thresholds,
                0.5,
                epoch(),
                &mut log,
            );
            assert_eq!(triggered_ids(&sensors), vec![expected]);
            clear_triggers(&mut sensors);
        }
        assert_eq!(log.evnt_timestamps("trigger-time").unwrap().len(), 4);
    }

    #[test]
    fn test_orbit_spaced_gates_on_active_satellite() {
        let (satellites, _) = make_constellation(3);
        let mut strategy = OrbitSpacedStrategy::new();

        // Rotation starts at index 0, so only lead id 0 passes the gate
        assert!(strategy.should_trigger(
            satellites[0].eci_posn,
            EciPosn::new(0.0, 0.0, 0.0),
            epoch(),
            epoch(),
            300.0,
            275.0,
            0,
            &satellites,
        ));
        assert!(!strategy.should_trigger(
            satellites[0].eci_posn,
            EciPosn::new(0.0, 0.0, 0.0),
            epoch(),
            epoch(),
            300.0,
            275.0,
            1,
            &satellites,
        ));
    }

    #[test]
    fn test_close_orbit_spaced_rephases_clusters_once() {
        let (mut satellites, _) = make_constellation(4);
        let mut strategy = CloseOrbitSpacedStrategy::with_clusters(2, 0.0, 540.0);

        strategy.initialize(&mut satellites);

        // Cluster {0,1}, then a 540 s hop, then cluster {2,3}
        assert_eq!(satellites[1].local_time, satellites[0].local_time);
        assert_eq!(
            satellites[2].local_time,
            satellites[1].local_time + Duration::seconds(540)
        );
        assert_eq!(satellites[3].local_time, satellites[2].local_time);

        // Second initialize must not rephase again
        let snapshot: Vec<_> = satellites.iter().map(|s| s.local_time).collect();
        strategy.initialize(&mut satellites);
        let after: Vec<_> = satellites.iter().map(|s| s.local_time).collect();
        assert_eq!(snapshot, after);
    }

    #[test]
    fn test_close_orbit_spaced_triggers_all_after_rephasing() {
        let (mut satellites, mut sensors) = make_constellation(3);
        let mut thresholds = HashMap::new();
        let mut log = SimLog::new();
        let mut strategy = CloseOrbitSpacedStrategy::new();

        strategy.initialize(&mut satellites);
        strategy.execute(
            &satellites,
            &mut sensors,
            &mut thresholds,
            0.5,
            epoch(),
            &mut log,
        );

        assert_eq!(triggered_ids(&sensors), vec![0, 1, 2]);
    }

    #[test]
    fn test_factory_aliases_and_unknown_name() {
        for name in ["bent-pipe", "bentpipe", "close-spaced", "close", "closed"] {
            assert_eq!(make_strategy(name).unwrap().name(), "bent-pipe");
        }
        assert_eq!(make_strategy("frame").unwrap().name(), "frame-spaced");
        assert_eq!(make_strategy("orbit").unwrap().name(), "orbit-spaced");
        assert_eq!(
            make_strategy("close-orbit-spaced").unwrap().name(),
            "close-orbit-spaced"
        );

        let err = make_strategy("warp-spaced").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Unknown spacing strategy: warp-spaced"));
        assert!(message.contains("Valid options"));
    }
}
