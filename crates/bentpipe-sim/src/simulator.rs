//! Simulation step loop
//!
//! A step is atomic and runs in fixed dependency order: clock advance,
//! position refresh, spacing decision, sensor updates, then per-station
//! policy decisions with downlink drains, then per-step measurements.
//! The fixed order is what makes the single-writer discipline on sensors
//! safe without any locking, and what makes runs reproducible.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use bentpipe_core::{
    altitude_km, bits_to_megabytes, BentPipeError, GroundStation, Satellite, SensorConfig,
    SimulationConfig,
};

use crate::clock::{advance_by_seconds, SimClock};
use crate::downlink::DownlinkAccountant;
use crate::logger::SimLog;
use crate::orbit::PositionSource;
use crate::policy::LinkPolicy;
use crate::sensor::Sensor;
use crate::spacing::SpacingStrategy;
use crate::visibility::VisibilityOracle;

/// Per-satellite data totals over a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SatelliteTotals {
    pub sat_id: u32,
    pub sensed_bits: u64,
    pub drained_bits: u64,
    pub lost_bits: u64,
    pub buffered_bits: u64,
}

/// Result of a simulation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub policy_name: String,
    pub strategy_name: String,
    pub steps: u64,
    pub satellites: Vec<SatelliteTotals>,
    pub total_sensed_bits: u64,
    pub total_drained_bits: u64,
    pub total_lost_bits: u64,
    pub total_buffered_bits: u64,
}

/// Discrete-time constellation simulator
pub struct Simulator {
    clock: SimClock,
    num_steps: u64,
    thresh_coeff: f64,
    satellites: Vec<Satellite>,
    sensors: HashMap<u32, Sensor>,
    thresholds: HashMap<u32, f64>,
    ground_stations: Vec<GroundStation>,
    strategy: Box<dyn SpacingStrategy>,
    policy: Box<dyn LinkPolicy>,
    oracle: Box<dyn VisibilityOracle>,
    positions: Box<dyn PositionSource>,
    accountant: DownlinkAccountant,
    log: SimLog,
    sensed_bits: HashMap<u32, u64>,
    drained_bits: HashMap<u32, u64>,
}

impl Simulator {
    /// Assemble a simulator; satellites and sensors are created here and the
    /// spacing strategy gets its one-shot initialisation before step 0.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sim_config: &SimulationConfig,
        sensor_config: &SensorConfig,
        start_time: DateTime<Utc>,
        sat_ids: &[u32],
        gnd_ids: &[u32],
        mut strategy: Box<dyn SpacingStrategy>,
        policy: Box<dyn LinkPolicy>,
        oracle: Box<dyn VisibilityOracle>,
        positions: Box<dyn PositionSource>,
    ) -> Self {
        let mut satellites: Vec<Satellite> = sat_ids
            .iter()
            .map(|&sat_id| Satellite::new(sat_id, positions.position(sat_id, 0), start_time))
            .collect();

        let mut sensors = HashMap::new();
        let mut thresholds = HashMap::new();
        for sat in &satellites {
            let mut sensor = Sensor::new(sat.id, sat.eci_posn, start_time);
            sensor.set_bits_per_sense(sensor_config.bits_per_sense);
            sensor.set_max_buffer_capacity(sensor_config.max_buffer_bits());
            sensors.insert(sat.id, sensor);
            thresholds.insert(
                sat.id,
                sim_config.thresh_coeff * altitude_km(&sat.eci_posn),
            );
        }

        strategy.initialize(&mut satellites);

        // Stations iterate in id order each step; the order is part of the
        // occupied-flag contract
        let mut sorted_gnd_ids: Vec<u32> = gnd_ids.to_vec();
        sorted_gnd_ids.sort_unstable();
        let ground_stations = sorted_gnd_ids.into_iter().map(GroundStation::new).collect();

        Self {
            clock: SimClock::new(start_time, sim_config.step_sec),
            num_steps: sim_config.num_steps,
            thresh_coeff: sim_config.thresh_coeff,
            satellites,
            sensors,
            thresholds,
            ground_stations,
            strategy,
            policy,
            oracle,
            positions,
            accountant: DownlinkAccountant::new(sim_config.link_rate_bps(), sim_config.step_sec),
            log: SimLog::new(),
            sensed_bits: HashMap::new(),
            drained_bits: HashMap::new(),
        }
    }

    pub fn satellites(&self) -> &[Satellite] {
        &self.satellites
    }

    pub fn ground_stations(&self) -> &[GroundStation] {
        &self.ground_stations
    }

    pub fn log(&self) -> &SimLog {
        &self.log
    }

    /// Advance the simulation by one step
    pub fn step(&mut self) -> Result<(), BentPipeError> {
        self.clock.tick();
        let now = self.clock.now();
        let step = self.clock.step();
        let step_sec = self.clock.step_sec();

        // Local clocks march with the global clock; rephasing offsets from
        // startup are preserved
        for sat in &mut self.satellites {
            sat.local_time = advance_by_seconds(sat.local_time, step_sec);
            sat.eci_posn = self.positions.position(sat.id, step);
        }

        // Spacing decision, driven by the lead satellite's travel since its
        // last capture
        let lead_id = self.satellites[0].id;
        let lead_posn = self.satellites[0].eci_posn;
        let lead_sensor = self
            .sensors
            .get(&lead_id)
            .ok_or(BentPipeError::MissingSensor(lead_id))?;
        let prev_posn = lead_sensor.prev_sense_posn();
        let prev_datetime = lead_sensor.prev_sense_datetime();
        let distance_km = lead_posn.distance_km(&prev_posn);
        let threshold_km = *self
            .thresholds
            .get(&lead_id)
            .ok_or(BentPipeError::MissingSensor(lead_id))?;

        if self.strategy.should_trigger(
            lead_posn,
            prev_posn,
            prev_datetime,
            now,
            distance_km,
            threshold_km,
            lead_id,
            &self.satellites,
        ) {
            self.strategy.execute(
                &self.satellites,
                &mut self.sensors,
                &mut self.thresholds,
                self.thresh_coeff,
                now,
                &mut self.log,
            );
        } else {
            self.strategy
                .update_frame_state(lead_id, lead_posn, now, &mut self.sensors);
        }

        // Attempted capture sizes are counted before the triggers are
        // consumed; a trigger is always consumed in the same step
        for (sat_id, sensor) in &self.sensors {
            if sensor.sense_trigger() {
                *self.sensed_bits.entry(*sat_id).or_insert(0) += sensor.bits_per_sense();
            }
        }

        for sat in &self.satellites {
            if let Some(sensor) = self.sensors.get_mut(&sat.id) {
                sensor.update(now, sat.eci_posn, &mut self.log);
            }
        }

        // Station decisions in stable order; each commit updates the
        // occupied surface seen by the stations after it
        let mut occupied: HashMap<u32, bool> =
            self.satellites.iter().map(|sat| (sat.id, false)).collect();
        for i in 0..self.ground_stations.len() {
            let gnd_id = self.ground_stations[i].id;
            let current = self.ground_stations[i].current_sat;
            let visible = self.oracle.visible_sats(gnd_id, step);
            let selection =
                self.policy
                    .decide(&visible, &self.sensors, &occupied, now, gnd_id, current, step);
            if let Some(sat_id) = selection {
                occupied.insert(sat_id, true);
                let record = self.accountant.drain(gnd_id, sat_id, &mut self.sensors)?;
                *self.drained_bits.entry(sat_id).or_insert(0) += record.drained_bits;
                self.log.meas(
                    now,
                    format!("downlink-gnd-{}", gnd_id),
                    bits_to_megabytes(record.drained_bits),
                );
            }
            self.ground_stations[i].current_sat = selection;
        }

        // Per-satellite buffer time series
        for sat in &self.satellites {
            if let Some(sensor) = self.sensors.get(&sat.id) {
                self.log.meas(
                    now,
                    format!("buffer-sat-{}", sat.id),
                    bits_to_megabytes(sensor.bits_buffered()),
                );
            }
        }

        Ok(())
    }

    /// Run to the configured end step and collect totals
    pub fn run(&mut self) -> Result<SimulationResult, BentPipeError> {
        info!(
            "running {} steps: policy {}, spacing {}",
            self.num_steps,
            self.policy.name(),
            self.strategy.name()
        );
        for _ in 0..self.num_steps {
            self.step()?;
        }
        let result = self.collect_results();
        info!(
            "done: {} MB sensed, {} MB drained, {} MB lost",
            bits_to_megabytes(result.total_sensed_bits),
            bits_to_megabytes(result.total_drained_bits),
            bits_to_megabytes(result.total_lost_bits)
        );
        Ok(result)
    }

    fn collect_results(&self) -> SimulationResult {
        let satellites: Vec<SatelliteTotals> = self
            .satellites
            .iter()
            .map(|sat| SatelliteTotals {
                sat_id: sat.id,
                sensed_bits: self.sensed_bits.get(&sat.id).copied().unwrap_or(0),
                drained_bits: self.drained_bits.get(&sat.id).copied().unwrap_or(0),
                lost_bits: self
                    .sensors
                    .get(&sat.id)
                    .map(Sensor::total_bits_lost)
                    .unwrap_or(0),
                buffered_bits: self
                    .sensors
                    .get(&sat.id)
                    .map(Sensor::bits_buffered)
                    .unwrap_or(0),
            })
            .collect();

        SimulationResult {
            policy_name: self.policy.name().to_string(),
            strategy_name: self.strategy.name().to_string(),
            steps: self.clock.step(),
            total_sensed_bits: satellites.iter().map(|s| s.sensed_bits).sum(),
            total_drained_bits: satellites.iter().map(|s| s.drained_bits).sum(),
            total_lost_bits: satellites.iter().map(|s| s.lost_bits).sum(),
            total_buffered_bits: satellites.iter().map(|s| s.buffered_bits).sum(),
            satellites,
        }
    }
}
