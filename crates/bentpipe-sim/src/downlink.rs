//! Downlink accounting
//!
//! Applies the link drain to the sensor a ground station selected and
//! reports how much actually moved. One executed selection per station per
//! step; the step loop keeps the per-satellite occupied surface current
//! between station decisions.

use std::collections::HashMap;

use bentpipe_core::BentPipeError;

use crate::sensor::Sensor;

/// Outcome of one station-step drain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownlinkRecord {
    pub gnd_id: u32,
    pub sat_id: u32,
    pub drained_bits: u64,
}

/// Drains connected sensors at the configured link rate
pub struct DownlinkAccountant {
    link_rate_bps: f64,
    step_sec: f64,
}

impl DownlinkAccountant {
    pub fn new(link_rate_bps: f64, step_sec: f64) -> Self {
        Self {
            link_rate_bps,
            step_sec,
        }
    }

    /// Bits the link can move in one step
    pub fn bits_per_step(&self) -> u64 {
        (self.link_rate_bps * self.step_sec) as u64
    }

    /// Drain the selected satellite's buffer for one step
    pub fn drain(
        &self,
        gnd_id: u32,
        sat_id: u32,
        sensors: &mut HashMap<u32, Sensor>,
    ) -> Result<DownlinkRecord, BentPipeError> {
        let sensor = sensors
            .get_mut(&sat_id)
            .ok_or(BentPipeError::MissingSensor(sat_id))?;
        let drained_bits = sensor.drain_buffer(self.bits_per_step());
        Ok(DownlinkRecord {
            gnd_id,
            sat_id,
            drained_bits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bentpipe_core::EciPosn;
    use chrono::TimeZone;

    use crate::logger::SimLog;

    fn make_sensor(sat_id: u32, bits: u64) -> Sensor {
        let epoch = chrono::Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let posn = EciPosn::new(6928.137, 0.0, 0.0);
        let mut sensor = Sensor::new(sat_id, posn, epoch);
        sensor.set_bits_per_sense(bits);
        if bits > 0 {
            let mut log = SimLog::new();
            sensor.trigger_sense();
            sensor.update(epoch, posn, &mut log);
        }
        sensor
    }

    #[test]
    fn test_bits_per_step() {
        let accountant = DownlinkAccountant::new(20_000_000.0, 0.5);
        assert_eq!(accountant.bits_per_step(), 10_000_000);
    }

    #[test]
    fn test_drain_moves_up_to_one_step_of_link() {
        let mut sensors = HashMap::new();
        sensors.insert(0, make_sensor(0, 1_500_000));
        let accountant = DownlinkAccountant::new(1_000_000.0, 1.0);

        let record = accountant.drain(9, 0, &mut sensors).unwrap();
        assert_eq!(record.gnd_id, 9);
        assert_eq!(record.sat_id, 0);
        assert_eq!(record.drained_bits, 1_000_000);
        assert_eq!(sensors[&0].bits_buffered(), 500_000);

        // Second step empties the remainder
        let record = accountant.drain(9, 0, &mut sensors).unwrap();
        assert_eq!(record.drained_bits, 500_000);
        assert_eq!(sensors[&0].bits_buffered(), 0);
    }

    #[test]
    fn test_drain_unknown_satellite_is_fatal() {
        let mut sensors: HashMap<u32, Sensor> = HashMap::new();
        let accountant = DownlinkAccountant::new(1_000_000.0, 1.0);
        assert!(matches!(
            accountant.drain(0, 42, &mut sensors),
            Err(BentPipeError::MissingSensor(42))
        ));
    }
}
