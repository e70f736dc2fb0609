//! Per-satellite imaging sensor and data buffer
//!
//! A capture request is latched by `trigger_sense` and consumed by the next
//! `update`. A capture that does not fit the buffer is lost in full: the
//! buffer clamps at capacity and the whole attempted capture counts toward
//! `total_bits_lost`, which gives the loss series a clean missed-frames
//! reading.

use chrono::{DateTime, Utc};

use bentpipe_core::{bits_to_megabytes, EciPosn};

use crate::logger::SimLog;

#[derive(Debug, Clone)]
pub struct Sensor {
    id: u32,
    sense_trigger: bool,
    bits_buffered: u64,
    bits_per_sense: u64,
    max_buffer_capacity: u64,
    total_bits_lost: u64,
    prev_sense_posn: EciPosn,
    prev_sense_datetime: DateTime<Utc>,
}

impl Sensor {
    /// A new sensor starts idle with an unbounded buffer
    pub fn new(id: u32, eci_posn: EciPosn, now: DateTime<Utc>) -> Self {
        Self {
            id,
            sense_trigger: false,
            bits_buffered: 0,
            bits_per_sense: 0,
            max_buffer_capacity: u64::MAX,
            total_bits_lost: 0,
            prev_sense_posn: eci_posn,
            prev_sense_datetime: now,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn sense_trigger(&self) -> bool {
        self.sense_trigger
    }

    pub fn bits_buffered(&self) -> u64 {
        self.bits_buffered
    }

    pub fn bits_per_sense(&self) -> u64 {
        self.bits_per_sense
    }

    pub fn max_buffer_capacity(&self) -> u64 {
        self.max_buffer_capacity
    }

    pub fn total_bits_lost(&self) -> u64 {
        self.total_bits_lost
    }

    pub fn prev_sense_posn(&self) -> EciPosn {
        self.prev_sense_posn
    }

    pub fn prev_sense_datetime(&self) -> DateTime<Utc> {
        self.prev_sense_datetime
    }

    pub fn set_bits_per_sense(&mut self, bits: u64) {
        self.bits_per_sense = bits;
    }

    pub fn set_max_buffer_capacity(&mut self, capacity_bits: u64) {
        self.max_buffer_capacity = capacity_bits;
    }

    /// Latch a capture request for the next update. Idempotent within a step.
    pub fn trigger_sense(&mut self) {
        self.sense_trigger = true;
    }

    /// Remove up to `bits` from the buffer, returning the amount removed
    pub fn drain_buffer(&mut self, bits: u64) -> u64 {
        let drained = bits.min(self.bits_buffered);
        self.bits_buffered -= drained;
        drained
    }

    /// Record the position and instant of the most recent capture
    pub fn set_prev_sense(&mut self, posn: EciPosn, datetime: DateTime<Utc>) {
        self.prev_sense_posn = posn;
        self.prev_sense_datetime = datetime;
    }

    /// Consume a latched trigger: grow the buffer or record an overflow.
    ///
    /// On overflow the buffer clamps at capacity, the full capture size is
    /// added to the cumulative loss, and the loss is reported on the
    /// `buffer-overflow-sat-<id>` stream in megabytes.
    pub fn update(&mut self, now: DateTime<Utc>, current_posn: EciPosn, log: &mut SimLog) {
        if !self.sense_trigger {
            return;
        }
        let new_total = self.bits_buffered.saturating_add(self.bits_per_sense);
        if new_total > self.max_buffer_capacity {
            self.bits_buffered = self.max_buffer_capacity;
            self.total_bits_lost += self.bits_per_sense;
            log.meas(
                now,
                format!("buffer-overflow-sat-{}", self.id),
                bits_to_megabytes(self.total_bits_lost),
            );
        } else {
            self.bits_buffered = new_total;
        }
        self.set_prev_sense(current_posn, now);
        self.sense_trigger = false;
    }
}
