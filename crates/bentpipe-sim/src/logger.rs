//! Append-only log emitter
//!
//! Measurements and events accumulate in memory during the run and are
//! written out as one CSV file per stream at the end. Analytics tooling
//! consumes the files by stream name, so names must be stable across runs.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};

use bentpipe_core::BentPipeError;

/// One timestamped measurement sample
#[derive(Debug, Clone, PartialEq)]
pub struct MeasRecord {
    pub timestamp: String,
    pub value: f64,
}

/// In-memory log streams, written to `meas-<name>.csv` / `evnt-<name>.csv`.
///
/// BTreeMap keeps file emission order deterministic.
#[derive(Debug, Default)]
pub struct SimLog {
    meas: BTreeMap<String, Vec<MeasRecord>>,
    evnt: BTreeMap<String, Vec<String>>,
}

/// Render an instant the way the log consumers expect it
pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S%.9f").to_string()
}

impl SimLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a measurement sample to the named stream
    pub fn meas(&mut self, now: DateTime<Utc>, name: impl Into<String>, value: f64) {
        self.meas
            .entry(name.into())
            .or_default()
            .push(MeasRecord {
                timestamp: format_timestamp(now),
                value,
            });
    }

    /// Append an occurrence to the named event stream
    pub fn evnt(&mut self, now: DateTime<Utc>, name: impl Into<String>) {
        self.evnt
            .entry(name.into())
            .or_default()
            .push(format_timestamp(now));
    }

    pub fn meas_records(&self, name: &str) -> Option<&[MeasRecord]> {
        self.meas.get(name).map(Vec::as_slice)
    }

    pub fn evnt_timestamps(&self, name: &str) -> Option<&[String]> {
        self.evnt.get(name).map(Vec::as_slice)
    }

    /// Write every stream to `log_dir`, one CSV per stream
    pub fn write_all(&self, log_dir: &Path) -> Result<(), BentPipeError> {
        std::fs::create_dir_all(log_dir)?;
        for (name, records) in &self.meas {
            let path = log_dir.join(format!("meas-{}.csv", name));
            let mut writer = csv::Writer::from_path(&path)
                .map_err(|e| BentPipeError::Log(e.to_string()))?;
            for record in records {
                writer
                    .write_record([&record.timestamp, &format!("{:.6}", record.value)])
                    .map_err(|e| BentPipeError::Log(e.to_string()))?;
            }
            writer.flush()?;
        }
        for (name, timestamps) in &self.evnt {
            let path = log_dir.join(format!("evnt-{}.csv", name));
            let mut writer = csv::Writer::from_path(&path)
                .map_err(|e| BentPipeError::Log(e.to_string()))?;
            for timestamp in timestamps {
                writer
                    .write_record([timestamp])
                    .map_err(|e| BentPipeError::Log(e.to_string()))?;
            }
            writer.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_measurements_accumulate_in_order() {
        let mut log = SimLog::new();
        log.meas(epoch(), "buffer-sat-0", 1.0);
        log.meas(epoch(), "buffer-sat-0", 2.5);
        log.meas(epoch(), "buffer-sat-1", 0.0);

        let records = log.meas_records("buffer-sat-0").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].value, 1.0);
        assert_eq!(records[1].value, 2.5);
        assert_eq!(log.meas_records("buffer-sat-1").unwrap().len(), 1);
        assert!(log.meas_records("buffer-sat-2").is_none());
    }

    #[test]
    fn test_events_accumulate() {
        let mut log = SimLog::new();
        log.evnt(epoch(), "trigger-time");
        log.evnt(epoch(), "trigger-time");
        assert_eq!(log.evnt_timestamps("trigger-time").unwrap().len(), 2);
    }

    #[test]
    fn test_timestamp_format_has_nanosecond_precision() {
        let t = epoch() + chrono::Duration::nanoseconds(500_000_000);
        assert_eq!(format_timestamp(t), "2025-01-01 00:00:00.500000000");
    }

    #[test]
    fn test_write_all_creates_stream_files() {
        let dir = std::env::temp_dir().join("bentpipe-logger-test");
        let _ = std::fs::remove_dir_all(&dir);

        let mut log = SimLog::new();
        log.meas(epoch(), "buffer-sat-0", 4.25);
        log.evnt(epoch(), "trigger-time");
        log.write_all(&dir).unwrap();

        let meas = std::fs::read_to_string(dir.join("meas-buffer-sat-0.csv")).unwrap();
        assert!(meas.contains("2025-01-01 00:00:00.000000000"));
        assert!(meas.contains("4.250000"));
        assert!(dir.join("evnt-trigger-time.csv").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
