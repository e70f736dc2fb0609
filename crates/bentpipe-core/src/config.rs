//! Configuration file parsing
//!
//! The configuration directory holds small `.dat` files: one header line,
//! one CSV data line. The formats are fixed by the ground tooling that
//! produces and consumes them, so parsing is line-oriented by hand rather
//! than through a serde format.

use std::path::Path;
use std::str::FromStr;

use crate::error::BentPipeError;

/// Imaging sensor parameters, from `sensor.dat`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorConfig {
    pub bits_per_sense: u64,
    pub image_width_px: u32,
    pub image_height_px: u32,
    pub bits_per_pixel: u32,
    /// Buffer cap in megabytes; zero means unbounded
    pub max_buffer_mb: u64,
}

impl SensorConfig {
    pub fn load(config_dir: &Path) -> Result<Self, BentPipeError> {
        let contents = read_config_file(config_dir, "sensor.dat")?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, BentPipeError> {
        let fields = data_line_fields(contents, "sensor.dat", 5)?;
        Ok(Self {
            bits_per_sense: parse_field(&fields, 0, "sensor.dat", "bits_per_sense")?,
            image_width_px: parse_field(&fields, 1, "sensor.dat", "image_width_px")?,
            image_height_px: parse_field(&fields, 2, "sensor.dat", "image_height_px")?,
            bits_per_pixel: parse_field(&fields, 3, "sensor.dat", "bits_per_pixel")?,
            max_buffer_mb: parse_field(&fields, 4, "sensor.dat", "max_buffer_mb")?,
        })
    }

    /// Buffer cap in bits; `max_buffer_mb == 0` selects an unbounded buffer
    pub fn max_buffer_bits(&self) -> u64 {
        if self.max_buffer_mb == 0 {
            u64::MAX
        } else {
            self.max_buffer_mb.saturating_mul(8 * 1024 * 1024)
        }
    }
}

/// Constellation shape, from `constellation.dat`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstellationConfig {
    pub count: u32,
}

impl ConstellationConfig {
    pub fn load(config_dir: &Path) -> Result<Self, BentPipeError> {
        let contents = read_config_file(config_dir, "constellation.dat")?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, BentPipeError> {
        let fields = data_line_fields(contents, "constellation.dat", 1)?;
        let count: u32 = parse_field(&fields, 0, "constellation.dat", "count")?;
        if count == 0 {
            return Err(BentPipeError::Config(
                "constellation.dat: satellite count must be at least 1".to_string(),
            ));
        }
        Ok(Self { count })
    }
}

/// Run shape, from `simulation.dat`
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub step_sec: f64,
    pub num_steps: u64,
    pub link_rate_mbps: f64,
    pub thresh_coeff: f64,
    pub ground_station_count: u32,
}

impl SimulationConfig {
    pub fn load(config_dir: &Path) -> Result<Self, BentPipeError> {
        let contents = read_config_file(config_dir, "simulation.dat")?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, BentPipeError> {
        let fields = data_line_fields(contents, "simulation.dat", 5)?;
        let config = Self {
            step_sec: parse_field(&fields, 0, "simulation.dat", "step_sec")?,
            num_steps: parse_field(&fields, 1, "simulation.dat", "num_steps")?,
            link_rate_mbps: parse_field(&fields, 2, "simulation.dat", "link_rate_mbps")?,
            thresh_coeff: parse_field(&fields, 3, "simulation.dat", "thresh_coeff")?,
            ground_station_count: parse_field(
                &fields,
                4,
                "simulation.dat",
                "ground_station_count",
            )?,
        };
        if config.step_sec <= 0.0 {
            return Err(BentPipeError::Config(
                "simulation.dat: step_sec must be positive".to_string(),
            ));
        }
        if config.ground_station_count == 0 {
            return Err(BentPipeError::Config(
                "simulation.dat: ground_station_count must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    /// Downlink rate in bits per second
    pub fn link_rate_bps(&self) -> f64 {
        self.link_rate_mbps * 1_000_000.0
    }
}

fn read_config_file(config_dir: &Path, file_name: &str) -> Result<String, BentPipeError> {
    let path = config_dir.join(file_name);
    std::fs::read_to_string(&path).map_err(|e| {
        BentPipeError::Config(format!("failed to read {}: {}", path.display(), e))
    })
}

/// Skip the header line and split the first data line into CSV fields
fn data_line_fields(
    contents: &str,
    file_name: &str,
    min_fields: usize,
) -> Result<Vec<String>, BentPipeError> {
    let data_line = contents
        .lines()
        .skip(1)
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| BentPipeError::Config(format!("{}: missing data line", file_name)))?;
    let fields: Vec<String> = data_line
        .split(',')
        .map(|field| field.trim().to_string())
        .collect();
    if fields.len() < min_fields {
        return Err(BentPipeError::Config(format!(
            "{}: expected at least {} fields, found {}",
            file_name,
            min_fields,
            fields.len()
        )));
    }
    Ok(fields)
}

fn parse_field<T: FromStr>(
    fields: &[String],
    index: usize,
    file_name: &str,
    field_name: &str,
) -> Result<T, BentPipeError> {
    fields[index].parse().map_err(|_| {
        BentPipeError::Config(format!(
            "{}: invalid {} value '{}'",
            file_name, field_name, fields[index]
        ))
    })
}
