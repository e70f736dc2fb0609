//! Bentpipe constellation simulator CLI
//!
//! Runs one simulation of a LEO Earth-observation constellation downlinking
//! through ground stations, then writes per-stream CSV logs for the
//! analytics tooling.
//!
//! ```bash
//! bent_pipe ./configuration ./logs
//! bent_pipe ./configuration ./logs roundrobin frame-spaced
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bentpipe_core::{bits_to_megabytes, ConstellationConfig, SensorConfig, SimulationConfig};
use bentpipe_sim::orbit::CircularOrbit;
use bentpipe_sim::policy::make_policy;
use bentpipe_sim::simulator::Simulator;
use bentpipe_sim::spacing::make_strategy;
use bentpipe_sim::visibility::PassScheduleOracle;

// Constellation geometry for the closed-form position source
const ORBIT_ALTITUDE_KM: f64 = 550.0;
const ORBIT_PERIOD_SEC: f64 = 5730.0;

// Synthetic pass schedule: one contact per satellite per orbit
const PASS_SEC: f64 = 600.0;

/// LEO constellation downlink simulator
#[derive(Parser)]
#[command(name = "bent_pipe")]
#[command(about = "Simulate constellation observation and downlink scheduling", long_about = None)]
struct Cli {
    /// Directory containing sensor.dat, constellation.dat, simulation.dat
    config_dir: PathBuf,

    /// Output directory for CSV log streams
    log_dir: PathBuf,

    /// Link scheduling policy (sticky, greedy, fifo, roundrobin, random,
    /// sjf, srtf)
    #[arg(default_value = "sticky")]
    policy: String,

    /// Observation spacing strategy (bent-pipe, close-spaced, frame-spaced,
    /// orbit-spaced, close-orbit-spaced)
    #[arg(default_value = "bent-pipe")]
    spacing: String,

    /// Write a JSON run summary to this path
    #[arg(long)]
    summary: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bent_pipe=info,bentpipe_sim=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let sensor_config = SensorConfig::load(&cli.config_dir)?;
    let constellation = ConstellationConfig::load(&cli.config_dir)?;
    let sim_config = SimulationConfig::load(&cli.config_dir)?;

    let strategy = make_strategy(&cli.spacing)?;
    let policy = make_policy(&cli.policy)?;

    let sat_ids: Vec<u32> = (0..constellation.count).collect();
    let gnd_ids: Vec<u32> = (0..sim_config.ground_station_count).collect();

    let start_time = chrono::DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
        .context("invalid start epoch")?
        .with_timezone(&chrono::Utc);

    let positions = CircularOrbit::new(
        ORBIT_ALTITUDE_KM,
        ORBIT_PERIOD_SEC,
        sim_config.step_sec,
        &sat_ids,
    );

    let pass_steps = ((PASS_SEC / sim_config.step_sec) as u64).max(1);
    let period_steps = ((ORBIT_PERIOD_SEC / sim_config.step_sec) as u64).max(1);
    let stagger_steps = (period_steps / sat_ids.len() as u64).max(1);
    let oracle = PassScheduleOracle::synthesize(
        &gnd_ids,
        &sat_ids,
        sim_config.num_steps + 1,
        pass_steps,
        period_steps,
        stagger_steps,
    );

    info!(
        "{} satellites, {} ground stations, {} steps of {} s",
        constellation.count,
        sim_config.ground_station_count,
        sim_config.num_steps,
        sim_config.step_sec
    );

    let mut sim = Simulator::new(
        &sim_config,
        &sensor_config,
        start_time,
        &sat_ids,
        &gnd_ids,
        strategy,
        policy,
        Box::new(oracle),
        Box::new(positions),
    );

    let result = sim.run()?;
    sim.log().write_all(&cli.log_dir)?;
    info!("log streams written to {}", cli.log_dir.display());

    println!(
        "{:<10} {:>14} {:>14} {:>14} {:>14}",
        "Satellite", "Sensed (MB)", "Drained (MB)", "Lost (MB)", "Buffered (MB)"
    );
    println!("{}", "-".repeat(70));
    for totals in &result.satellites {
        println!(
            "{:<10} {:>14.2} {:>14.2} {:>14.2} {:>14.2}",
            totals.sat_id,
            bits_to_megabytes(totals.sensed_bits),
            bits_to_megabytes(totals.drained_bits),
            bits_to_megabytes(totals.lost_bits),
            bits_to_megabytes(totals.buffered_bits),
        );
    }
    println!("{}", "-".repeat(70));
    println!(
        "{:<10} {:>14.2} {:>14.2} {:>14.2} {:>14.2}",
        "total",
        bits_to_megabytes(result.total_sensed_bits),
        bits_to_megabytes(result.total_drained_bits),
        bits_to_megabytes(result.total_lost_bits),
        bits_to_megabytes(result.total_buffered_bits),
    );

    if let Some(path) = cli.summary {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write summary to {}", path.display()))?;
        info!("summary written to {}", path.display());
    }

    Ok(())
}
