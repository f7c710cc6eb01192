use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tofcore::link::SerialLink;
use tofcore::prelude::GridCoord;
use tokio::runtime::Builder as TokioBuilder;
use workflow::config::{parse_cell, DefenderConfig};
use workflow::runner::Runner;

mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "ToF ceiling watcher that fires the actuator at intruders")]
struct Args {
    /// Load the full configuration from YAML instead of the flags below
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value = "COM6")]
    sensor_port: String,
    #[arg(long, default_value_t = 460_800)]
    sensor_baud: u32,
    #[arg(long, default_value = "COM7")]
    actuator_port: String,
    #[arg(long, default_value_t = 115_200)]
    actuator_baud: u32,
    /// Minimum distance in mm an object must sit below the baseline
    #[arg(long, default_value_t = 150)]
    threshold_mm: i32,
    #[arg(long, default_value_t = 100)]
    scan_period_ms: u64,
    /// Distinct cells required before the baseline is captured
    #[arg(long, default_value_t = 64)]
    coverage_cells: usize,
    #[arg(long, default_value_t = 1000)]
    read_timeout_ms: u64,
    /// Log the live distance of this cell, given as ROW,COL
    #[arg(long, value_parser = parse_cell)]
    probe: Option<GridCoord>,
    /// Replace both serial links with the built-in simulator
    #[arg(long, default_value_t = false)]
    simulate: bool,
}

impl Args {
    fn into_config(self) -> anyhow::Result<DefenderConfig> {
        let mut config = if let Some(path) = &self.config {
            DefenderConfig::load(path)?
        } else {
            DefenderConfig {
                sensor: SerialLink::new(self.sensor_port, self.sensor_baud),
                actuator: SerialLink::new(self.actuator_port, self.actuator_baud),
                threshold_mm: self.threshold_mm,
                scan_period_ms: self.scan_period_ms,
                coverage_cells: self.coverage_cells,
                read_timeout_ms: self.read_timeout_ms,
                probe: self.probe,
                ..Default::default()
            }
        };
        config.simulate |= self.simulate;
        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = Args::parse().into_config()?;

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating runtime")?;
    let summary = runtime.block_on(Runner::new(config).run())?;

    println!(
        "Run finished -> baseline cells {}, records {}, fired {}, still locked {}",
        summary.baseline_cells,
        summary.metrics.records,
        summary.metrics.commands_sent,
        summary.locked.len()
    );
    Ok(())
}
