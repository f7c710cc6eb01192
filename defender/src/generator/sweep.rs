use log::{debug, info};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tofcore::link::{ActuatorConnector, ActuatorStream, SensorConnector, SensorStream};
use tofcore::prelude::{GridCoord, LinkResult, GRID_CELLS};
use tofcore::sensor::Record;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const PIPE_CAPACITY: usize = 16 * 1024;

/// Configuration for generating synthetic sensor sweeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    pub ceiling_mm: i32,
    pub noise_mm: i32,
    /// Probability that a cell reports a failed measurement in a sweep.
    pub dropout_rate: f64,
    pub intruder_mm: i32,
    pub intruder_after_sweeps: u64,
    /// Sweeps the intruder stays on one cell before moving to the next.
    pub intruder_dwell_sweeps: u64,
    pub sweep_interval_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            ceiling_mm: 2400,
            noise_mm: 15,
            dropout_rate: 0.01,
            intruder_mm: 1500,
            intruder_after_sweeps: 30,
            intruder_dwell_sweeps: 20,
            sweep_interval_ms: 66,
        }
    }
}

/// Produces full 8×8 sweeps of a flat ceiling with a wandering intruder.
pub struct SweepGenerator {
    config: SimulationConfig,
    rng: StdRng,
    sweep: u64,
}

impl SweepGenerator {
    pub fn new(config: SimulationConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            sweep: 0,
        }
    }

    pub fn sweeps_emitted(&self) -> u64 {
        self.sweep
    }

    /// Cell the intruder occupies in the upcoming sweep, if it has appeared.
    pub fn intruder_cell(&self) -> Option<GridCoord> {
        let elapsed = self.sweep.checked_sub(self.config.intruder_after_sweeps)?;
        let step = elapsed / self.config.intruder_dwell_sweeps.max(1);
        GridCoord::grid().nth((step % GRID_CELLS as u64) as usize)
    }

    pub fn next_sweep(&mut self) -> Vec<Record> {
        let intruder = self.intruder_cell();
        let noise = self.config.noise_mm.abs();
        let dropout = self.config.dropout_rate.clamp(0.0, 1.0);

        let mut records = Vec::with_capacity(GRID_CELLS);
        for coord in GridCoord::grid() {
            let (distance_mm, status) = if self.rng.gen_bool(dropout) {
                (-1, 255)
            } else {
                let surface = if Some(coord) == intruder {
                    self.config.intruder_mm
                } else {
                    self.config.ceiling_mm
                };
                (surface + self.rng.gen_range(-noise..=noise), 0)
            };
            records.push(Record {
                row: coord.row,
                target_index: 0,
                col: coord.col,
                distance_mm,
                status,
                signal: self.rng.gen_range(200..4000),
                ambient: self.rng.gen_range(0..40),
            });
        }
        self.sweep += 1;
        records
    }

    /// Next sweep in sensor wire format, one newline-terminated line per cell.
    pub fn next_sweep_text(&mut self) -> String {
        self.next_sweep()
            .iter()
            .map(|record| format!("{}\n", record.to_line()))
            .collect()
    }
}

/// Sensor link backed by a [`SweepGenerator`] task instead of a serial port.
pub struct SimulatedSensor {
    config: SimulationConfig,
}

impl SimulatedSensor {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }
}

impl SensorConnector for SimulatedSensor {
    fn describe(&self) -> String {
        format!("simulated sensor (seed {})", self.config.seed)
    }

    fn connect(&self) -> LinkResult<SensorStream> {
        let (mut device, host) = tokio::io::duplex(PIPE_CAPACITY);
        let mut generator = SweepGenerator::new(self.config.clone());
        let interval = Duration::from_millis(self.config.sweep_interval_ms.max(1));
        tokio::spawn(async move {
            loop {
                let text = generator.next_sweep_text();
                if device.write_all(text.as_bytes()).await.is_err() {
                    break;
                }
                tokio::time::sleep(interval).await;
            }
            debug!(
                "simulated sensor stopped after {} sweeps",
                generator.sweeps_emitted()
            );
        });
        Ok(Box::new(host))
    }
}

/// Actuator link that logs every command it receives.
pub struct LoggingActuator;

impl ActuatorConnector for LoggingActuator {
    fn describe(&self) -> String {
        "simulated actuator".to_string()
    }

    fn connect(&self) -> LinkResult<ActuatorStream> {
        let (host, device) = tokio::io::duplex(PIPE_CAPACITY);
        tokio::spawn(async move {
            let mut lines = BufReader::new(device).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!("[SIM] actuator received {}", line);
            }
        });
        Ok(Box::new(host))
    }
}
