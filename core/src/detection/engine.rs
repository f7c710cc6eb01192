use crate::actuator::{CommandSink, FireCommand};
use crate::frame::CellSource;
use crate::prelude::{GridCoord, LinkError};
use crate::sensor::Record;
use crate::telemetry::MetricsRecorder;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// A cell holds an object when baseline minus live exceeds this.
    pub threshold_mm: i32,
    pub scan_period_ms: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold_mm: 150,
            scan_period_ms: 100,
        }
    }
}

impl DetectionConfig {
    pub fn scan_period(&self) -> Duration {
        Duration::from_millis(self.scan_period_ms)
    }
}

/// How one cell compares against its baseline in a single cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellReading {
    /// A live or baseline record is missing or invalid.
    NoDetection,
    /// Deviation at or below the threshold.
    Clear { deviation_mm: i32 },
    /// Something sits closer than the baseline surface.
    Intruder { deviation_mm: i32 },
}

impl CellReading {
    pub fn classify(live: Option<Record>, baseline: Option<Record>, threshold_mm: i32) -> Self {
        match (live, baseline) {
            (Some(live), Some(baseline)) if live.is_valid() && baseline.is_valid() => {
                let deviation_mm = baseline.distance_mm.saturating_sub(live.distance_mm);
                if deviation_mm > threshold_mm {
                    CellReading::Intruder { deviation_mm }
                } else {
                    CellReading::Clear { deviation_mm }
                }
            }
            _ => CellReading::NoDetection,
        }
    }
}

/// Transitions observed during one scan cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub acquired: Vec<GridCoord>,
    pub released: Vec<GridCoord>,
    pub send_failures: Vec<(GridCoord, LinkError)>,
}

impl ScanReport {
    pub fn is_quiet(&self) -> bool {
        self.acquired.is_empty() && self.released.is_empty()
    }
}

/// Compares the live frame against the baseline and engages new targets.
///
/// The lock set is the engine's only state across cycles. A cell is fired on
/// exactly once per lock; releasing a lock sends nothing.
pub struct DetectionEngine<S> {
    config: DetectionConfig,
    sink: S,
    locks: BTreeSet<GridCoord>,
    metrics: Arc<MetricsRecorder>,
}

impl<S: CommandSink> DetectionEngine<S> {
    pub fn new(config: DetectionConfig, sink: S) -> Self {
        Self::with_metrics(config, sink, Arc::new(MetricsRecorder::new()))
    }

    pub fn with_metrics(config: DetectionConfig, sink: S, metrics: Arc<MetricsRecorder>) -> Self {
        Self {
            config,
            sink,
            locks: BTreeSet::new(),
            metrics,
        }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn locks(&self) -> &BTreeSet<GridCoord> {
        &self.locks
    }

    pub fn is_locked(&self, coord: GridCoord) -> bool {
        self.locks.contains(&coord)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Runs one cycle over the grid in row-major order.
    pub async fn scan<L, B>(&mut self, live: &L, baseline: &B) -> ScanReport
    where
        L: CellSource + ?Sized,
        B: CellSource + ?Sized,
    {
        let mut report = ScanReport::default();
        for coord in GridCoord::grid() {
            let reading =
                CellReading::classify(live.cell(coord), baseline.cell(coord), self.config.threshold_mm);
            match reading {
                CellReading::Intruder { deviation_mm } => {
                    if self.locks.contains(&coord) {
                        continue;
                    }
                    info!("target locked at {} ({} mm above baseline)", coord, deviation_mm);
                    match self.sink.fire(FireCommand::from(coord)).await {
                        Ok(()) => self.metrics.record_command_sent(),
                        Err(err) => {
                            warn!("fire command for {} failed: {}", coord, err);
                            self.metrics.record_send_failure();
                            report.send_failures.push((coord, err));
                        }
                    }
                    self.locks.insert(coord);
                    report.acquired.push(coord);
                }
                CellReading::Clear { .. } | CellReading::NoDetection => {
                    if self.locks.remove(&coord) {
                        debug!("target released at {} ({:?})", coord, reading);
                        report.released.push(coord);
                    }
                }
            }
        }
        report
    }

    /// Scans forever, sleeping one scan period after every cycle.
    pub async fn run<L, B>(&mut self, live: &L, baseline: &B)
    where
        L: CellSource + ?Sized,
        B: CellSource + ?Sized,
    {
        let period = self.config.scan_period();
        loop {
            self.scan(live, baseline).await;
            tokio::time::sleep(period).await;
        }
    }
}
