use crate::generator::{LoggingActuator, SimulatedSensor};
use crate::workflow::config::DefenderConfig;
use crate::workflow::report::{describe_metrics, spawn_reporter};
use anyhow::Context;
use log::info;
use std::future::Future;
use std::sync::Arc;
use tofcore::actuator::ActuatorChannel;
use tofcore::detection::DetectionEngine;
use tofcore::frame::{spawn_frame_writer, FrameStore};
use tofcore::link::{ActuatorConnector, SensorConnector};
use tofcore::prelude::GridCoord;
use tofcore::sensor::StreamParser;
use tofcore::telemetry::{MetricsRecorder, MetricsSnapshot};

/// What a run achieved by the time it was asked to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub metrics: MetricsSnapshot,
    /// Cells in the captured baseline; zero if shutdown came first.
    pub baseline_cells: usize,
    pub locked: Vec<GridCoord>,
}

#[derive(Clone)]
pub struct Runner {
    config: DefenderConfig,
}

impl Runner {
    pub fn new(config: DefenderConfig) -> Self {
        Self { config }
    }

    fn connectors(&self) -> (Box<dyn SensorConnector>, Box<dyn ActuatorConnector>) {
        if self.config.simulate {
            (
                Box::new(SimulatedSensor::new(self.config.simulation.clone())),
                Box::new(LoggingActuator),
            )
        } else {
            (
                Box::new(self.config.sensor.clone()),
                Box::new(self.config.actuator.clone()),
            )
        }
    }

    /// Runs until `shutdown` resolves.
    ///
    /// Fails when the config is invalid or the sensor link cannot be opened;
    /// a missing actuator just means commands are dropped.
    pub async fn run_until<F>(&self, shutdown: F) -> anyhow::Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        self.config.validate()?;
        tokio::pin!(shutdown);
        let (sensor, actuator) = self.connectors();
        let metrics = Arc::new(MetricsRecorder::new());
        let live = Arc::new(FrameStore::new());

        let parser = StreamParser::with_metrics(sensor, self.config.to_parser_config(), metrics.clone());
        let writer = spawn_frame_writer(parser.subscribe(), live.clone());
        parser.start().context("starting sensor link")?;

        let channel = ActuatorChannel::open_or_disconnected(actuator.as_ref())
            .with_send_timeout(self.config.send_timeout());
        let reporter = spawn_reporter(
            live.clone(),
            metrics.clone(),
            self.config.probe,
            self.config.report_interval(),
        );

        let required = self.config.coverage_cells;
        info!("waiting for {} cells before capturing the baseline", required);
        let baseline = tokio::select! {
            _ = live.wait_for_coverage(required, self.config.coverage_poll()) => Some(live.snapshot()),
            _ = &mut shutdown => None,
        };

        let mut locked = Vec::new();
        let mut baseline_cells = 0;
        if let Some(baseline) = baseline {
            baseline_cells = baseline.coverage();
            info!("baseline captured with {} cells", baseline_cells);

            let mut engine = DetectionEngine::with_metrics(
                self.config.to_detection_config(),
                channel,
                metrics.clone(),
            );
            tokio::select! {
                _ = engine.run(&*live, &baseline) => {}
                _ = &mut shutdown => {}
            }
            locked = engine.locks().iter().copied().collect();
            engine.sink_mut().close().await;
        }

        info!("shutting down");
        reporter.abort();
        parser.shutdown().await;
        drop(parser);
        let _ = writer.await;

        let metrics = metrics.snapshot();
        info!("{}", describe_metrics(&metrics));
        Ok(RunSummary {
            metrics,
            baseline_cells,
            locked,
        })
    }

    /// Runs until Ctrl+C.
    pub async fn run(&self) -> anyhow::Result<RunSummary> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                log::error!("awaiting Ctrl+C failed: {}", err);
                std::future::pending::<()>().await;
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::SimulationConfig;
    use std::time::Duration;
    use tofcore::link::SerialLink;

    fn simulated_config() -> DefenderConfig {
        DefenderConfig {
            scan_period_ms: 10,
            read_timeout_ms: 20,
            coverage_poll_ms: 5,
            report_interval_ms: 60_000,
            simulate: true,
            simulation: SimulationConfig {
                seed: 3,
                ceiling_mm: 2000,
                noise_mm: 10,
                dropout_rate: 0.0,
                intruder_mm: 1000,
                intruder_after_sweeps: 10,
                intruder_dwell_sweeps: 1_000_000,
                sweep_interval_ms: 10,
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn simulated_intruder_is_fired_on_once() {
        let runner = Runner::new(simulated_config());
        let summary = runner
            .run_until(tokio::time::sleep(Duration::from_millis(1500)))
            .await
            .unwrap();

        assert_eq!(summary.baseline_cells, 64);
        assert_eq!(summary.metrics.commands_sent, 1);
        assert_eq!(summary.metrics.send_failures, 0);
        assert_eq!(summary.locked, vec![GridCoord::new(0, 0)]);
        assert!(summary.metrics.records >= 64 * 10);
    }

    #[tokio::test]
    async fn shutdown_before_coverage_skips_detection() {
        let summary = Runner::new(simulated_config())
            .run_until(std::future::ready(()))
            .await
            .unwrap();

        assert_eq!(summary.baseline_cells, 0);
        assert!(summary.locked.is_empty());
        assert_eq!(summary.metrics.commands_sent, 0);
    }

    #[tokio::test]
    async fn unreachable_coverage_is_rejected_before_opening_links() {
        let mut config = simulated_config();
        config.coverage_cells = 65;
        let err = Runner::new(config)
            .run_until(std::future::pending())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("coverage_cells"), "{err:#}");
    }

    #[tokio::test]
    async fn missing_sensor_port_fails_the_run() {
        let config = DefenderConfig {
            sensor: SerialLink::new("/dev/does-not-exist-tof", 460_800),
            ..Default::default()
        };
        let err = Runner::new(config)
            .run_until(async {})
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("starting sensor link"));
    }
}
