use log::info;
use std::sync::Arc;
use std::time::Duration;
use tofcore::frame::FrameStore;
use tofcore::prelude::GridCoord;
use tofcore::telemetry::{MetricsRecorder, MetricsSnapshot};
use tokio::task::JoinHandle;

pub fn describe_probe(live: &FrameStore, coord: GridCoord) -> String {
    match live.get(coord) {
        Some(record) if record.is_valid() => {
            format!("Distance at {}: {} mm", coord, record.distance_mm)
        }
        Some(_) => format!("Measurement at {} is invalid.", coord),
        None => format!("No measurement recorded yet at {}.", coord),
    }
}

pub fn describe_metrics(metrics: &MetricsSnapshot) -> String {
    format!(
        "records {} discarded {} io_errors {} fired {} failed_sends {}",
        metrics.records,
        metrics.discarded_lines,
        metrics.io_errors,
        metrics.commands_sent,
        metrics.send_failures
    )
}

/// Logs ingestion counters, and the probe cell when set, once per interval.
pub fn spawn_reporter(
    live: Arc<FrameStore>,
    metrics: Arc<MetricsRecorder>,
    probe: Option<GridCoord>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            info!("{}", describe_metrics(&metrics.snapshot()));
            if let Some(coord) = probe {
                info!("{}", describe_probe(&live, coord));
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tofcore::sensor::Record;

    #[test]
    fn probe_distinguishes_missing_invalid_and_valid() {
        let live = FrameStore::new();
        let coord = GridCoord::new(0, 1);
        assert_eq!(
            describe_probe(&live, coord),
            "No measurement recorded yet at (0,1)."
        );

        live.set(coord, Record::parse_line("0,0,1,-1,5,0,0").unwrap());
        assert_eq!(describe_probe(&live, coord), "Measurement at (0,1) is invalid.");

        live.set(coord, Record::parse_line("0,0,1,812,0,10,5").unwrap());
        assert_eq!(describe_probe(&live, coord), "Distance at (0,1): 812 mm");
    }

    #[test]
    fn metrics_line_lists_every_counter() {
        let line = describe_metrics(&MetricsSnapshot {
            records: 64,
            discarded_lines: 2,
            io_errors: 1,
            commands_sent: 3,
            send_failures: 0,
        });
        assert_eq!(line, "records 64 discarded 2 io_errors 1 fired 3 failed_sends 0");
    }
}
