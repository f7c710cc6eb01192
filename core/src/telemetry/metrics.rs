use std::sync::Mutex;

/// Running counters shared by the ingestion and detection flows.
pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records: usize,
    pub discarded_lines: usize,
    pub io_errors: usize,
    pub commands_sent: usize,
    pub send_failures: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    pub fn record_decoded(&self) {
        self.update(|metrics| metrics.records += 1);
    }

    pub fn record_discarded(&self) {
        self.update(|metrics| metrics.discarded_lines += 1);
    }

    pub fn record_io_error(&self) {
        self.update(|metrics| metrics.io_errors += 1);
    }

    pub fn record_command_sent(&self) {
        self.update(|metrics| metrics.commands_sent += 1);
    }

    pub fn record_send_failure(&self) {
        self.update(|metrics| metrics.send_failures += 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            MetricsSnapshot::default()
        }
    }

    fn update(&self, apply: impl FnOnce(&mut MetricsSnapshot)) {
        if let Ok(mut metrics) = self.inner.lock() {
            apply(&mut metrics);
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_independently() {
        let metrics = MetricsRecorder::new();
        metrics.record_decoded();
        metrics.record_decoded();
        metrics.record_discarded();
        metrics.record_send_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.records, 2);
        assert_eq!(snapshot.discarded_lines, 1);
        assert_eq!(snapshot.io_errors, 0);
        assert_eq!(snapshot.commands_sent, 0);
        assert_eq!(snapshot.send_failures, 1);
    }
}
