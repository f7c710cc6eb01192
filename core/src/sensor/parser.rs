use crate::link::{SensorConnector, SensorStream};
use crate::prelude::{LinkError, LinkResult};
use crate::sensor::record::Record;
use crate::telemetry::MetricsRecorder;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Pause after a transport fault so a dead port does not spin the loop.
const ERROR_BACKOFF: Duration = Duration::from_millis(50);
const LINE_CAPACITY: usize = 64;
/// Longest run of bytes without a newline kept before it is dropped as noise.
const MAX_LINE_BYTES: usize = LINE_CAPACITY * 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Upper bound on a single line read; also bounds how long `stop` waits.
    pub read_timeout_ms: u64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: 1000,
        }
    }
}

impl ParserConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }
}

/// Notification delivered to every subscriber of a [`StreamParser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserEvent {
    Record(Record),
    IoError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    Created,
    Opening,
    Running,
    Stopped,
}

pub type EventReceiver = mpsc::UnboundedReceiver<ParserEvent>;

struct Shared {
    state: Mutex<ParserState>,
    cancelled: AtomicBool,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ParserEvent>>>,
    metrics: Arc<MetricsRecorder>,
}

impl Shared {
    fn publish(&self, event: ParserEvent) {
        lock(&self.subscribers).retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn report_io_error(&self, message: String) {
        debug!("sensor link fault: {}", message);
        self.metrics.record_io_error();
        self.publish(ParserEvent::IoError(message));
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Turns the sensor byte stream into [`Record`]s on a background task.
///
/// A parser is single-use: once stopped, or once opening the port failed, it
/// cannot be started again.
pub struct StreamParser {
    connector: Box<dyn SensorConnector>,
    config: ParserConfig,
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StreamParser {
    pub fn new(connector: impl SensorConnector + 'static, config: ParserConfig) -> Self {
        Self::with_metrics(connector, config, Arc::new(MetricsRecorder::new()))
    }

    pub fn with_metrics(
        connector: impl SensorConnector + 'static,
        config: ParserConfig,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            connector: Box::new(connector),
            config,
            shared: Arc::new(Shared {
                state: Mutex::new(ParserState::Created),
                cancelled: AtomicBool::new(false),
                subscribers: Mutex::new(Vec::new()),
                metrics,
            }),
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ParserState {
        *lock(&self.shared.state)
    }

    pub fn metrics(&self) -> Arc<MetricsRecorder> {
        self.shared.metrics.clone()
    }

    /// Registers a new subscriber; it sees every event published after this call.
    pub fn subscribe(&self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.shared.subscribers).push(tx);
        rx
    }

    /// Opens the sensor link and spawns the ingestion loop.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> LinkResult<()> {
        {
            let mut state = lock(&self.shared.state);
            match *state {
                ParserState::Opening | ParserState::Running => return Ok(()),
                ParserState::Stopped => return Err(LinkError::AlreadyStopped),
                ParserState::Created => *state = ParserState::Opening,
            }
        }
        debug!("opening sensor link {}", self.connector.describe());

        let stream = match self.connector.connect() {
            Ok(stream) => stream,
            Err(err) => {
                *lock(&self.shared.state) = ParserState::Stopped;
                error!("sensor link {} failed to open: {}", self.connector.describe(), err);
                return Err(err);
            }
        };

        let mut state = lock(&self.shared.state);
        if *state == ParserState::Stopped {
            return Err(LinkError::AlreadyStopped);
        }
        *state = ParserState::Running;
        let handle = tokio::spawn(ingest(stream, self.shared.clone(), self.config.read_timeout()));
        *lock(&self.task) = Some(handle);
        info!("receiving sensor data from {}", self.connector.describe());
        Ok(())
    }

    /// Cancels ingestion and releases the link. Safe to call repeatedly and
    /// from any thread.
    pub fn stop(&self) {
        self.shared.cancelled.store(true, Ordering::Release);
        let mut state = lock(&self.shared.state);
        if *state != ParserState::Stopped {
            info!("sensor parser stopped");
            *state = ParserState::Stopped;
        }
        if let Some(handle) = lock(&self.task).as_ref() {
            handle.abort();
        }
    }

    /// Stops the parser and waits until the ingestion task has released the link.
    pub async fn shutdown(&self) {
        self.stop();
        let handle = lock(&self.task).take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Drop for StreamParser {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn ingest(stream: SensorStream, shared: Arc<Shared>, read_timeout: Duration) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::with_capacity(LINE_CAPACITY);
    let mut link_closed = false;

    while !shared.is_cancelled() {
        if buf.len() >= MAX_LINE_BYTES {
            debug!("dropping {} bytes received without a line break", buf.len());
            shared.metrics.record_discarded();
            buf.clear();
        }

        // Bytes of a partial line stay in `buf` across timeouts.
        let room = (MAX_LINE_BYTES - buf.len()) as u64;
        let mut limited = (&mut reader).take(room);
        let read = limited.read_until(b'\n', &mut buf);
        match tokio::time::timeout(read_timeout, read).await {
            Err(_elapsed) => continue,
            Ok(Ok(0)) => {
                buf.clear();
                if !link_closed {
                    link_closed = true;
                    shared.report_io_error("sensor link closed by peer".to_string());
                }
                tokio::time::sleep(read_timeout).await;
            }
            Ok(Ok(_)) => {
                link_closed = false;
                if buf.last() != Some(&b'\n') {
                    continue;
                }
                handle_line(&shared, &buf);
                buf.clear();
            }
            Ok(Err(err)) if err.kind() == std::io::ErrorKind::TimedOut => continue,
            Ok(Err(err)) => {
                shared.report_io_error(format!("Error: {}", err));
                tokio::time::sleep(ERROR_BACKOFF).await;
            }
        }
    }
    debug!("sensor ingestion loop exited");
}

fn handle_line(shared: &Shared, raw: &[u8]) {
    let text = String::from_utf8_lossy(raw);
    let line = text.trim();
    if line.is_empty() {
        return;
    }
    match Record::parse_line(line) {
        Some(record) => {
            shared.metrics.record_decoded();
            shared.publish(ParserEvent::Record(record));
        }
        None => shared.metrics.record_discarded(),
    }
}
