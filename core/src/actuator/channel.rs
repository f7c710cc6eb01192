use crate::link::{ActuatorConnector, ActuatorStream};
use crate::prelude::{GridCoord, LinkError, LinkResult};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Upper bound on writing and flushing one command.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Instructs the actuator to engage one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FireCommand {
    pub row: i32,
    pub col: i32,
}

impl FireCommand {
    /// Wire form: `FIRE<row><col>\n`, digits concatenated.
    pub fn encode(&self) -> String {
        format!("FIRE{}{}\n", self.row, self.col)
    }
}

impl From<GridCoord> for FireCommand {
    fn from(coord: GridCoord) -> Self {
        Self {
            row: coord.row,
            col: coord.col,
        }
    }
}

impl fmt::Display for FireCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FIRE{}{}", self.row, self.col)
    }
}

/// Destination for fire commands issued by the detection engine.
#[allow(async_fn_in_trait)]
pub trait CommandSink {
    async fn fire(&mut self, command: FireCommand) -> LinkResult<()>;
}

/// Outbound command link to the laser/servo controller.
pub struct ActuatorChannel<W = ActuatorStream> {
    name: String,
    writer: Option<W>,
    send_timeout: Duration,
}

impl ActuatorChannel<ActuatorStream> {
    pub fn open(connector: &dyn ActuatorConnector) -> LinkResult<Self> {
        let writer = connector.connect()?;
        info!("actuator link {} open", connector.describe());
        Ok(Self::from_writer(connector.describe(), writer))
    }

    /// Opens the link, falling back to a closed channel whose sends fail with
    /// [`LinkError::ChannelNotOpen`].
    pub fn open_or_disconnected(connector: &dyn ActuatorConnector) -> Self {
        match Self::open(connector) {
            Ok(channel) => channel,
            Err(err) => {
                warn!(
                    "actuator link {} unavailable, commands will be dropped: {}",
                    connector.describe(),
                    err
                );
                Self::disconnected(connector.describe())
            }
        }
    }
}

impl<W: AsyncWrite + Unpin> ActuatorChannel<W> {
    pub fn from_writer(name: impl Into<String>, writer: W) -> Self {
        Self {
            name: name.into(),
            writer: Some(writer),
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn disconnected(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            writer: None,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    pub fn writer(&self) -> Option<&W> {
        self.writer.as_ref()
    }

    pub async fn send(&mut self, command: FireCommand) -> LinkResult<()> {
        let writer = self.writer.as_mut().ok_or(LinkError::ChannelNotOpen)?;
        let write = async {
            writer.write_all(command.encode().as_bytes()).await?;
            writer.flush().await
        };
        match tokio::time::timeout(self.send_timeout, write).await {
            Ok(result) => result?,
            Err(_elapsed) => {
                return Err(LinkError::Io(format!(
                    "sending {} on {} timed out after {:?}",
                    command, self.name, self.send_timeout
                )))
            }
        }
        debug!("sent {} on {}", command, self.name);
        Ok(())
    }

    /// Flushes and releases the link; later sends fail with `ChannelNotOpen`.
    pub async fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(err) = writer.shutdown().await {
                warn!("closing actuator link {}: {}", self.name, err);
            }
        }
    }
}

impl<W: AsyncWrite + Unpin> CommandSink for ActuatorChannel<W> {
    async fn fire(&mut self, command: FireCommand) -> LinkResult<()> {
        self.send(command).await
    }
}
