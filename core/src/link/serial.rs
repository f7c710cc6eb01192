use crate::link::{ActuatorConnector, ActuatorStream, SensorConnector, SensorStream};
use crate::prelude::{LinkError, LinkResult};
use log::info;
use serde::{Deserialize, Serialize};
use tokio_serial::SerialPortBuilderExt;

/// A COM-style serial port identified by name and baud rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialLink {
    pub port: String,
    pub baud: u32,
}

impl SerialLink {
    pub fn new(port: impl Into<String>, baud: u32) -> Self {
        Self {
            port: port.into(),
            baud,
        }
    }

    fn open(&self) -> LinkResult<tokio_serial::SerialStream> {
        let stream = tokio_serial::new(&self.port, self.baud)
            .open_native_async()
            .map_err(|err| LinkError::PortUnavailable {
                port: self.port.clone(),
                reason: err.to_string(),
            })?;
        info!("opened serial port {} at {} baud", self.port, self.baud);
        Ok(stream)
    }
}

impl SensorConnector for SerialLink {
    fn describe(&self) -> String {
        format!("{}@{}", self.port, self.baud)
    }

    fn connect(&self) -> LinkResult<SensorStream> {
        Ok(Box::new(self.open()?))
    }
}

impl ActuatorConnector for SerialLink {
    fn describe(&self) -> String {
        format!("{}@{}", self.port, self.baud)
    }

    fn connect(&self) -> LinkResult<ActuatorStream> {
        Ok(Box::new(self.open()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_port_reports_port_unavailable() {
        let link = SerialLink::new("/dev/does-not-exist-tof", 460800);
        match SensorConnector::connect(&link) {
            Err(LinkError::PortUnavailable { port, .. }) => {
                assert_eq!(port, "/dev/does-not-exist-tof")
            }
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("opened a port that does not exist"),
        }
    }
}
