//! Transport boundary for the sensor and actuator serial links.
//!
//! The rest of the crate only sees boxed async byte streams, so tests and the
//! simulator can substitute in-memory pipes for real ports.

pub mod serial;

use crate::prelude::LinkResult;
use tokio::io::{AsyncRead, AsyncWrite};

pub type SensorStream = Box<dyn AsyncRead + Send + Unpin>;
pub type ActuatorStream = Box<dyn AsyncWrite + Send + Unpin>;

/// Opens the inbound byte stream carrying sensor lines.
pub trait SensorConnector: Send + Sync {
    /// Human readable name of the link, used in diagnostics.
    fn describe(&self) -> String;

    fn connect(&self) -> LinkResult<SensorStream>;
}

/// Opens the outbound byte stream accepting actuator commands.
pub trait ActuatorConnector: Send + Sync {
    fn describe(&self) -> String;

    fn connect(&self) -> LinkResult<ActuatorStream>;
}

impl<T: SensorConnector + ?Sized> SensorConnector for Box<T> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn connect(&self) -> LinkResult<SensorStream> {
        (**self).connect()
    }
}

impl<T: ActuatorConnector + ?Sized> ActuatorConnector for Box<T> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn connect(&self) -> LinkResult<ActuatorStream> {
        (**self).connect()
    }
}

pub use serial::SerialLink;
