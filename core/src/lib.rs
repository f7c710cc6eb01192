//! Core ingestion and detection for the ToF airfield defender.
//!
//! Sensor lines flow from the [`sensor::StreamParser`] into a live
//! [`frame::FrameStore`]; the [`detection::DetectionEngine`] diffs that frame
//! against a frozen baseline and drives the [`actuator::ActuatorChannel`].

pub mod actuator;
pub mod detection;
pub mod frame;
pub mod link;
pub mod prelude;
pub mod sensor;
pub mod telemetry;

pub use prelude::{GridCoord, LinkError, LinkResult};
