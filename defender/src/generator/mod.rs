pub mod sweep;

pub use sweep::{LoggingActuator, SimulatedSensor, SimulationConfig};
