pub mod channel;

pub use channel::{ActuatorChannel, CommandSink, FireCommand};
