pub mod engine;

pub use engine::{CellReading, DetectionConfig, DetectionEngine, ScanReport};
