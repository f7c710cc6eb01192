use serde::{Deserialize, Serialize};
use std::fmt;

/// Rows reported by the 8×8 time-of-flight sensor.
pub const GRID_ROWS: i32 = 8;
/// Columns reported by the 8×8 time-of-flight sensor.
pub const GRID_COLS: i32 = 8;
/// Number of cells that make up one full sweep.
pub const GRID_CELLS: usize = (GRID_ROWS * GRID_COLS) as usize;

/// Key of one zone in the sensor grid.
///
/// Values are taken verbatim from the wire, so a coordinate may lie outside
/// the 8×8 grid; use [`GridCoord::in_grid`] to tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    pub row: i32,
    pub col: i32,
}

impl GridCoord {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    pub fn in_grid(&self) -> bool {
        (0..GRID_ROWS).contains(&self.row) && (0..GRID_COLS).contains(&self.col)
    }

    /// All in-grid coordinates in row-major order.
    pub fn grid() -> impl Iterator<Item = GridCoord> {
        (0..GRID_ROWS).flat_map(|row| (0..GRID_COLS).map(move |col| GridCoord::new(row, col)))
    }
}

impl fmt::Display for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

/// Common error type for the sensor and actuator links.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("port {port} unavailable: {reason}")]
    PortUnavailable { port: String, reason: String },
    #[error("io error: {0}")]
    Io(String),
    #[error("actuator channel is not open")]
    ChannelNotOpen,
    #[error("parser already stopped; create a new parser to reconnect")]
    AlreadyStopped,
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        LinkError::Io(err.to_string())
    }
}

pub type LinkResult<T> = Result<T, LinkError>;
