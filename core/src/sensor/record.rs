use crate::prelude::GridCoord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of comma-separated fields in one sensor line.
pub const FIELD_COUNT: usize = 7;

/// One decoded measurement for a single zone of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub row: i32,
    pub target_index: i32,
    pub col: i32,
    /// Distance in millimetres; zero or negative marks a failed measurement.
    pub distance_mm: i32,
    /// Ranging status reported by the sensor, 0 means OK.
    pub status: i32,
    pub signal: i32,
    pub ambient: i32,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub(crate) enum DecodeError {
    #[error("expected 7 fields, got {0}")]
    FieldCount(usize),
    #[error("field {index} is not an integer: {value:?}")]
    NotAnInteger { index: usize, value: String },
}

impl Record {
    pub fn coord(&self) -> GridCoord {
        GridCoord::new(self.row, self.col)
    }

    pub fn is_valid(&self) -> bool {
        self.distance_mm > 0 && self.status == 0
    }

    /// Decodes a `row,target_index,col,distance_mm,status,signal,ambient` line.
    ///
    /// Returns `None` for anything malformed; sensor noise is expected and is
    /// never reported as an error.
    pub fn parse_line(line: &str) -> Option<Self> {
        match Self::decode(line) {
            Ok(record) => Some(record),
            Err(err) => {
                log::trace!("discarding sensor line {:?}: {}", line, err);
                None
            }
        }
    }

    pub(crate) fn decode(line: &str) -> Result<Self, DecodeError> {
        let parts: Vec<&str> = line.trim().split(',').collect();
        if parts.len() < FIELD_COUNT {
            return Err(DecodeError::FieldCount(parts.len()));
        }

        let mut fields = [0i32; FIELD_COUNT];
        for (index, (slot, raw)) in fields.iter_mut().zip(&parts).enumerate() {
            *slot = raw
                .trim()
                .parse()
                .map_err(|_| DecodeError::NotAnInteger {
                    index,
                    value: raw.to_string(),
                })?;
        }

        let [row, target_index, col, distance_mm, status, signal, ambient] = fields;
        Ok(Self {
            row,
            target_index,
            col,
            distance_mm,
            status,
            signal,
            ambient,
        })
    }

    /// Encodes the record back into wire order, without the trailing newline.
    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{},{}",
            self.row,
            self.target_index,
            self.col,
            self.distance_mm,
            self.status,
            self.signal,
            self.ambient
        )
    }
}
