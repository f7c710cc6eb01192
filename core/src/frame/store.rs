use crate::prelude::GridCoord;
use crate::sensor::Record;
use dashmap::DashMap;
use log::debug;
use std::collections::HashMap;
use std::time::Duration;

/// Read access to the latest record per grid cell.
pub trait CellSource {
    fn cell(&self, coord: GridCoord) -> Option<Record>;
}

/// Immutable copy of a frame, used as the baseline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    cells: HashMap<GridCoord, Record>,
}

impl Frame {
    /// Builds a frame from records in arrival order; later records win.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let cells = records
            .into_iter()
            .map(|record| (record.coord(), record))
            .collect();
        Self { cells }
    }

    pub fn get(&self, coord: GridCoord) -> Option<&Record> {
        self.cells.get(&coord)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of distinct in-grid cells present.
    pub fn coverage(&self) -> usize {
        self.cells.keys().filter(|coord| coord.in_grid()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GridCoord, &Record)> {
        self.cells.iter()
    }
}

impl CellSource for Frame {
    fn cell(&self, coord: GridCoord) -> Option<Record> {
        self.cells.get(&coord).copied()
    }
}

/// Concurrent last-write-wins store keyed by grid coordinate.
///
/// Backed by a sharded map so writes to one cell never serialize reads of
/// unrelated cells. Only the frame writer is expected to call [`FrameStore::set`];
/// that single-writer discipline is a caller contract.
#[derive(Debug, Default)]
pub struct FrameStore {
    cells: DashMap<GridCoord, Record>,
}

impl FrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, coord: GridCoord, record: Record) {
        self.cells.insert(coord, record);
    }

    pub fn get(&self, coord: GridCoord) -> Option<Record> {
        self.cells.get(&coord).map(|entry| *entry.value())
    }

    /// Number of distinct keys, including any outside the grid.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of distinct in-grid cells that have reported at least once.
    pub fn coverage(&self) -> usize {
        self.cells.iter().filter(|entry| entry.key().in_grid()).count()
    }

    pub fn is_fully_covered(&self, required_cells: usize) -> bool {
        self.coverage() >= required_cells
    }

    /// Copies every current entry into an independent [`Frame`].
    ///
    /// Keys are never removed, so once coverage holds the copy contains every
    /// covered cell; values of individual cells may be from slightly different
    /// sweeps.
    pub fn snapshot(&self) -> Frame {
        let cells = self
            .cells
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        Frame { cells }
    }

    /// Polls until `required_cells` distinct in-grid cells have reported.
    pub async fn wait_for_coverage(&self, required_cells: usize, poll_interval: Duration) {
        let mut last_seen = usize::MAX;
        loop {
            let covered = self.coverage();
            if covered >= required_cells {
                return;
            }
            if covered != last_seen {
                debug!("frame coverage {}/{}", covered, required_cells);
                last_seen = covered;
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

impl CellSource for FrameStore {
    fn cell(&self, coord: GridCoord) -> Option<Record> {
        self.get(coord)
    }
}
