pub mod store;
pub mod writer;

pub use store::{CellSource, Frame, FrameStore};
pub use writer::spawn_frame_writer;
