use crate::frame::store::FrameStore;
use crate::sensor::{EventReceiver, ParserEvent};
use log::{debug, warn};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Drains parser events into the live frame.
///
/// This task is the only writer of `live`. It ends when the parser and every
/// other sender of `events` are gone.
pub fn spawn_frame_writer(mut events: EventReceiver, live: Arc<FrameStore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ParserEvent::Record(record) => live.set(record.coord(), record),
                ParserEvent::IoError(message) => warn!("sensor link error: {}", message),
            }
        }
        debug!("frame writer finished");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::GridCoord;
    use crate::sensor::Record;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn records_land_in_the_live_frame() {
        let (tx, rx) = mpsc::unbounded_channel();
        let live = Arc::new(FrameStore::new());
        let writer = spawn_frame_writer(rx, live.clone());

        for line in ["0,0,1,500,0,10,5", "0,0,1,450,0,10,5", "3,0,2,900,0,10,5"] {
            let record = Record::parse_line(line).unwrap();
            tx.send(ParserEvent::Record(record)).unwrap();
        }
        tx.send(ParserEvent::IoError("Error: framing".to_string())).unwrap();
        drop(tx);
        writer.await.unwrap();

        assert_eq!(live.len(), 2);
        assert_eq!(live.get(GridCoord::new(0, 1)).map(|r| r.distance_mm), Some(450));
        assert_eq!(live.get(GridCoord::new(3, 2)).map(|r| r.distance_mm), Some(900));
    }
}
