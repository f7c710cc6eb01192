use std::sync::{Arc, Mutex};
use std::time::Duration;

use tofcore::actuator::ActuatorChannel;
use tofcore::detection::{DetectionConfig, DetectionEngine};
use tofcore::frame::{spawn_frame_writer, FrameStore};
use tofcore::link::{SensorConnector, SensorStream};
use tofcore::prelude::{GridCoord, LinkError, LinkResult, GRID_CELLS};
use tofcore::sensor::{ParserConfig, StreamParser};
use tokio::io::{AsyncWriteExt, DuplexStream};

struct PipeConnector(Mutex<Option<DuplexStream>>);

impl SensorConnector for PipeConnector {
    fn describe(&self) -> String {
        "pipe".into()
    }

    fn connect(&self) -> LinkResult<SensorStream> {
        let stream = self.0.lock().unwrap().take().ok_or(LinkError::PortUnavailable {
            port: "pipe".into(),
            reason: "taken".into(),
        })?;
        Ok(Box::new(stream))
    }
}

async fn wait_for_distance(live: &FrameStore, coord: GridCoord, distance_mm: i32) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while live.get(coord).map(|r| r.distance_mm) != Some(distance_mm) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("record never reached the live frame");
}

#[tokio::test]
async fn sensor_lines_drive_exactly_one_fire_command() {
    let (mut sensor, parser_side) = tokio::io::duplex(8 * 1024);
    let parser = StreamParser::new(
        PipeConnector(Mutex::new(Some(parser_side))),
        ParserConfig { read_timeout_ms: 20 },
    );
    let live = Arc::new(FrameStore::new());
    let writer = spawn_frame_writer(parser.subscribe(), live.clone());
    parser.start().unwrap();

    let mut sweep = String::new();
    for coord in GridCoord::grid() {
        sweep.push_str(&format!("{},0,{},700,0,10,5\n", coord.row, coord.col));
    }
    sensor.write_all(sweep.as_bytes()).await.unwrap();

    tokio::time::timeout(
        Duration::from_secs(2),
        live.wait_for_coverage(GRID_CELLS, Duration::from_millis(5)),
    )
    .await
    .expect("live frame never reached full coverage");
    let baseline = live.snapshot();
    assert_eq!(baseline.coverage(), GRID_CELLS);

    let cell = GridCoord::new(0, 1);
    sensor.write_all(b"0,0,1,500,0,10,5\n").await.unwrap();
    wait_for_distance(&live, cell, 500).await;

    let actuator = ActuatorChannel::from_writer("buffer", Vec::<u8>::new());
    let mut engine = DetectionEngine::new(DetectionConfig::default(), actuator);
    let report = engine.scan(&*live, &baseline).await;
    assert_eq!(report.acquired, vec![cell]);

    sensor.write_all(b"0,0,1,500,0,10,5\n").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let repeat = engine.scan(&*live, &baseline).await;
    assert!(repeat.is_quiet());

    assert_eq!(engine.sink().writer().unwrap().as_slice(), b"FIRE01\n");
    assert_eq!(baseline.get(cell).map(|r| r.distance_mm), Some(700));

    parser.shutdown().await;
    drop(parser);
    writer.await.unwrap();
}
