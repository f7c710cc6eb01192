use crate::generator::SimulationConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tofcore::detection::DetectionConfig;
use tofcore::link::SerialLink;
use tofcore::prelude::{GridCoord, GRID_CELLS};
use tofcore::sensor::ParserConfig;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefenderConfig {
    pub sensor: SerialLink,
    pub actuator: SerialLink,
    pub threshold_mm: i32,
    pub scan_period_ms: u64,
    pub coverage_cells: usize,
    pub read_timeout_ms: u64,
    pub coverage_poll_ms: u64,
    pub report_interval_ms: u64,
    /// Longest a single fire command may take to reach the actuator.
    pub send_timeout_ms: u64,
    /// Cell whose live distance is logged with every report.
    pub probe: Option<GridCoord>,
    pub simulate: bool,
    pub simulation: SimulationConfig,
}

impl Default for DefenderConfig {
    fn default() -> Self {
        Self {
            sensor: SerialLink::new("COM6", 460_800),
            actuator: SerialLink::new("COM7", 115_200),
            threshold_mm: 150,
            scan_period_ms: 100,
            coverage_cells: GRID_CELLS,
            read_timeout_ms: 1000,
            coverage_poll_ms: 50,
            report_interval_ms: 1000,
            send_timeout_ms: 1000,
            probe: None,
            simulate: false,
            simulation: SimulationConfig::default(),
        }
    }
}

impl DefenderConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading defender config {}", path_ref.display()))?;
        let config: DefenderConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing defender config {}", path_ref.display()))?;
        config
            .validate()
            .with_context(|| format!("checking defender config {}", path_ref.display()))?;
        Ok(config)
    }

    /// Rejects settings the run could never satisfy.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            (1..=GRID_CELLS).contains(&self.coverage_cells),
            "coverage_cells must be between 1 and {}, got {}",
            GRID_CELLS,
            self.coverage_cells
        );
        Ok(())
    }

    pub fn to_parser_config(&self) -> ParserConfig {
        ParserConfig {
            read_timeout_ms: self.read_timeout_ms,
        }
    }

    pub fn to_detection_config(&self) -> DetectionConfig {
        DetectionConfig {
            threshold_mm: self.threshold_mm,
            scan_period_ms: self.scan_period_ms,
        }
    }

    pub fn coverage_poll(&self) -> Duration {
        Duration::from_millis(self.coverage_poll_ms.max(1))
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms.max(1))
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms.max(1))
    }
}

/// Parses a `row,col` pair such as `0,1`.
pub fn parse_cell(value: &str) -> Result<GridCoord, String> {
    let (row, col) = value
        .split_once(',')
        .ok_or_else(|| format!("expected ROW,COL but got {:?}", value))?;
    let row = row
        .trim()
        .parse()
        .map_err(|_| format!("invalid row in {:?}", value))?;
    let col = col
        .trim()
        .parse()
        .map_err(|_| format!("invalid column in {:?}", value))?;
    Ok(GridCoord::new(row, col))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_the_hardware_setup() {
        let cfg = DefenderConfig::default();
        assert_eq!(cfg.sensor, SerialLink::new("COM6", 460_800));
        assert_eq!(cfg.to_detection_config(), DetectionConfig::default());
        assert_eq!(cfg.to_parser_config().read_timeout_ms, 1000);
        assert_eq!(cfg.coverage_cells, 64);
    }

    #[test]
    fn config_load_reads_yaml_with_defaults() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"sensor:\n  port: /dev/ttyACM0\n  baud: 921600\nthreshold_mm: 200\nprobe:\n  row: 0\n  col: 1\nsimulation:\n  seed: 9\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = DefenderConfig::load(&path).unwrap();

        assert_eq!(cfg.sensor.port, "/dev/ttyACM0");
        assert_eq!(cfg.sensor.baud, 921_600);
        assert_eq!(cfg.actuator.port, "COM7");
        assert_eq!(cfg.threshold_mm, 200);
        assert_eq!(cfg.scan_period_ms, 100);
        assert_eq!(cfg.probe, Some(GridCoord::new(0, 1)));
        assert_eq!(cfg.simulation.seed, 9);
        assert_eq!(cfg.simulation.ceiling_mm, 2400);
    }

    #[test]
    fn config_load_reports_the_path_on_error() {
        let err = DefenderConfig::load("/nonexistent/defender.yaml").unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/defender.yaml"));
    }

    #[test]
    fn coverage_beyond_the_grid_is_rejected() {
        assert!(DefenderConfig::default().validate().is_ok());

        for coverage_cells in [0, GRID_CELLS + 1] {
            let cfg = DefenderConfig {
                coverage_cells,
                ..Default::default()
            };
            let err = cfg.validate().unwrap_err();
            assert!(err.to_string().contains("coverage_cells"), "{err}");
        }

        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"coverage_cells: 100\n").unwrap();
        let path = temp.into_temp_path();
        let err = DefenderConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("between 1 and 64"), "{err:#}");
    }

    #[test]
    fn parse_cell_accepts_row_col_pairs() {
        assert_eq!(parse_cell("0,1"), Ok(GridCoord::new(0, 1)));
        assert_eq!(parse_cell(" 7 , 3 "), Ok(GridCoord::new(7, 3)));
        assert!(parse_cell("7").is_err());
        assert!(parse_cell("a,1").is_err());
    }
}
