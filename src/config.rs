//! Session configuration, one JSON document:
//!
//! ```json
//! {
//!   "temps": { "bed": 60.0, "extruder": 205.0 },
//!   "offset": { "initial": -2.0, "increment": 0.1 },
//!   "port": "/dev/ttyUSB0"
//! }
//! ```
//!
//! `port` is optional; omitting it hands port selection to discovery.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CalibrationError, CalibrationResult};

/// Heater targets in degrees Celsius.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaterTargets {
    /// Bed target; measure at printing temperature or the plate's thermal
    /// expansion skews the result.
    pub bed: f64,
    /// Extruder target; must be hot enough to clear hardened ooze off the
    /// nozzle tip.
    pub extruder: f64,
}

/// Probe offset starting point and adjustment step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffsetSettings {
    /// Offset the first test move descends to, in millimeters.
    pub initial: f64,
    /// Millimeters added or removed per adjustment keypress.
    pub increment: f64,
}

/// On-disk configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Heater targets.
    pub temps: HeaterTargets,
    /// Offset seed and step.
    pub offset: OffsetSettings,
    /// Serial port to calibrate on, bypassing discovery.
    #[serde(default)]
    pub port: Option<String>,
}

impl CalibrationConfig {
    /// Load and validate a configuration document.
    pub fn load(path: &Path) -> CalibrationResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| CalibrationError::Config(format!("{}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| CalibrationError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the firmware would otherwise act on. Runs before any
    /// port is touched.
    fn validate(&self) -> CalibrationResult<()> {
        if self.temps.bed < 0.0 || self.temps.extruder < 0.0 {
            return Err(CalibrationError::Config(
                "heater targets must be non-negative".to_string(),
            ));
        }
        if self.offset.increment <= 0.0 {
            return Err(CalibrationError::Config(
                "offset.increment must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_loads_a_full_document() {
        let path = write_temp(
            "zoffset_config_full.json",
            r#"{
                "temps": { "bed": 60.0, "extruder": 205.0 },
                "offset": { "initial": -2.0, "increment": 0.1 },
                "port": "/dev/ttyUSB0"
            }"#,
        );
        let config = CalibrationConfig::load(&path).unwrap();
        assert_eq!(config.temps.bed, 60.0);
        assert_eq!(config.temps.extruder, 205.0);
        assert_eq!(config.offset.initial, -2.0);
        assert_eq!(config.offset.increment, 0.1);
        assert_eq!(config.port.as_deref(), Some("/dev/ttyUSB0"));
    }

    #[test]
    fn test_port_may_be_omitted() {
        let path = write_temp(
            "zoffset_config_no_port.json",
            r#"{"temps":{"bed":0.0,"extruder":0.0},"offset":{"initial":0.0,"increment":0.01}}"#,
        );
        let config = CalibrationConfig::load(&path).unwrap();
        assert!(config.port.is_none());
    }

    #[test]
    fn test_missing_file_is_a_config_error() {
        let err = CalibrationConfig::load(Path::new("/nonexistent/zoffset.json")).unwrap_err();
        assert!(matches!(err, CalibrationError::Config(_)));
    }

    #[test]
    fn test_malformed_json_is_a_config_error() {
        let path = write_temp("zoffset_config_bad.json", "{ not json");
        let err = CalibrationConfig::load(&path).unwrap_err();
        assert!(matches!(err, CalibrationError::Config(_)));
    }

    #[test]
    fn test_negative_heater_target_rejected() {
        let path = write_temp(
            "zoffset_config_cold.json",
            r#"{"temps":{"bed":-5.0,"extruder":205.0},"offset":{"initial":-2.0,"increment":0.1}}"#,
        );
        let err = CalibrationConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("non-negative"));
    }

    #[test]
    fn test_nonpositive_increment_rejected() {
        let path = write_temp(
            "zoffset_config_step.json",
            r#"{"temps":{"bed":60.0,"extruder":205.0},"offset":{"initial":-2.0,"increment":0.0}}"#,
        );
        let err = CalibrationConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("increment"));
    }
}
