//! Mutable context of one calibration run.

use crate::config::CalibrationConfig;

/// Adjustment step while fine-tune mode is on, and the floor for the
/// configurable step. Matches the firmware's two-decimal offset resolution.
pub const FINE_INCREMENT: f64 = 0.01;

/// Round to the firmware's two-decimal offset resolution.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Working state of a calibration run: the candidate offset being refined,
/// the step it moves by, and what to restore if the operator walks away.
#[derive(Debug, Clone)]
pub struct CalibrationSession {
    offset: f64,
    increment: f64,
    fine_tune: bool,
    /// Bed target in degrees Celsius.
    pub bed_target: f64,
    /// Extruder target in degrees Celsius.
    pub extruder_target: f64,
    /// Offset text exactly as the firmware reported it at session start.
    /// Written back verbatim on abort so a failed session changes nothing.
    pub previous_offset_raw: Option<String>,
}

impl CalibrationSession {
    /// Seed a session from the configuration document.
    pub fn from_config(config: &CalibrationConfig) -> Self {
        Self {
            offset: round2(config.offset.initial),
            increment: round2(config.offset.increment).max(FINE_INCREMENT),
            fine_tune: false,
            bed_target: config.temps.bed,
            extruder_target: config.temps.extruder,
            previous_offset_raw: None,
        }
    }

    /// Candidate offset, always at two-decimal resolution.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Replace the candidate offset.
    pub fn set_offset(&mut self, value: f64) {
        self.offset = round2(value);
    }

    /// Move the candidate offset by `steps` effective increments.
    pub fn adjust_offset(&mut self, steps: f64) {
        self.offset = round2(self.offset + steps * self.effective_increment());
    }

    /// Candidate offset as the operator and the firmware see it.
    pub fn offset_text(&self) -> String {
        format!("{:.2}", self.offset)
    }

    /// Configured adjustment step.
    pub fn increment(&self) -> f64 {
        self.increment
    }

    /// Step applied per adjustment: the fine step when fine-tune mode is
    /// on, the configured increment otherwise.
    pub fn effective_increment(&self) -> f64 {
        if self.fine_tune {
            FINE_INCREMENT
        } else {
            self.increment
        }
    }

    /// Flip fine-tune mode; returns the new setting.
    pub fn toggle_fine_tune(&mut self) -> bool {
        self.fine_tune = !self.fine_tune;
        self.fine_tune
    }

    /// Move the configured increment by `steps` fine steps, never below
    /// the fine step itself.
    pub fn adjust_increment(&mut self, steps: f64) {
        self.increment = round2(self.increment + steps * FINE_INCREMENT).max(FINE_INCREMENT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HeaterTargets, OffsetSettings};

    fn config() -> CalibrationConfig {
        CalibrationConfig {
            temps: HeaterTargets {
                bed: 60.0,
                extruder: 205.0,
            },
            offset: OffsetSettings {
                initial: -2.0,
                increment: 0.1,
            },
            port: None,
        }
    }

    #[test]
    fn test_round2_snaps_to_two_decimals() {
        assert_eq!(round2(-2.123456), -2.12);
        assert_eq!(round2(-2.119), -2.12);
        assert_eq!(round2(3.0), 3.0);
        assert_eq!(round2(0.1 + 0.2), 0.3);
    }

    #[test]
    fn test_seeded_from_config() {
        let session = CalibrationSession::from_config(&config());
        assert_eq!(session.offset(), -2.0);
        assert_eq!(session.increment(), 0.1);
        assert_eq!(session.bed_target, 60.0);
        assert_eq!(session.extruder_target, 205.0);
        assert!(session.previous_offset_raw.is_none());
    }

    #[test]
    fn test_adjustments_stay_on_two_decimal_grid() {
        let mut session = CalibrationSession::from_config(&config());
        session.adjust_offset(-1.0);
        assert_eq!(session.offset(), -2.1);
        session.adjust_offset(-1.0);
        assert_eq!(session.offset(), -2.2);
        session.adjust_offset(1.0);
        assert_eq!(session.offset(), -2.1);
        assert_eq!(session.offset_text(), "-2.10");
    }

    #[test]
    fn test_fine_tune_substitutes_the_fine_step() {
        let mut session = CalibrationSession::from_config(&config());
        assert!(session.toggle_fine_tune());
        session.adjust_offset(-1.0);
        assert_eq!(session.offset(), -2.01);
        assert!(!session.toggle_fine_tune());
        session.adjust_offset(-1.0);
        assert_eq!(session.offset(), -2.11);
    }

    #[test]
    fn test_increment_edits_floor_at_the_fine_step() {
        let mut session = CalibrationSession::from_config(&config());
        session.adjust_increment(1.0);
        assert_eq!(session.increment(), 0.11);
        for _ in 0..20 {
            session.adjust_increment(-1.0);
        }
        assert_eq!(session.increment(), FINE_INCREMENT);
    }

    #[test]
    fn test_set_offset_rounds() {
        let mut session = CalibrationSession::from_config(&config());
        session.set_offset(-2.555_4);
        assert_eq!(session.offset_text(), "-2.56");
    }
}
