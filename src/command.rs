//! Wire-level instruction construction for Marlin-family firmware.
//!
//! Every command string the tool ever sends is built here, so the G-code
//! surface stays in one place. Instructions are ASCII lines; the transport
//! appends [`WIRE_TERMINATOR`] on write.

use std::fmt;

/// Terminator appended to every instruction line. The trailing space keeps
/// the firmware's line reassembly from gluing a command to the CR/LF.
pub const WIRE_TERMINATOR: &str = " \r\n";

/// Feed rate for vertical test moves, mm/min.
pub const TRAVEL_FEED_RATE: u32 = 4800;

/// Feed rate for the slow centering move, mm/min.
pub const CENTERING_FEED_RATE: u32 = 1000;

/// Bed center coordinates in millimeters (220 mm square bed).
pub const BED_CENTER_X_MM: u32 = 110;
pub const BED_CENTER_Y_MM: u32 = 110;

/// Height the nozzle is raised to before re-testing an offset, mm.
pub const RAISE_HEIGHT_MM: f64 = 10.0;

/// One ASCII instruction bound for the firmware's command queue.
///
/// Ephemeral: built, written, dropped. Offsets and heights are rounded to
/// two decimal places before they are embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command(String);

impl Command {
    /// Instruction text without the wire terminator.
    pub fn text(&self) -> &str {
        &self.0
    }

    /// Set the bed heater target, non-blocking (`M140`).
    pub fn set_bed_target(celsius: f64) -> Self {
        Self(format!("M140 S{celsius}"))
    }

    /// Set the extruder heater target, non-blocking (`M104`).
    pub fn set_extruder_target(celsius: f64) -> Self {
        Self(format!("M104 S{celsius}"))
    }

    /// Toggle periodic temperature reports (`M155`).
    pub fn report_temperatures(on: bool) -> Self {
        Self(format!("M155 S{}", u8::from(on)))
    }

    /// Toggle software travel limits (`M211`).
    pub fn soft_endstops(on: bool) -> Self {
        Self(format!("M211 S{}", u8::from(on)))
    }

    /// Home all axes (`G28`).
    pub fn home_all() -> Self {
        Self("G28".to_string())
    }

    /// Query the persisted probe offset (`M851` bare).
    pub fn query_probe_offset() -> Self {
        Self("M851".to_string())
    }

    /// Set the probe offset from a measured value (`M851 Z`).
    pub fn set_probe_offset(offset: f64) -> Self {
        Self(format!("M851 Z{offset:.2}"))
    }

    /// Set the probe offset from text captured off the wire, unmodified.
    /// Used by the abort path so the restored value is byte-for-byte what
    /// the firmware originally reported.
    pub fn restore_probe_offset(raw: &str) -> Self {
        Self(format!("M851 Z{raw}"))
    }

    /// Persist settings to non-volatile storage (`M500`).
    pub fn persist_settings() -> Self {
        Self("M500".to_string())
    }

    /// Declare the current position as Z = 0 (`G92`).
    pub fn zero_z_reference() -> Self {
        Self("G92 Z0".to_string())
    }

    /// Slow move to bed center (`G1`).
    pub fn center_nozzle() -> Self {
        Self(format!(
            "G1 X{BED_CENTER_X_MM} Y{BED_CENTER_Y_MM} F{CENTERING_FEED_RATE}"
        ))
    }

    /// Vertical move to an absolute height (`G0`).
    pub fn move_z(height: f64) -> Self {
        Self(format!("G0 Z{height:.2} F{TRAVEL_FEED_RATE}"))
    }

    /// Block queue processing until motion finishes (`M400`).
    pub fn finish_moves() -> Self {
        Self("M400".to_string())
    }

    /// Print-time query (`M31`). Inert; used as queue padding and as the
    /// discovery probe, and its echo marks a drained move queue.
    pub fn print_time_query() -> Self {
        Self("M31".to_string())
    }

    /// Firmware identity query (`M115`).
    pub fn firmware_info() -> Self {
        Self("M115".to_string())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_terminator_shape() {
        assert_eq!(WIRE_TERMINATOR, " \r\n");
    }

    #[test]
    fn test_heater_targets_render_whole_degrees_bare() {
        assert_eq!(Command::set_bed_target(60.0).text(), "M140 S60");
        assert_eq!(Command::set_extruder_target(205.0).text(), "M104 S205");
        assert_eq!(Command::set_bed_target(62.5).text(), "M140 S62.5");
    }

    #[test]
    fn test_offset_commands_round_to_two_decimals() {
        assert_eq!(Command::set_probe_offset(-2.5).text(), "M851 Z-2.50");
        assert_eq!(Command::set_probe_offset(-2.556).text(), "M851 Z-2.56");
        assert_eq!(Command::move_z(10.0).text(), "G0 Z10.00 F4800");
        assert_eq!(Command::move_z(-1.899).text(), "G0 Z-1.90 F4800");
    }

    #[test]
    fn test_restore_passes_raw_text_through() {
        assert_eq!(Command::restore_probe_offset("-2.5").text(), "M851 Z-2.5");
        assert_eq!(Command::restore_probe_offset("1.80").text(), "M851 Z1.80");
    }

    #[test]
    fn test_toggles() {
        assert_eq!(Command::report_temperatures(true).text(), "M155 S1");
        assert_eq!(Command::report_temperatures(false).text(), "M155 S0");
        assert_eq!(Command::soft_endstops(true).text(), "M211 S1");
        assert_eq!(Command::soft_endstops(false).text(), "M211 S0");
    }

    #[test]
    fn test_center_move_uses_slow_feed_rate() {
        assert_eq!(Command::center_nozzle().text(), "G1 X110 Y110 F1000");
    }
}
