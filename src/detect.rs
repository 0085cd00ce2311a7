//! Printer discovery and firmware identification.
//!
//! Discovery walks the machine's serial ports, pokes each candidate with an
//! inert query, and accepts the first one that answers like a printer.
//! Identification runs after the link is up and decides which
//! [`FirmwareDialect`] the rest of the session speaks.

use std::time::Duration;

use tracing::{info, warn};

use crate::command::Command;
use crate::dialect::FirmwareDialect;
use crate::error::{CalibrationError, CalibrationResult};
use crate::sequencer::CommandSequencer;
use crate::telemetry::{TelemetryReading, PRINT_TIME_ECHO_PREFIX};
use crate::transport::{SerialTransport, Transport, TransportError};

/// Read deadline while probing a candidate port. Long enough for a printer
/// mid-reset, short enough that a wall of dead ports stays bearable.
const PROBE_DEADLINE: Duration = Duration::from_secs(3);

/// Whether a response line identifies a printer: a temperature field from
/// streaming telemetry, or the echo the probe query itself provokes.
fn is_printer_response(line: &str) -> bool {
    line.contains("T:") || line.starts_with(PRINT_TIME_ECHO_PREFIX)
}

/// Write the probe query and judge the first response line. A silent or
/// unreadable candidate is not a printer.
fn probe_transport<T: Transport>(transport: &mut T) -> bool {
    if transport
        .write_line(Command::print_time_query().text())
        .is_err()
    {
        return false;
    }
    match transport.read_line() {
        Ok(line) => is_printer_response(&line),
        Err(_) => false,
    }
}

/// Enumerate serial ports and return the name of the first one a printer
/// answers on. Candidates that cannot be opened (typically held by another
/// program) are reported and skipped; running out of candidates is
/// [`CalibrationError::NoDeviceFound`].
pub fn find_printer_port(baud: u32) -> CalibrationResult<String> {
    let candidates = serialport::available_ports().map_err(TransportError::from)?;
    info!(count = candidates.len(), "searching serial ports");
    for candidate in candidates {
        let name = candidate.port_name;
        let mut transport = match SerialTransport::open(&name, baud, PROBE_DEADLINE) {
            Ok(transport) => transport,
            Err(error) => {
                let skipped = CalibrationError::PortUnavailable {
                    port: name.clone(),
                    reason: error.to_string(),
                };
                warn!("{skipped}");
                continue;
            }
        };
        if probe_transport(&mut transport) {
            info!(port = name.as_str(), "printer answered");
            return Ok(name);
        }
    }
    Err(CalibrationError::NoDeviceFound)
}

/// Ask the firmware to identify itself and fix the sequencer's dialect for
/// the rest of the session. `pinned` bypasses version-based selection.
/// Firmware that answers the identity query without a recognizable report
/// predates the modern protocol and is treated as legacy.
pub fn probe_firmware<T: Transport>(
    sequencer: &mut CommandSequencer<T>,
    pinned: Option<FirmwareDialect>,
) -> CalibrationResult<FirmwareDialect> {
    let readings = sequencer.run_sync(&Command::firmware_info())?;
    let identity = readings.into_iter().rev().find_map(|reading| match reading {
        TelemetryReading::FirmwareIdentity { name, version } => Some((name, version)),
        _ => None,
    });
    let detected = match &identity {
        Some((name, version)) => {
            info!(
                firmware = name.as_str(),
                version = version.as_str(),
                "firmware identified"
            );
            FirmwareDialect::from_version(version)
        }
        None => {
            warn!("firmware did not identify itself, assuming the legacy dialect");
            FirmwareDialect::Legacy
        }
    };
    let dialect = pinned.unwrap_or(detected);
    sequencer.set_dialect(dialect);
    Ok(dialect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::SequencerTiming;
    use crate::transport::MockTransport;

    #[test]
    fn test_printer_response_shapes() {
        assert!(is_printer_response("T:21.33 /0.00 B:21.85 /0.00 @:0 B@:0"));
        assert!(is_printer_response("echo:Print time: 0m 0s"));
        assert!(!is_printer_response("ok"));
        assert!(!is_printer_response("start"));
        assert!(!is_printer_response(""));
    }

    #[test]
    fn test_probe_writes_the_query_and_accepts_an_echo() {
        let mut transport = MockTransport::new().with_lines(["echo:Print time: 0m 0s"]);
        assert!(probe_transport(&mut transport));
        assert_eq!(transport.writes(), ["M31".to_string()]);
    }

    #[test]
    fn test_probe_rejects_a_silent_candidate() {
        let mut transport = MockTransport::new();
        assert!(!probe_transport(&mut transport));
    }

    #[test]
    fn test_probe_rejects_an_unrelated_first_line() {
        let mut transport = MockTransport::new().with_lines(["start"]);
        assert!(!probe_transport(&mut transport));
    }

    fn identify(lines: &[&str], pinned: Option<FirmwareDialect>) -> FirmwareDialect {
        // The probe runs before the dialect is known, under the provisional
        // modern padding of five acknowledgements.
        let mut sequencer = CommandSequencer::new(
            MockTransport::new().with_lines(lines.iter().copied()),
            FirmwareDialect::Modern,
        )
        .with_timing(SequencerTiming::immediate());
        let dialect = probe_firmware(&mut sequencer, pinned).unwrap();
        assert_eq!(sequencer.dialect(), dialect);
        dialect
    }

    #[test]
    fn test_modern_version_selects_modern() {
        let dialect = identify(
            &[
                "FIRMWARE_NAME:Marlin 2.1.2 (Jun 18 2023) SOURCE_CODE_URL:github.com/Marlin",
                "ok",
                "ok",
                "ok",
                "ok",
                "ok",
            ],
            None,
        );
        assert_eq!(dialect, FirmwareDialect::Modern);
    }

    #[test]
    fn test_old_version_selects_legacy() {
        let dialect = identify(
            &["FIRMWARE_NAME:Marlin 1.1.9", "ok", "ok", "ok", "ok", "ok"],
            None,
        );
        assert_eq!(dialect, FirmwareDialect::Legacy);
    }

    #[test]
    fn test_missing_identity_selects_legacy() {
        let dialect = identify(&["ok", "ok", "ok", "ok", "ok"], None);
        assert_eq!(dialect, FirmwareDialect::Legacy);
    }

    #[test]
    fn test_last_identity_report_wins() {
        let dialect = identify(
            &[
                "FIRMWARE_NAME:Marlin 1.1.9",
                "FIRMWARE_NAME:Marlin 2.1.2",
                "ok",
                "ok",
                "ok",
                "ok",
                "ok",
            ],
            None,
        );
        assert_eq!(dialect, FirmwareDialect::Modern);
    }

    #[test]
    fn test_pinned_dialect_overrides_detection() {
        let dialect = identify(
            &["FIRMWARE_NAME:Marlin 2.1.2", "ok", "ok", "ok", "ok", "ok"],
            Some(FirmwareDialect::Legacy),
        );
        assert_eq!(dialect, FirmwareDialect::Legacy);
    }
}
