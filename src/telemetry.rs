//! Classification of firmware response lines.
//!
//! The firmware interleaves acknowledgements, busy notices, periodic
//! heating reports, and query responses on one stream. [`classify`] maps
//! each line to exactly one [`TelemetryReading`]; anything it does not
//! recognize is [`TelemetryReading::Unrecognized`], never an error, so a
//! garbled line can only ever cost itself.

use crate::dialect::FirmwareDialect;

/// Bare acknowledgement token: one queued command fully processed.
pub const ACK_TOKEN: &str = "ok";

/// Prefix of the print-time echo. Marks a drained move queue and doubles
/// as the discovery probe's expected answer.
pub const PRINT_TIME_ECHO_PREFIX: &str = "echo:Print";

/// Prefixes of transient busy notices.
const BUSY_PREFIXES: [&str; 2] = ["echo:busy", "busy:"];

/// Marker token opening a firmware identity line.
const IDENTITY_MARKER: &str = "FIRMWARE_NAME:";

/// Offset report prefixes, one per dialect layout.
const OFFSET_PREFIX_MODERN: &str = "Probe Offset";
const OFFSET_PREFIX_LEGACY: &str = "Probe Z Offset:";

/// One classified firmware response line.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryReading {
    /// Periodic temperature/heater status.
    HeatingReport {
        /// Extruder temperature, Celsius.
        extruder_temp: f64,
        /// Bed temperature, Celsius.
        bed_temp: f64,
        /// Extruder heater drive level, 0-127.
        extruder_heater_level: u8,
        /// Bed heater drive level, 0-127.
        bed_heater_level: u8,
    },
    /// Transient notice: the queue is still executing.
    BusyNotice,
    /// One queued command fully processed.
    Acknowledgement,
    /// Response to a probe offset query.
    ProbeOffsetReport {
        /// Parsed offset, millimeters.
        value: f64,
        /// Numeric text exactly as reported, kept so a restore can send
        /// back what was read.
        raw: String,
    },
    /// Firmware name and version banner.
    FirmwareIdentity { name: String, version: String },
    /// Any line with no known shape. Discarded by callers.
    Unrecognized,
}

/// Classify one response line. Total: every input maps to exactly one
/// reading and malformed input cannot panic.
pub fn classify(line: &str, dialect: FirmwareDialect) -> TelemetryReading {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim() == ACK_TOKEN {
        return TelemetryReading::Acknowledgement;
    }
    if BUSY_PREFIXES.iter().any(|prefix| line.starts_with(prefix)) {
        return TelemetryReading::BusyNotice;
    }
    if let Some(identity) = parse_identity(line) {
        return identity;
    }
    if let Some(report) = parse_offset_report(line, dialect) {
        return report;
    }
    if let Some(report) = parse_heating_report(line) {
        return report;
    }
    TelemetryReading::Unrecognized
}

/// A heating report looks like `T:18.12 /0.00 B:34.11 /0.00 @:0 B@:0`.
/// Fields sit at fixed whitespace-token positions; a line with fewer than
/// four tokens is not a heating report, and a line whose tokens do not
/// carry the expected `key:value` sub-fields is unrecognized.
fn parse_heating_report(line: &str) -> Option<TelemetryReading> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 4 {
        return None;
    }
    let extruder_temp: f64 = subfield(tokens.first()?, "T")?.parse().ok()?;
    let bed_temp: f64 = subfield(tokens.get(2)?, "B")?.parse().ok()?;
    let extruder_heater_level: u8 = subfield(tokens.get(4)?, "@")?.parse().ok()?;
    let bed_heater_level: u8 = subfield(tokens.get(5)?, "B@")?.parse().ok()?;
    Some(TelemetryReading::HeatingReport {
        extruder_temp,
        bed_temp,
        extruder_heater_level,
        bed_heater_level,
    })
}

/// Split a `key:value` token and return the value when the key matches.
fn subfield<'a>(token: &'a str, key: &str) -> Option<&'a str> {
    let (found, value) = token.split_once(':')?;
    (found == key).then_some(value)
}

fn parse_identity(line: &str) -> Option<TelemetryReading> {
    let mut tokens = line.split_whitespace();
    let name = tokens.next()?.strip_prefix(IDENTITY_MARKER)?;
    let version = tokens.next().unwrap_or("");
    Some(TelemetryReading::FirmwareIdentity {
        name: name.to_string(),
        version: version.to_string(),
    })
}

/// The offset report layout is dialect-keyed. Modern firmware writes
/// `Probe Offset X-40.00 Y-10.00 Z-2.55`, where the remainder after the
/// `Z` (sign included) is the value; legacy firmware writes
/// `Probe Z Offset: -2.55`.
fn parse_offset_report(line: &str, dialect: FirmwareDialect) -> Option<TelemetryReading> {
    let raw = match dialect {
        FirmwareDialect::Modern => {
            let rest = line.strip_prefix(OFFSET_PREFIX_MODERN)?;
            let (_, after_z) = rest.split_once('Z')?;
            after_z.split_whitespace().next()?
        }
        FirmwareDialect::Legacy => line
            .strip_prefix(OFFSET_PREFIX_LEGACY)?
            .split_whitespace()
            .next()?,
    };
    let value: f64 = raw.parse().ok()?;
    Some(TelemetryReading::ProbeOffsetReport {
        value,
        raw: raw.to_string(),
    })
}
