//! Interactive Z-probe offset calibration for Marlin-family printers.
//!
//! Speaks the firmware's line-oriented serial protocol: pick a port, pin
//! down the telemetry dialect, preheat, home, and walk the operator through
//! paper-drag test moves until the offset is right, then persist it to the
//! device. A quit at any point of the interactive phase puts back the
//! offset the printer started the session with.

pub mod command;
pub mod config;
pub mod detect;
pub mod dialect;
pub mod error;
pub mod machine;
pub mod operator;
pub mod sequencer;
pub mod session;
pub mod telemetry;
pub mod transport;

pub use command::Command;
pub use config::CalibrationConfig;
pub use dialect::FirmwareDialect;
pub use error::{CalibrationError, CalibrationResult};
pub use machine::{CalibrationMachine, CalibrationState, Outcome};
pub use sequencer::{CommandSequencer, SequencerTiming};
pub use session::CalibrationSession;
pub use telemetry::TelemetryReading;
pub use transport::{SerialTransport, Transport};
