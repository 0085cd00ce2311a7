//! Error taxonomy for a calibration session.
//!
//! Discovery failures distinguish a skippable candidate
//! ([`CalibrationError::PortUnavailable`]) from exhaustion
//! ([`CalibrationError::NoDeviceFound`]). A silent firmware is always
//! [`CalibrationError::CommunicationTimeout`] and always fatal: the command
//! queue cannot be unwound once written, so nothing here retries.

use std::time::Duration;

use thiserror::Error;

use crate::transport::TransportError;

/// Errors produced while calibrating.
#[derive(Error, Debug)]
pub enum CalibrationError {
    /// A candidate port exists but could not be opened or probed.
    #[error("port {port} unavailable: {reason}")]
    PortUnavailable {
        /// Port name as enumerated.
        port: String,
        /// Open failure as reported by the serial layer.
        reason: String,
    },

    /// Every candidate port was probed without a printer answering.
    #[error("no printer found on any serial port")]
    NoDeviceFound,

    /// The firmware stopped answering before the expected signal arrived.
    #[error("firmware silent after {waited:?} while awaiting {expected}")]
    CommunicationTimeout {
        /// Time spent waiting.
        waited: Duration,
        /// What the wait was for, for the operator's benefit.
        expected: String,
    },

    /// An offset query was acknowledged without an offset report.
    #[error("offset query returned no probe offset report")]
    MissingOffsetReport,

    /// Transport-level failure other than a deadline.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Terminal or stdout failure while talking to the operator.
    #[error("operator console: {0}")]
    Console(#[from] std::io::Error),

    /// Config document missing, unreadable, or invalid.
    #[error("configuration: {0}")]
    Config(String),
}

/// Result alias used throughout the crate.
pub type CalibrationResult<T> = Result<T, CalibrationError>;
