//! Duplex line channel to the firmware.
//!
//! The firmware speaks newline-terminated ASCII both ways. The trait keeps
//! the calibration logic off the serial port so tests can script the
//! conversation; reads carry a deadline instead of busy-polling "is data
//! waiting".

use std::time::Duration;

use thiserror::Error;

pub mod mock;
pub mod serial;

pub use mock::MockTransport;
pub use serial::SerialTransport;

/// Transport-level failures.
#[derive(Error, Debug)]
pub enum TransportError {
    /// No complete line arrived before the read deadline.
    #[error("no line within the {deadline:?} read deadline")]
    TimedOut {
        /// Deadline that expired.
        deadline: Duration,
    },

    /// The peer closed the channel.
    #[error("channel closed by peer")]
    Closed,

    /// Underlying byte-level I/O failure.
    #[error("transport I/O: {0}")]
    Io(#[from] std::io::Error),

    /// Serial-layer failure (enumeration, open, or reconfiguration).
    #[error("serial port: {0}")]
    Serial(#[from] serialport::Error),
}

/// Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Byte-oriented duplex channel with line-buffered reads and a read
/// deadline.
pub trait Transport {
    /// Write one instruction line. The implementation appends the wire
    /// terminator (see [`crate::command::WIRE_TERMINATOR`]).
    fn write_line(&mut self, line: &str) -> TransportResult<()>;

    /// Read one response line, stripped of trailing CR/LF. Returns
    /// [`TransportError::TimedOut`] if no complete line arrives within the
    /// read deadline.
    fn read_line(&mut self) -> TransportResult<String>;

    /// Replace the read deadline for subsequent reads.
    fn set_read_deadline(&mut self, deadline: Duration) -> TransportResult<()>;

    /// Currently configured read deadline.
    fn read_deadline(&self) -> Duration;
}
