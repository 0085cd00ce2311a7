//! Serial-port transport.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use serialport::SerialPort;
use tracing::trace;

use super::{Transport, TransportError, TransportResult};
use crate::command::WIRE_TERMINATOR;

/// Line-oriented transport over a serial port.
///
/// Bytes that arrive after a line's newline are kept in `pending` for the
/// next read, so a burst of responses is never dropped.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    pending: Vec<u8>,
    deadline: Duration,
}

impl SerialTransport {
    /// Open `path` at `baud` with the given read deadline.
    pub fn open(path: &str, baud: u32, deadline: Duration) -> TransportResult<Self> {
        let port = serialport::new(path, baud).timeout(deadline).open()?;
        Ok(Self {
            port,
            pending: Vec::new(),
            deadline,
        })
    }

    /// Pop one complete line out of the pending buffer, if present.
    fn take_pending_line(&mut self) -> Option<String> {
        let newline = self.pending.iter().position(|&byte| byte == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=newline).collect();
        let text = String::from_utf8_lossy(&line);
        Some(text.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl Transport for SerialTransport {
    fn write_line(&mut self, line: &str) -> TransportResult<()> {
        let mut framed = String::with_capacity(line.len() + WIRE_TERMINATOR.len());
        framed.push_str(line);
        framed.push_str(WIRE_TERMINATOR);
        self.port.write_all(framed.as_bytes())?;
        self.port.flush()?;
        trace!(command = line, "wrote line");
        Ok(())
    }

    fn read_line(&mut self) -> TransportResult<String> {
        let started = Instant::now();
        loop {
            if let Some(line) = self.take_pending_line() {
                trace!(line = line.as_str(), "read line");
                return Ok(line);
            }
            // The whole line is bounded by one deadline, not each chunk, so
            // a trickling peer cannot stretch the wait indefinitely.
            if started.elapsed() >= self.deadline {
                return Err(TransportError::TimedOut {
                    deadline: self.deadline,
                });
            }
            let mut chunk = [0u8; 64];
            match self.port.read(&mut chunk) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    return Err(TransportError::TimedOut {
                        deadline: self.deadline,
                    })
                }
                Err(e) => return Err(TransportError::Io(e)),
            }
        }
    }

    fn set_read_deadline(&mut self, deadline: Duration) -> TransportResult<()> {
        self.port.set_timeout(deadline)?;
        self.deadline = deadline;
        Ok(())
    }

    fn read_deadline(&self) -> Duration {
        self.deadline
    }
}
