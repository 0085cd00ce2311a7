//! Synchronous command execution over the firmware's asynchronous queue.
//!
//! The firmware buffers incoming instructions and drains them in submission
//! order, emitting one acknowledgement per fully processed entry. That makes
//! "has my command finished?" answerable by counting: append a known number
//! of inert queries behind the primary command and wait for exactly one
//! acknowledgement per queue entry. [`CommandSequencer::run_sync`] does the
//! counting; [`CommandSequencer::run_move`] handles motion commands, which
//! on some firmware never acknowledge per-move and must instead be detected
//! by a marker echo or by the queue going quiet.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::command::Command;
use crate::dialect::FirmwareDialect;
use crate::error::{CalibrationError, CalibrationResult};
use crate::telemetry::{classify, TelemetryReading, PRINT_TIME_ECHO_PREFIX};
use crate::transport::{Transport, TransportError};

/// Delay before each write; keeps the firmware's line reassembly ahead of
/// the host.
const INTER_COMMAND_DELAY: Duration = Duration::from_millis(500);

/// Read deadline used while polling for a move to drain.
const MOVE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Quiet time after the last queue activity before a markerless move counts
/// as settled.
const MOVE_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Pacing and settle windows for wire traffic. Tests zero these out;
/// hardware uses [`SequencerTiming::default`].
#[derive(Debug, Clone, Copy)]
pub struct SequencerTiming {
    /// Delay inserted before every write.
    pub inter_command_delay: Duration,
    /// Per-read deadline while waiting for a move to drain.
    pub move_poll_interval: Duration,
    /// Quiet window that ends a markerless move wait.
    pub move_settle_delay: Duration,
}

impl Default for SequencerTiming {
    fn default() -> Self {
        Self {
            inter_command_delay: INTER_COMMAND_DELAY,
            move_poll_interval: MOVE_POLL_INTERVAL,
            move_settle_delay: MOVE_SETTLE_DELAY,
        }
    }
}

impl SequencerTiming {
    /// Zero delays for scripted-transport tests.
    pub fn immediate() -> Self {
        Self {
            inter_command_delay: Duration::ZERO,
            move_poll_interval: Duration::ZERO,
            move_settle_delay: Duration::ZERO,
        }
    }

    /// Consecutive quiet polls that equal the settle window.
    fn settle_polls(&self) -> u32 {
        if self.move_poll_interval.is_zero() {
            return 1;
        }
        let polls = self.move_settle_delay.as_millis() / self.move_poll_interval.as_millis();
        (polls as u32).max(1)
    }
}

/// Issues commands and blocks until the firmware has processed them.
pub struct CommandSequencer<T: Transport> {
    transport: T,
    dialect: FirmwareDialect,
    timing: SequencerTiming,
}

impl<T: Transport> CommandSequencer<T> {
    /// Sequencer over `transport`, initially assuming `dialect` until the
    /// firmware probe fixes it.
    pub fn new(transport: T, dialect: FirmwareDialect) -> Self {
        Self {
            transport,
            dialect,
            timing: SequencerTiming::default(),
        }
    }

    /// Replace the pacing and settle windows.
    pub fn with_timing(mut self, timing: SequencerTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Dialect currently in force.
    pub fn dialect(&self) -> FirmwareDialect {
        self.dialect
    }

    /// Switch dialects once the firmware has been identified.
    pub fn set_dialect(&mut self, dialect: FirmwareDialect) {
        self.dialect = dialect;
    }

    /// Borrow the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn write_paced(&mut self, command: &Command) -> CalibrationResult<()> {
        thread::sleep(self.timing.inter_command_delay);
        self.transport.write_line(command.text())?;
        Ok(())
    }

    /// Write `primary` followed by the dialect's padding of inert queries,
    /// then read until every queue entry has acknowledged. Busy notices and
    /// unrecognized lines are discarded; other readings observed along the
    /// way are returned in arrival order.
    pub fn run_sync(&mut self, primary: &Command) -> CalibrationResult<Vec<TelemetryReading>> {
        let expectation = self.dialect.ack_expectation();
        self.write_paced(primary)?;
        for _ in 0..self.dialect.padding_count() {
            self.write_paced(&Command::print_time_query())?;
        }

        let started = Instant::now();
        let mut acks = 0;
        let mut observed = Vec::new();
        while acks < expectation.count() {
            let line = self.transport.read_line().map_err(|e| match e {
                TransportError::TimedOut { .. } => CalibrationError::CommunicationTimeout {
                    waited: started.elapsed(),
                    expected: format!(
                        "acknowledgement {} of {} for {}",
                        acks + 1,
                        expectation.count(),
                        primary.text()
                    ),
                },
                other => CalibrationError::from(other),
            })?;
            match classify(&line, self.dialect) {
                TelemetryReading::Acknowledgement => acks += 1,
                TelemetryReading::BusyNotice | TelemetryReading::Unrecognized => {
                    trace!(line = line.as_str(), "discarded")
                }
                reading => observed.push(reading),
            }
        }
        debug!(command = primary.text(), acks, "command drained");
        Ok(observed)
    }

    /// Issue a motion command and wait for it to finish. Writes the move,
    /// a motion drain, and the print-time query whose echo marks the queue
    /// empty; returns when the echo arrives or, on firmware that never
    /// echoes it, once the queue has been quiet for the settle window.
    /// A device that goes silent without ever answering fails with
    /// [`CalibrationError::CommunicationTimeout`].
    pub fn run_move(&mut self, command: &Command) -> CalibrationResult<()> {
        self.write_paced(command)?;
        self.write_paced(&Command::finish_moves())?;
        self.write_paced(&Command::print_time_query())?;

        let issued = Instant::now();
        let liveness_deadline = self.transport.read_deadline();
        let settle_polls = self.timing.settle_polls();
        self.transport
            .set_read_deadline(self.timing.move_poll_interval)?;

        let result = (|| {
            let mut quiet_polls = 0u32;
            let mut answered = false;
            loop {
                match self.transport.read_line() {
                    Ok(line) => {
                        answered = true;
                        if line.starts_with(PRINT_TIME_ECHO_PREFIX) {
                            debug!(command = command.text(), "move drained");
                            return Ok(());
                        }
                        let busy =
                            matches!(classify(&line, self.dialect), TelemetryReading::BusyNotice);
                        if !busy || self.dialect.busy_resets_settle() {
                            quiet_polls = 0;
                        }
                    }
                    Err(TransportError::TimedOut { .. }) => {
                        quiet_polls += 1;
                        if answered && quiet_polls >= settle_polls {
                            debug!(command = command.text(), "move settled without echo");
                            return Ok(());
                        }
                        if !answered && issued.elapsed() >= liveness_deadline {
                            return Err(CalibrationError::CommunicationTimeout {
                                waited: issued.elapsed(),
                                expected: format!("completion of {}", command.text()),
                            });
                        }
                    }
                    Err(other) => return Err(CalibrationError::from(other)),
                }
            }
        })();

        self.transport.set_read_deadline(liveness_deadline)?;
        result
    }

    /// Read and classify one response line. Used between synchronous
    /// commands to consume streamed heating reports.
    pub fn next_reading(&mut self) -> CalibrationResult<TelemetryReading> {
        let line = self.transport.read_line().map_err(|e| match e {
            TransportError::TimedOut { deadline } => CalibrationError::CommunicationTimeout {
                waited: deadline,
                expected: "a telemetry report".to_string(),
            },
            other => CalibrationError::from(other),
        })?;
        Ok(classify(&line, self.dialect))
    }
}
