//! The calibration state machine.
//!
//! One state per phase of a session, from port bring-up through preheat,
//! homing, the interactive paper-drag loop, and a terminal commit or abort.
//! Each handler does the work of its state against the firmware or the
//! operator and returns the successor state; [`CalibrationMachine::run`]
//! loops until a terminal state is reached. All collaborators are borrowed,
//! so a finished run leaves the session and the transport inspectable by
//! the caller.

use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::command::{Command, RAISE_HEIGHT_MM};
use crate::detect;
use crate::dialect::FirmwareDialect;
use crate::error::{CalibrationError, CalibrationResult};
use crate::operator::{EventSource, OperatorEvent};
use crate::sequencer::CommandSequencer;
use crate::session::CalibrationSession;
use crate::telemetry::TelemetryReading;
use crate::transport::Transport;

/// Wait after switching the bed heater on before trusting duty readings.
const BED_POWER_ON_GRACE: Duration = Duration::from_secs(3);

/// Wait after switching the extruder heater on. Longer than the bed: the
/// hotend thermistor reacts slower than the drive level does.
const EXTRUDER_POWER_ON_GRACE: Duration = Duration::from_secs(5);

/// Phases of a calibration session.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationState {
    Init,
    PortOpened,
    FirmwareDetected,
    OffsetSaved,
    PreheatingBed,
    PreheatingExtruder,
    Homed,
    Centered,
    /// Interactive phase. `remeasure` is set when the offset changed and
    /// the nozzle must move before the next drag test.
    Measuring { remeasure: bool },
    /// Collecting a typed replacement offset.
    ManualEntry { buffer: EntryBuffer },
    /// Adjusting the step the offset moves by.
    IncrementEdit,
    Committing,
    Aborting,
    Done { committed: bool },
}

/// How a finished session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Offset measured and persisted to the device.
    Committed,
    /// Session abandoned; the previous offset was restored.
    Aborted,
}

/// Fixed-format buffer for a typed offset: `-D.DD`, the leading sign
/// implied. Keystrokes that do not fit the next position are ignored, and
/// the buffer completes by itself at full width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryBuffer {
    text: String,
}

impl EntryBuffer {
    const WIDTH: usize = 5;

    /// Buffer holding the sign and the first typed digit.
    fn seeded(digit: char) -> Self {
        let mut text = String::with_capacity(Self::WIDTH);
        text.push('-');
        text.push(digit);
        Self { text }
    }

    fn push(&mut self, event: &OperatorEvent) {
        match (self.text.len(), event) {
            (2, OperatorEvent::Decimal) => self.text.push('.'),
            (3 | 4, OperatorEvent::Digit(digit)) => self.text.push(*digit),
            _ => {}
        }
    }

    fn is_complete(&self) -> bool {
        self.text.len() == Self::WIDTH
    }

    fn value(&self) -> Option<f64> {
        if self.is_complete() {
            self.text.parse().ok()
        } else {
            None
        }
    }

    fn text(&self) -> &str {
        &self.text
    }
}

/// Drives one calibration session over borrowed collaborators.
pub struct CalibrationMachine<'a, T: Transport, E: EventSource> {
    sequencer: &'a mut CommandSequencer<T>,
    events: &'a mut E,
    session: &'a mut CalibrationSession,
    dialect_override: Option<FirmwareDialect>,
    bed_grace: Duration,
    extruder_grace: Duration,
}

#[derive(Debug, Clone, Copy)]
enum Heater {
    Bed,
    Extruder,
}

impl Heater {
    fn label(self) -> &'static str {
        match self {
            Heater::Bed => "bed",
            Heater::Extruder => "extruder",
        }
    }
}

impl<'a, T: Transport, E: EventSource> CalibrationMachine<'a, T, E> {
    pub fn new(
        sequencer: &'a mut CommandSequencer<T>,
        events: &'a mut E,
        session: &'a mut CalibrationSession,
    ) -> Self {
        Self {
            sequencer,
            events,
            session,
            dialect_override: None,
            bed_grace: BED_POWER_ON_GRACE,
            extruder_grace: EXTRUDER_POWER_ON_GRACE,
        }
    }

    /// Pin the dialect instead of selecting it from the firmware version.
    pub fn with_dialect_override(mut self, dialect: Option<FirmwareDialect>) -> Self {
        self.dialect_override = dialect;
        self
    }

    /// Replace the heater power-on grace delays.
    pub fn with_heater_grace(mut self, bed: Duration, extruder: Duration) -> Self {
        self.bed_grace = bed;
        self.extruder_grace = extruder;
        self
    }

    /// Run the session to its terminal state. Any communication failure
    /// unwinds immediately; the firmware queue cannot be rolled back once
    /// written, so no state retries.
    pub fn run(&mut self) -> CalibrationResult<Outcome> {
        let mut state = CalibrationState::Init;
        loop {
            debug!(?state);
            state = match state {
                CalibrationState::Init => self.handle_init()?,
                CalibrationState::PortOpened => self.handle_port_opened()?,
                CalibrationState::FirmwareDetected => self.handle_firmware_detected()?,
                CalibrationState::OffsetSaved => self.handle_offset_saved()?,
                CalibrationState::PreheatingBed => self.handle_preheating_bed()?,
                CalibrationState::PreheatingExtruder => self.handle_preheating_extruder()?,
                CalibrationState::Homed => self.handle_homed()?,
                CalibrationState::Centered => self.handle_centered()?,
                CalibrationState::Measuring { remeasure } => self.handle_measuring(remeasure)?,
                CalibrationState::ManualEntry { buffer } => self.handle_manual_entry(buffer)?,
                CalibrationState::IncrementEdit => self.handle_increment_edit()?,
                CalibrationState::Committing => self.handle_committing()?,
                CalibrationState::Aborting => self.handle_aborting()?,
                CalibrationState::Done { committed } => {
                    return Ok(if committed {
                        Outcome::Committed
                    } else {
                        Outcome::Aborted
                    });
                }
            };
        }
    }

    fn handle_init(&mut self) -> CalibrationResult<CalibrationState> {
        println!(
            "Calibrating Z probe offset: bed {:.0}C, extruder {:.0}C, first test at Z{}.",
            self.session.bed_target,
            self.session.extruder_target,
            self.session.offset_text()
        );
        Ok(CalibrationState::PortOpened)
    }

    fn handle_port_opened(&mut self) -> CalibrationResult<CalibrationState> {
        println!("Printer link is up.");
        Ok(CalibrationState::FirmwareDetected)
    }

    fn handle_firmware_detected(&mut self) -> CalibrationResult<CalibrationState> {
        let dialect = detect::probe_firmware(self.sequencer, self.dialect_override)?;
        info!(?dialect, "dialect fixed for the session");
        Ok(CalibrationState::OffsetSaved)
    }

    /// Capture the offset currently persisted on the device, keeping the
    /// firmware's exact text for a byte-identical restore on abort.
    fn handle_offset_saved(&mut self) -> CalibrationResult<CalibrationState> {
        let readings = self.sequencer.run_sync(&Command::query_probe_offset())?;
        let report = readings.into_iter().rev().find_map(|reading| match reading {
            TelemetryReading::ProbeOffsetReport { value, raw } => Some((value, raw)),
            _ => None,
        });
        let (value, raw) = report.ok_or(CalibrationError::MissingOffsetReport)?;
        info!(offset = value, raw = raw.as_str(), "probe offset saved");
        println!("Current probe offset is Z{raw}; it will be restored if you quit.");
        self.session.previous_offset_raw = Some(raw);
        Ok(CalibrationState::PreheatingBed)
    }

    fn handle_preheating_bed(&mut self) -> CalibrationResult<CalibrationState> {
        self.preheat(Heater::Bed)?;
        Ok(CalibrationState::PreheatingExtruder)
    }

    fn handle_preheating_extruder(&mut self) -> CalibrationResult<CalibrationState> {
        self.preheat(Heater::Extruder)?;
        Ok(CalibrationState::Homed)
    }

    /// Enable one heater and poll streamed reports until the target holds.
    /// Done means at temperature *and* the drive duty at rest; temperature
    /// alone can be a transient overshoot while the heater is still driving.
    fn preheat(&mut self, heater: Heater) -> CalibrationResult<()> {
        let (enable, target, resting, grace) = match heater {
            Heater::Bed => (
                Command::set_bed_target(self.session.bed_target),
                self.session.bed_target,
                self.sequencer.dialect().bed_resting_duty(),
                self.bed_grace,
            ),
            Heater::Extruder => (
                Command::set_extruder_target(self.session.extruder_target),
                self.session.extruder_target,
                self.sequencer.dialect().extruder_resting_duty(),
                self.extruder_grace,
            ),
        };
        println!("Heating {} to {target:.0}C...", heater.label());
        self.sequencer.run_sync(&enable)?;
        thread::sleep(grace);
        self.sequencer.run_sync(&Command::report_temperatures(true))?;
        loop {
            if let TelemetryReading::HeatingReport {
                extruder_temp,
                bed_temp,
                extruder_heater_level,
                bed_heater_level,
            } = self.sequencer.next_reading()?
            {
                let (current, duty) = match heater {
                    Heater::Bed => (bed_temp, bed_heater_level),
                    Heater::Extruder => (extruder_temp, extruder_heater_level),
                };
                print!("\r{}: {current:.2}C / {target:.0}C   ", heater.label());
                io::stdout().flush()?;
                if current >= target && duty <= resting {
                    break;
                }
            }
        }
        println!();
        self.sequencer.run_sync(&Command::report_temperatures(false))?;
        Ok(())
    }

    /// Measurement setup: restore the position limits, clear the live
    /// offset so test moves read in absolute bed terms, persist, and home.
    fn handle_homed(&mut self) -> CalibrationResult<CalibrationState> {
        println!("Homing with a cleared offset...");
        self.sequencer.run_sync(&Command::soft_endstops(true))?;
        self.sequencer.run_sync(&Command::set_probe_offset(0.0))?;
        self.sequencer.run_sync(&Command::persist_settings())?;
        self.sequencer.run_sync(&Command::home_all())?;
        Ok(CalibrationState::Centered)
    }

    /// Park the nozzle over bed center, then drop the soft limits so the
    /// interactive phase may drive below the nominal Z floor.
    fn handle_centered(&mut self) -> CalibrationResult<CalibrationState> {
        println!("Centering the nozzle...");
        self.sequencer.run_move(&Command::center_nozzle())?;
        self.sequencer.run_sync(&Command::soft_endstops(false))?;
        Ok(CalibrationState::Measuring { remeasure: true })
    }

    fn handle_measuring(&mut self, remeasure: bool) -> CalibrationResult<CalibrationState> {
        if remeasure {
            self.sequencer
                .run_move(&Command::move_z(self.session.offset()))?;
            println!(
                "Nozzle at Z{}. Drag a sheet of paper under it to judge the gap (h for keys).",
                self.session.offset_text()
            );
        }
        match self.events.next_event()? {
            OperatorEvent::Digit(digit) => Ok(CalibrationState::ManualEntry {
                buffer: EntryBuffer::seeded(digit),
            }),
            OperatorEvent::Raise => {
                self.session.adjust_offset(1.0);
                Ok(CalibrationState::Measuring { remeasure: true })
            }
            OperatorEvent::Lower => {
                self.session.adjust_offset(-1.0);
                Ok(CalibrationState::Measuring { remeasure: true })
            }
            OperatorEvent::EditIncrement => {
                println!(
                    "Editing the increment ({:.2}); + and - change it, enter accepts.",
                    self.session.increment()
                );
                Ok(CalibrationState::IncrementEdit)
            }
            OperatorEvent::FineTune => {
                let on = self.session.toggle_fine_tune();
                println!(
                    "Fine adjustment {}.",
                    if on { "on, 0.01 steps" } else { "off" }
                );
                Ok(CalibrationState::Measuring { remeasure: false })
            }
            OperatorEvent::Retest => {
                println!("Raising the nozzle for another pass...");
                self.sequencer.run_move(&Command::move_z(RAISE_HEIGHT_MM))?;
                Ok(CalibrationState::Measuring { remeasure: true })
            }
            OperatorEvent::Help => {
                self.print_help();
                Ok(CalibrationState::Measuring { remeasure: false })
            }
            OperatorEvent::Accept => Ok(CalibrationState::Committing),
            OperatorEvent::Quit => Ok(CalibrationState::Aborting),
            OperatorEvent::Decimal | OperatorEvent::Cancel => {
                Ok(CalibrationState::Measuring { remeasure: false })
            }
        }
    }

    fn handle_manual_entry(
        &mut self,
        mut buffer: EntryBuffer,
    ) -> CalibrationResult<CalibrationState> {
        print!("\rNew offset: {}  ", buffer.text());
        io::stdout().flush()?;
        match self.events.next_event()? {
            OperatorEvent::Cancel => {
                println!();
                println!("Entry cancelled.");
                Ok(CalibrationState::Measuring { remeasure: false })
            }
            event => {
                buffer.push(&event);
                if let Some(value) = buffer.value() {
                    println!();
                    self.session.set_offset(value);
                    Ok(CalibrationState::Measuring { remeasure: true })
                } else {
                    Ok(CalibrationState::ManualEntry { buffer })
                }
            }
        }
    }

    fn handle_increment_edit(&mut self) -> CalibrationResult<CalibrationState> {
        print!("\rIncrement: {:.2}  ", self.session.increment());
        io::stdout().flush()?;
        match self.events.next_event()? {
            OperatorEvent::Raise => {
                self.session.adjust_increment(1.0);
                Ok(CalibrationState::IncrementEdit)
            }
            OperatorEvent::Lower => {
                self.session.adjust_increment(-1.0);
                Ok(CalibrationState::IncrementEdit)
            }
            OperatorEvent::Accept => {
                println!();
                Ok(CalibrationState::Measuring { remeasure: false })
            }
            _ => Ok(CalibrationState::IncrementEdit),
        }
    }

    fn handle_committing(&mut self) -> CalibrationResult<CalibrationState> {
        println!("Saving probe offset Z{}...", self.session.offset_text());
        self.sequencer.run_sync(&Command::soft_endstops(true))?;
        self.sequencer.run_sync(&Command::zero_z_reference())?;
        self.sequencer
            .run_sync(&Command::set_probe_offset(self.session.offset()))?;
        self.sequencer.run_sync(&Command::persist_settings())?;
        self.sequencer.run_sync(&Command::set_bed_target(0.0))?;
        self.sequencer.run_sync(&Command::set_extruder_target(0.0))?;
        self.sequencer.run_sync(&Command::home_all())?;
        println!("Saved. Heaters are off and the printer is homing.");
        Ok(CalibrationState::Done { committed: true })
    }

    /// Put the device back the way it was found: limits on, heaters off,
    /// the saved offset text written back unmodified, and a final home.
    fn handle_aborting(&mut self) -> CalibrationResult<CalibrationState> {
        println!("Abandoning calibration and restoring the previous offset.");
        self.sequencer.run_sync(&Command::soft_endstops(true))?;
        self.sequencer.run_sync(&Command::set_bed_target(0.0))?;
        self.sequencer.run_sync(&Command::set_extruder_target(0.0))?;
        if let Some(raw) = self.session.previous_offset_raw.clone() {
            self.sequencer
                .run_sync(&Command::restore_probe_offset(&raw))?;
        }
        self.sequencer.run_sync(&Command::home_all())?;
        Ok(CalibrationState::Done { committed: false })
    }

    fn print_help(&self) {
        println!("Keys:");
        println!("  + / -    move the nozzle up / down by the current increment");
        println!("  0-9      type a replacement offset (-D.DD, sign implied)");
        println!("  up/down  edit the increment");
        println!("  f        toggle 0.01 fine adjustment");
        println!("  r        raise the nozzle and repeat the test");
        println!("  enter    accept the current offset and save it");
        println!("  q        quit and restore the previous offset");
    }
}
