//! Firmware dialect selection and the per-dialect protocol parameters.
//!
//! Firmware versions disagree on a handful of protocol details: how many
//! acknowledgements a padded command produces, whether busy notices mean a
//! move is still executing, and which layout the probe-offset report uses.
//! All of those live here so the rest of the crate is written once.

use clap::ValueEnum;

/// Heater drive reports use a 0-127 PWM scale; below half drive the
/// extruder is coasting on residual heat rather than actively heating.
const EXTRUDER_RESTING_DUTY: u8 = 63;

/// Telemetry dialect spoken by the connected firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FirmwareDialect {
    /// Pre-2.x firmware: shorter acknowledgement run, colon-delimited
    /// offset report, silent during long moves.
    Legacy,
    /// 2.x firmware: multi-axis split-on-`Z` offset report, busy notices
    /// while the queue is executing.
    Modern,
}

impl FirmwareDialect {
    /// Inert queries appended after a primary command. The firmware answers
    /// each queue entry with one acknowledgement, so a padded command is
    /// complete after `padding_count() + 1` of them.
    pub fn padding_count(self) -> usize {
        match self {
            FirmwareDialect::Legacy => 3,
            FirmwareDialect::Modern => 4,
        }
    }

    /// Acknowledgements required to drain a padded command.
    pub fn ack_expectation(self) -> AckExpectation {
        AckExpectation::for_padding(self.padding_count())
    }

    /// Whether a busy notice restarts the move settle window. Modern
    /// firmware emits `echo:busy` while executing long moves; on legacy
    /// firmware the notice carries no queue information.
    pub fn busy_resets_settle(self) -> bool {
        matches!(self, FirmwareDialect::Modern)
    }

    /// Highest bed heater drive still considered resting.
    pub fn bed_resting_duty(self) -> u8 {
        0
    }

    /// Highest extruder heater drive still considered resting.
    pub fn extruder_resting_duty(self) -> u8 {
        EXTRUDER_RESTING_DUTY
    }

    /// Select a dialect from the reported firmware version string.
    /// Major version 2 or later speaks Modern; anything unparseable is
    /// treated as Legacy, which predates the identity report.
    pub fn from_version(version: &str) -> Self {
        let major = version
            .split('.')
            .next()
            .and_then(|text| text.trim().parse::<u32>().ok());
        match major {
            Some(major) if major >= 2 => FirmwareDialect::Modern,
            _ => FirmwareDialect::Legacy,
        }
    }
}

/// Number of acknowledgements that must be observed before a padded command
/// counts as fully processed. Construction guarantees it is at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckExpectation(usize);

impl AckExpectation {
    /// Expectation for a primary command followed by `padding` inert queries.
    pub fn for_padding(padding: usize) -> Self {
        Self(padding + 1)
    }

    /// Total acknowledgements to count.
    pub fn count(self) -> usize {
        self.0
    }
}
