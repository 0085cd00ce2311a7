//! Z-probe offset calibration CLI.
//!
//! Wires a serial transport, the command sequencer, and the keyboard event
//! source into one calibration session. Exits 0 when an offset was measured
//! and persisted, 1 on abort or any failure.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use zoffset::operator::KeyboardEvents;
use zoffset::{
    detect, CalibrationConfig, CalibrationMachine, CalibrationSession, CommandSequencer,
    FirmwareDialect, Outcome, SerialTransport,
};

#[derive(Parser, Debug)]
#[command(name = "zoffset")]
#[command(about = "Interactive Z-probe offset calibration over a serial printer link")]
struct Args {
    /// Path to the configuration document
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Serial port to use, skipping discovery (overrides the config)
    #[arg(long)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(long, default_value = "115200")]
    baud: u32,

    /// Pin the telemetry dialect instead of probing the firmware version
    #[arg(long, value_enum)]
    dialect: Option<FirmwareDialect>,

    /// Per-read deadline in seconds while waiting on the firmware
    #[arg(long, default_value = "30")]
    read_timeout_secs: u64,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = CalibrationConfig::load(&args.config)?;

    let port = match args.port.or_else(|| config.port.clone()) {
        Some(port) => port,
        None => {
            println!("Searching serial ports for a printer...");
            detect::find_printer_port(args.baud)?
        }
    };
    println!("Using printer at {port}.");

    let deadline = Duration::from_secs(args.read_timeout_secs);
    let transport = SerialTransport::open(&port, args.baud, deadline)
        .with_context(|| format!("opening {port}"))?;

    // Provisional until the firmware probe fixes the dialect.
    let mut sequencer = CommandSequencer::new(transport, FirmwareDialect::Modern);
    let mut events = KeyboardEvents::new();
    let mut session = CalibrationSession::from_config(&config);

    let outcome = CalibrationMachine::new(&mut sequencer, &mut events, &mut session)
        .with_dialect_override(args.dialect)
        .run()?;

    Ok(match outcome {
        Outcome::Committed => ExitCode::SUCCESS,
        Outcome::Aborted => ExitCode::from(1),
    })
}
