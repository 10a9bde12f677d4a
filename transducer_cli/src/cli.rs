//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(
    name = "transducer",
    version,
    about = "Displacement transducer acquisition and calibration station"
)]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/transducer.toml")]
    pub config: PathBuf,

    /// Log (and report errors) as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); falls back to logging.level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the station: load calibration, offer calibration, then stream readings
    Run {
        /// Serial device to talk on (overrides serial.port; needs the `serial` feature)
        #[arg(long, value_name = "DEVICE")]
        port: Option<String>,
        /// Stop after this many milliseconds instead of waiting for Ctrl-C
        #[arg(long, value_name = "MS")]
        duration_ms: Option<u64>,
        /// Channels to enable before streaming (1-based, repeatable)
        #[arg(long = "enable", value_name = "N")]
        enable: Vec<i64>,
    },
    /// Run the interactive calibration session once and exit
    Calibrate {
        /// Serial device to talk on (overrides serial.port; needs the `serial` feature)
        #[arg(long, value_name = "DEVICE")]
        port: Option<String>,
    },
    /// Print the stored calibration record
    Show,
    /// Write a calibration table (CSV: channel,adc_min,adc_max,range_mm) to storage
    Import {
        /// CSV file with strict headers
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Validate and print the result without writing storage
        #[arg(long, action = ArgAction::SetTrue)]
        dry_run: bool,
    },
    /// Parse streamed telemetry lines and print one JSON object per line
    Monitor {
        /// Read from this serial device instead of stdin (needs the `serial` feature)
        #[arg(long, value_name = "DEVICE")]
        port: Option<String>,
        /// Stop after this many telemetry lines
        #[arg(long, value_name = "N")]
        count: Option<usize>,
    },
    /// Quick health check (config, storage, ADC on every configured pin)
    SelfCheck,
}
