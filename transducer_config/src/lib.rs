#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and calibration table parsing for the transducer station.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//!   Every section is optional; an empty file yields the stock 5-channel setup.
//! - Calibration CSV loader enforces headers and rejects duplicate or
//!   out-of-range channels before anything touches the stored record.
use serde::Deserialize;

/// Upper bound on the number of transducer channels.
pub const MAX_CHANNELS: usize = 5;

/// Calibration CSV schema.
///
/// Expected headers:
/// channel,adc_min,adc_max,range_mm
///
/// Example:
/// channel,adc_min,adc_max,range_mm
/// 1,102,948,25.0
/// 3,87,1001,50.0
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct CalibrationRow {
    /// 1-based channel index
    pub channel: usize,
    pub adc_min: i32,
    pub adc_max: i32,
    pub range_mm: f32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ChannelsCfg {
    /// Number of transducers wired (1..=5)
    pub count: usize,
    /// ADC input for each channel, in channel order
    pub pins: Vec<u8>,
    /// Physical travel represented by the calibrated span, in mm
    pub default_range_mm: f32,
}

impl Default for ChannelsCfg {
    fn default() -> Self {
        Self {
            count: MAX_CHANNELS,
            pins: vec![0, 1, 2, 3, 4],
            default_range_mm: 25.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FilterCfg {
    /// Moving-average depth, shared by all channels
    pub num_samples: usize,
    /// Pause after each raw read in the periodic path (ms)
    pub settle_ms: u64,
}

impl Default for FilterCfg {
    fn default() -> Self {
        Self {
            num_samples: 10,
            settle_ms: 1,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerCfg {
    /// Output cadence (ms)
    pub interval_ms: u32,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self { interval_ms: 100 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Raw samples taken per reference position
    pub samples: usize,
    /// Delay between calibration samples (ms)
    pub sample_delay_ms: u64,
    /// Standard deviation (counts) above which a measurement is flagged unstable
    pub unstable_std_dev: i32,
    /// How long the startup prompt waits for a 'C' before continuing (ms)
    pub prompt_window_ms: u64,
    /// Bounds substituted when a calibration is rejected
    pub safe_adc_min: i32,
    pub safe_adc_max: i32,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            samples: 100,
            sample_delay_ms: 20,
            unstable_std_dev: 10,
            prompt_window_ms: 5000,
            safe_adc_min: 100,
            safe_adc_max: 950,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AdcCfg {
    /// Number of distinct ADC codes (1024 for a 10-bit converter)
    pub resolution: i32,
}

impl Default for AdcCfg {
    fn default() -> Self {
        Self { resolution: 1024 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageCfg {
    /// File holding the EEPROM image
    pub path: String,
    /// Size of the image in bytes
    pub capacity: usize,
    /// Schema version byte written in front of the record
    pub record_version: u8,
}

impl Default for StorageCfg {
    fn default() -> Self {
        Self {
            path: "var/calibration.eeprom".to_string(),
            capacity: 1024,
            record_version: 0x03,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SerialCfg {
    /// Serial device; absent means the station talks over stdin/stdout
    pub port: Option<String>,
    pub baud: u32,
}

impl Default for SerialCfg {
    fn default() -> Self {
        Self {
            port: None,
            baud: 9600,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Hardware {
    /// SPI bus and chip select of the MCP3008
    pub spi_bus: u8,
    pub spi_slave: u8,
    pub spi_clock_hz: u32,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            spi_bus: 0,
            spi_slave: 0,
            spi_clock_hz: 1_000_000,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub channels: ChannelsCfg,
    pub filter: FilterCfg,
    pub scheduler: SchedulerCfg,
    pub calibration: CalibrationCfg,
    pub adc: AdcCfg,
    pub storage: StorageCfg,
    pub serial: SerialCfg,
    pub hardware: Hardware,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Width of the record's leading version byte.
pub const RECORD_VERSION_WIDTH: usize = 1;
/// Width of one stored `adc_min` or `adc_max` (i16).
pub const RECORD_INT_WIDTH: usize = 2;
/// Width of one stored `range_mm` (f32).
pub const RECORD_FLOAT_WIDTH: usize = 4;

/// Bytes needed by a calibration record for `channels` channels:
/// version byte, then i16 minimums, i16 maximums and f32 ranges.
#[inline]
pub const fn record_len(channels: usize) -> usize {
    RECORD_VERSION_WIDTH + channels * (2 * RECORD_INT_WIDTH + RECORD_FLOAT_WIDTH)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Channels
        if self.channels.count == 0 || self.channels.count > MAX_CHANNELS {
            eyre::bail!("channels.count must be in [1, {MAX_CHANNELS}]");
        }
        if self.channels.pins.len() != self.channels.count {
            eyre::bail!(
                "channels.pins must list exactly {} pins, got {}",
                self.channels.count,
                self.channels.pins.len()
            );
        }
        if !(self.channels.default_range_mm.is_finite() && self.channels.default_range_mm > 0.0) {
            eyre::bail!("channels.default_range_mm must be > 0");
        }

        // Filter
        if self.filter.num_samples == 0 {
            eyre::bail!("filter.num_samples must be >= 1");
        }
        if self.filter.settle_ms > 1000 {
            eyre::bail!("filter.settle_ms is unreasonably large (>1s)");
        }

        // Scheduler
        if self.scheduler.interval_ms == 0 {
            eyre::bail!("scheduler.interval_ms must be >= 1");
        }

        // ADC
        if self.adc.resolution < 2 || self.adc.resolution > i32::from(i16::MAX) + 1 {
            eyre::bail!("adc.resolution must be in [2, 32768]");
        }

        // Calibration
        if self.calibration.samples == 0 {
            eyre::bail!("calibration.samples must be >= 1");
        }
        if self.calibration.unstable_std_dev < 0 {
            eyre::bail!("calibration.unstable_std_dev must be >= 0");
        }
        if self.calibration.prompt_window_ms > 10 * 60 * 1000 {
            eyre::bail!("calibration.prompt_window_ms is unreasonably large (>10min)");
        }
        let (lo, hi) = (self.calibration.safe_adc_min, self.calibration.safe_adc_max);
        if lo < 0 || hi >= self.adc.resolution || hi <= lo {
            eyre::bail!(
                "calibration.safe_adc_min/safe_adc_max must satisfy 0 <= min < max < adc.resolution"
            );
        }

        // Storage
        if self.storage.record_version == 0xFF {
            eyre::bail!("storage.record_version must not be 0xFF (erased marker)");
        }
        if self.storage.path.trim().is_empty() {
            eyre::bail!("storage.path must not be empty");
        }
        let need = record_len(self.channels.count);
        if self.storage.capacity < need {
            eyre::bail!("storage.capacity must be >= {need} bytes for the calibration record");
        }

        // Serial
        if self.serial.baud == 0 {
            eyre::bail!("serial.baud must be > 0");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}

/// Load a calibration table for a station with `channels` channels.
///
/// Only the table shape is checked here (headers, numeric fields, channel
/// index, duplicates, positive range); ADC bounds are validated by the core
/// against the converter resolution before anything is persisted.
pub fn load_calibration_csv(
    path: &std::path::Path,
    channels: usize,
) -> eyre::Result<Vec<CalibrationRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["channel", "adc_min", "adc_max", "range_mm"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "calibration CSV must have headers 'channel,adc_min,adc_max,range_mm', got: {}",
            actual.join(",")
        );
    }

    let mut rows: Vec<CalibrationRow> = Vec::new();
    for (idx, rec) in rdr.deserialize::<CalibrationRow>().enumerate() {
        let line = idx + 2;
        let row = match rec {
            Ok(row) => row,
            Err(e) => eyre::bail!("invalid CSV row {}: {}", line, e),
        };
        if row.channel == 0 || row.channel > channels {
            eyre::bail!(
                "invalid CSV row {}: channel {} outside 1..={}",
                line,
                row.channel,
                channels
            );
        }
        if !(row.range_mm.is_finite() && row.range_mm > 0.0) {
            eyre::bail!("invalid CSV row {}: range_mm must be > 0", line);
        }
        if rows.iter().any(|r| r.channel == row.channel) {
            eyre::bail!("invalid CSV row {}: duplicate channel {}", line, row.channel);
        }
        rows.push(row);
    }

    if rows.is_empty() {
        eyre::bail!("calibration CSV has no rows");
    }
    Ok(rows)
}
