//! Device selection: real hardware behind features, simulation otherwise.

use eyre::{WrapErr, eyre};
use tracing::{info, warn};
use transducer_config::Config;
use transducer_hardware::FileEeprom;
use transducer_traits::{Adc, SerialLink};

/// Comma separated start levels for the simulated ADC, one per pin.
pub const SIM_LEVELS_ENV: &str = "TRANSDUCER_SIM_LEVELS";
/// Noise amplitude (counts) added to every simulated read.
pub const SIM_NOISE_ENV: &str = "TRANSDUCER_SIM_NOISE";

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub fn make_adc(cfg: &Config) -> eyre::Result<Box<dyn Adc>> {
    let adc = transducer_hardware::Mcp3008::new(
        cfg.hardware.spi_bus,
        cfg.hardware.spi_slave,
        cfg.hardware.spi_clock_hz,
    )
    .wrap_err("open MCP3008")?;
    info!(
        bus = cfg.hardware.spi_bus,
        slave = cfg.hardware.spi_slave,
        "using MCP3008 adc"
    );
    Ok(Box::new(adc))
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
pub fn make_adc(cfg: &Config) -> eyre::Result<Box<dyn Adc>> {
    use transducer_hardware::SimulatedAdc;

    let pins = cfg
        .channels
        .pins
        .iter()
        .map(|&p| usize::from(p) + 1)
        .max()
        .unwrap_or(1);
    let mut adc = match std::env::var(SIM_LEVELS_ENV) {
        Ok(raw) => {
            let mut levels = parse_levels(&raw)?;
            if levels.len() < pins {
                levels.resize(pins, transducer_hardware::sim::SIM_FULL_SCALE / 2);
            }
            SimulatedAdc::with_levels(levels)
        }
        Err(_) => SimulatedAdc::new(pins),
    };
    if let Ok(raw) = std::env::var(SIM_NOISE_ENV) {
        let amplitude: u16 = raw
            .trim()
            .parse()
            .map_err(|_| eyre!("{SIM_NOISE_ENV} must be a count, got {raw:?}"))?;
        adc = adc.with_noise(amplitude);
    }
    warn!("hardware feature disabled, using simulated adc");
    Ok(Box::new(adc))
}

#[cfg_attr(all(feature = "hardware", target_os = "linux"), allow(dead_code))]
fn parse_levels(raw: &str) -> eyre::Result<Vec<u16>> {
    raw.split(',')
        .map(|s| {
            s.trim()
                .parse::<u16>()
                .map_err(|_| eyre!("{SIM_LEVELS_ENV}: bad level {s:?}"))
        })
        .collect()
}

/// `--port` wins over `serial.port`; neither means stdin/stdout.
pub fn make_link(cfg: &Config, port: Option<&str>) -> eyre::Result<Box<dyn SerialLink>> {
    match port.or(cfg.serial.port.as_deref()) {
        Some(name) => open_port(name, cfg.serial.baud),
        None => {
            info!("serial link on stdin/stdout");
            Ok(Box::new(transducer_hardware::StdioLink::spawn()))
        }
    }
}

#[cfg(feature = "serial")]
fn open_port(name: &str, baud: u32) -> eyre::Result<Box<dyn SerialLink>> {
    let link = transducer_hardware::SerialPortLink::open(name, baud)
        .wrap_err_with(|| format!("open serial port {name}"))?;
    Ok(Box::new(link))
}

#[cfg(not(feature = "serial"))]
fn open_port(name: &str, _baud: u32) -> eyre::Result<Box<dyn SerialLink>> {
    Err(eyre!(
        "serial port {name} requested but this build lacks the `serial` feature"
    ))
}

pub fn open_storage(cfg: &Config) -> eyre::Result<FileEeprom> {
    let path = &cfg.storage.path;
    if let Some(dir) = std::path::Path::new(path)
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
    {
        std::fs::create_dir_all(dir)
            .wrap_err_with(|| format!("create storage directory {}", dir.display()))?;
    }
    FileEeprom::open(path, cfg.storage.capacity).wrap_err_with(|| format!("open storage {path}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_parse_with_spaces() {
        assert_eq!(parse_levels("525, 600,0").unwrap(), vec![525, 600, 0]);
    }

    #[test]
    fn bad_level_is_reported() {
        let err = parse_levels("525,abc").unwrap_err();
        assert!(err.to_string().contains("bad level"));
    }

    #[cfg(not(feature = "serial"))]
    #[test]
    fn port_without_serial_feature_fails() {
        let cfg = Config::default();
        let err = make_link(&cfg, Some("/dev/ttyUSB0")).err().unwrap();
        assert!(err.to_string().contains("`serial` feature"));
    }
}
