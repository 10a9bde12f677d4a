//! Device backends for the transducer station.
//!
//! Everything here implements the traits from `transducer_traits`; the core
//! crate never sees a concrete device.
//!
//! - `sim`: simulated ADC with movable levels and optional noise
//! - `eeprom`: in-memory and file-backed EEPROM images
//! - `stdio`: serial link over stdin/stdout
//! - `serial` (feature `serial`): UART via `serialport`
//! - `mcp3008` (feature `hardware`, Linux): 10-bit SPI ADC via `rppal`

pub mod atomic;
pub mod eeprom;
pub mod error;
pub mod sim;
pub mod stdio;

#[cfg(feature = "serial")]
pub mod serial;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod mcp3008;

pub use eeprom::{ERASED, FileEeprom, MemEeprom};
pub use error::HwError;
pub use sim::{SimHandle, SimulatedAdc};
pub use stdio::StdioLink;

#[cfg(feature = "serial")]
pub use serial::SerialPortLink;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use mcp3008::Mcp3008;
