use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use tracing::trace;
use transducer_traits::{Adc, BoxError};

use crate::error::{HwError, Result};

/// Number of single-ended inputs on the MCP3008.
const INPUTS: u8 = 8;

/// MCP3008 10-bit SPI ADC. Pins are the converter's single-ended inputs 0..=7.
pub struct Mcp3008 {
    spi: Spi,
}

impl Mcp3008 {
    pub fn new(bus: u8, slave: u8, clock_hz: u32) -> Result<Self> {
        let bus = match bus {
            0 => Bus::Spi0,
            1 => Bus::Spi1,
            2 => Bus::Spi2,
            other => return Err(HwError::Spi(format!("unsupported spi bus {other}"))),
        };
        let slave = match slave {
            0 => SlaveSelect::Ss0,
            1 => SlaveSelect::Ss1,
            2 => SlaveSelect::Ss2,
            other => return Err(HwError::Spi(format!("unsupported slave select {other}"))),
        };
        let spi = Spi::new(bus, slave, clock_hz, Mode::Mode0)
            .map_err(|e| HwError::Spi(e.to_string()))?;
        Ok(Self { spi })
    }

    pub fn read_channel(&mut self, pin: u8) -> Result<u16> {
        if pin >= INPUTS {
            return Err(HwError::InvalidPin(pin));
        }
        // start bit, single-ended + channel select, then clock out 10 bits
        let tx = [0x01, (0x08 | pin) << 4, 0x00];
        let mut rx = [0u8; 3];
        self.spi
            .transfer(&mut rx, &tx)
            .map_err(|e| HwError::Spi(e.to_string()))?;
        let value = (u16::from(rx[1] & 0x03) << 8) | u16::from(rx[2]);
        trace!(pin, raw = value, "mcp3008 read");
        Ok(value)
    }
}

impl Adc for Mcp3008 {
    fn read(&mut self, pin: u8) -> std::result::Result<u16, BoxError> {
        Ok(self.read_channel(pin)?)
    }
}
