//! Serial link backed by a real UART via the `serialport` crate.

use std::io::{Read, Write};
use std::time::Duration;

use tracing::{info, trace};
use transducer_traits::{BoxError, SerialLink};

use crate::error::HwError;

/// Poll period used while blocking indefinitely in `wait_byte`.
const WAIT_SLICE: Duration = Duration::from_millis(100);

pub struct SerialPortLink {
    port: Box<dyn serialport::SerialPort>,
    pending: Option<u8>,
}

impl SerialPortLink {
    pub fn open(port_name: &str, baud_rate: u32) -> crate::error::Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(10))
            .open()
            .map_err(|e| HwError::Serial(format!("open {port_name}: {e}")))?;
        info!(port = port_name, baud_rate, "serial port opened");
        Ok(Self {
            port,
            pending: None,
        })
    }

    /// List available serial ports (helper for the CLI).
    pub fn list_available_ports() -> crate::error::Result<Vec<String>> {
        serialport::available_ports()
            .map(|ports| ports.into_iter().map(|p| p.port_name).collect())
            .map_err(|e| HwError::Serial(e.to_string()))
    }

    fn read_one(&mut self, timeout: Duration) -> crate::error::Result<Option<u8>> {
        // serialport rejects a zero timeout on some platforms
        let timeout = timeout.max(Duration::from_millis(1));
        self.port
            .set_timeout(timeout)
            .map_err(|e| HwError::Serial(e.to_string()))?;
        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl SerialLink for SerialPortLink {
    fn available(&mut self) -> Result<bool, BoxError> {
        if self.pending.is_some() {
            return Ok(true);
        }
        let n = self
            .port
            .bytes_to_read()
            .map_err(|e| HwError::Serial(e.to_string()))?;
        Ok(n > 0)
    }

    fn read_byte_timeout(&mut self, timeout: Duration) -> Result<Option<u8>, BoxError> {
        if let Some(b) = self.pending.take() {
            return Ok(Some(b));
        }
        Ok(self.read_one(timeout)?)
    }

    fn peek_byte_timeout(&mut self, timeout: Duration) -> Result<Option<u8>, BoxError> {
        if self.pending.is_none() {
            self.pending = self.read_one(timeout)?;
        }
        Ok(self.pending)
    }

    fn wait_byte(&mut self) -> Result<u8, BoxError> {
        if let Some(b) = self.pending.take() {
            return Ok(b);
        }
        loop {
            if let Some(b) = self.read_one(WAIT_SLICE)? {
                return Ok(b);
            }
            trace!("still waiting for operator input");
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), BoxError> {
        self.port.write_all(bytes).map_err(HwError::from)?;
        self.port.flush().map_err(HwError::from)?;
        Ok(())
    }
}
