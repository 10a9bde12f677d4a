//! Serial link over the process' stdin/stdout.
//!
//! A background thread owns stdin and forwards bytes through an unbounded
//! channel so the poll loop can ask "is a byte available?" without blocking.
//! When stdin reaches EOF the thread exits and the channel disconnects, which
//! `wait_byte` reports as `HwError::InputClosed`.

use std::io::{Read, Write};
use std::time::Duration;

use crossbeam_channel as xch;
use tracing::debug;
use transducer_traits::{BoxError, SerialLink};

use crate::error::HwError;

pub struct StdioLink {
    rx: xch::Receiver<u8>,
    pending: Option<u8>,
    out: std::io::Stdout,
}

impl StdioLink {
    pub fn spawn() -> Self {
        let (tx, rx) = xch::unbounded();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            let mut lock = stdin.lock();
            let mut buf = [0u8; 256];
            loop {
                match lock.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        for &b in &buf[..n] {
                            if tx.send(b).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        debug!(error = %e, "stdin read failed");
                        break;
                    }
                }
            }
            debug!("stdin closed, reader thread exiting");
        });
        Self {
            rx,
            pending: None,
            out: std::io::stdout(),
        }
    }

    fn recv_timeout(&mut self, timeout: Duration) -> Option<u8> {
        if timeout.is_zero() {
            self.rx.try_recv().ok()
        } else {
            self.rx.recv_timeout(timeout).ok()
        }
    }
}

impl SerialLink for StdioLink {
    fn available(&mut self) -> Result<bool, BoxError> {
        Ok(self.pending.is_some() || !self.rx.is_empty())
    }

    fn read_byte_timeout(&mut self, timeout: Duration) -> Result<Option<u8>, BoxError> {
        if let Some(b) = self.pending.take() {
            return Ok(Some(b));
        }
        Ok(self.recv_timeout(timeout))
    }

    fn peek_byte_timeout(&mut self, timeout: Duration) -> Result<Option<u8>, BoxError> {
        if self.pending.is_none() {
            self.pending = self.recv_timeout(timeout);
        }
        Ok(self.pending)
    }

    fn wait_byte(&mut self) -> Result<u8, BoxError> {
        if let Some(b) = self.pending.take() {
            return Ok(b);
        }
        self.rx.recv().map_err(|_| HwError::InputClosed.into())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), BoxError> {
        let mut lock = self.out.lock();
        lock.write_all(bytes).map_err(HwError::from)?;
        lock.flush().map_err(HwError::from)?;
        Ok(())
    }
}
