//! Byte/line oriented serial transport.
//!
//! Implementors provide the five primitive operations; line reading, stream
//! integer parsing and input draining are built on top of them so every
//! transport parses commands identically.

use std::time::Duration;

use crate::BoxError;

pub trait SerialLink {
    /// True when at least one inbound byte can be read without blocking.
    fn available(&mut self) -> Result<bool, BoxError>;

    /// Consume the next byte, waiting at most `timeout`. `Ok(None)` on timeout.
    fn read_byte_timeout(&mut self, timeout: Duration) -> Result<Option<u8>, BoxError>;

    /// Like `read_byte_timeout` but leaves the byte in the stream.
    fn peek_byte_timeout(&mut self, timeout: Duration) -> Result<Option<u8>, BoxError>;

    /// Block until a byte arrives. There is no timeout and no cancellation;
    /// the only way out besides a byte is a transport error (e.g. input closed).
    fn wait_byte(&mut self) -> Result<u8, BoxError>;

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), BoxError>;

    /// Non-blocking read of one byte.
    fn read_byte(&mut self) -> Result<Option<u8>, BoxError> {
        self.read_byte_timeout(Duration::ZERO)
    }

    /// Discard everything currently buffered.
    fn drain(&mut self) -> Result<(), BoxError> {
        while self.read_byte()?.is_some() {}
        Ok(())
    }

    fn write_str(&mut self, s: &str) -> Result<(), BoxError> {
        self.write_all(s.as_bytes())
    }

    fn write_line(&mut self, s: &str) -> Result<(), BoxError> {
        self.write_all(s.as_bytes())?;
        self.write_all(b"\n")
    }

    /// Read up to (and consume) the next `\n`, or until no byte arrives within
    /// `timeout`. The terminator is not included.
    fn read_line(&mut self, timeout: Duration) -> Result<String, BoxError> {
        let mut buf = Vec::new();
        while let Some(b) = self.read_byte_timeout(timeout)? {
            if b == b'\n' {
                break;
            }
            buf.push(b);
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Parse the next integer from the stream.
    ///
    /// Leading bytes that cannot start a number are skipped, an optional `-`
    /// is honoured and digits are consumed up to the first non-digit, which
    /// stays in the stream. Returns 0 when nothing numeric arrives in time.
    fn parse_int(&mut self, timeout: Duration) -> Result<i64, BoxError> {
        loop {
            match self.peek_byte_timeout(timeout)? {
                None => return Ok(0),
                Some(b) if b == b'-' || b.is_ascii_digit() => break,
                Some(_) => {
                    self.read_byte_timeout(timeout)?;
                }
            }
        }

        let mut negative = false;
        if self.peek_byte_timeout(timeout)? == Some(b'-') {
            negative = true;
            self.read_byte_timeout(timeout)?;
        }

        let mut value: i64 = 0;
        while let Some(b) = self.peek_byte_timeout(timeout)? {
            if !b.is_ascii_digit() {
                break;
            }
            self.read_byte_timeout(timeout)?;
            value = value.saturating_mul(10).saturating_add(i64::from(b - b'0'));
        }
        Ok(if negative { -value } else { value })
    }
}

impl<T: SerialLink + ?Sized> SerialLink for Box<T> {
    fn available(&mut self) -> Result<bool, BoxError> {
        (**self).available()
    }
    fn read_byte_timeout(&mut self, timeout: Duration) -> Result<Option<u8>, BoxError> {
        (**self).read_byte_timeout(timeout)
    }
    fn peek_byte_timeout(&mut self, timeout: Duration) -> Result<Option<u8>, BoxError> {
        (**self).peek_byte_timeout(timeout)
    }
    fn wait_byte(&mut self) -> Result<u8, BoxError> {
        (**self).wait_byte()
    }
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), BoxError> {
        (**self).write_all(bytes)
    }
}
