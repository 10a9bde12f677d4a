pub mod clock;
pub mod serial;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use serial::SerialLink;

/// Error type carried across every hardware trait boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Analog-to-digital converter: one synchronous conversion per call.
pub trait Adc {
    fn read(&mut self, pin: u8) -> Result<u16, BoxError>;
}

/// Byte-addressable non-volatile storage (EEPROM-like).
///
/// Erased cells read back as `0xFF`. `update` may skip the write when the
/// stored byte already equals `value`; `flush` makes pending updates durable.
pub trait NvStorage {
    fn capacity(&self) -> usize;
    fn read(&mut self, addr: usize) -> Result<u8, BoxError>;
    fn update(&mut self, addr: usize, value: u8) -> Result<(), BoxError>;
    fn flush(&mut self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<T: Adc + ?Sized> Adc for Box<T> {
    fn read(&mut self, pin: u8) -> Result<u16, BoxError> {
        (**self).read(pin)
    }
}

impl<T: NvStorage + ?Sized> NvStorage for Box<T> {
    fn capacity(&self) -> usize {
        (**self).capacity()
    }
    fn read(&mut self, addr: usize) -> Result<u8, BoxError> {
        (**self).read(addr)
    }
    fn update(&mut self, addr: usize, value: u8) -> Result<(), BoxError> {
        (**self).update(addr, value)
    }
    fn flush(&mut self) -> Result<(), BoxError> {
        (**self).flush()
    }
}
