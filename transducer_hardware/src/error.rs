use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("spi error: {0}")]
    Spi(String),
    #[error("serial port error: {0}")]
    Serial(String),
    #[error("adc channel {0} not available")]
    InvalidPin(u8),
    #[error("storage address {addr} outside capacity {capacity}")]
    AddressOutOfRange { addr: usize, capacity: usize },
    #[error("serial input closed")]
    InputClosed,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
