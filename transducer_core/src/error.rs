use thiserror::Error;

/// Reason a channel's calibration bounds were rejected.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibrationFault {
    #[error("channel {channel}: adc_min {value} outside [0, {resolution})")]
    MinOutOfRange {
        channel: usize,
        value: i32,
        resolution: i32,
    },
    #[error("channel {channel}: adc_max {value} outside [0, {resolution})")]
    MaxOutOfRange {
        channel: usize,
        value: i32,
        resolution: i32,
    },
    #[error("channel {channel}: adc_max ({adc_max}) must be greater than adc_min ({adc_min})")]
    NotIncreasing {
        channel: usize,
        adc_min: i32,
        adc_max: i32,
    },
    #[error("channel {channel}: range_mm {value} must be a positive number")]
    RangeNotPositive { channel: usize, value: f32 },
}

#[derive(Debug, Error, Clone)]
pub enum AcqError {
    #[error("adc error: {0}")]
    Adc(String),
    #[error("serial link error: {0}")]
    Link(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("operator input closed")]
    InputClosed,
    #[error("calibration record: {0}")]
    Record(String),
    #[error("invalid state: {0}")]
    State(String),
    #[error("io error: {0}")]
    Io(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing adc")]
    MissingAdc,
    #[error("missing serial link")]
    MissingLink,
    #[error("missing storage")]
    MissingStorage,
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
