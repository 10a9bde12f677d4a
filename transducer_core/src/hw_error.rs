//! Maps `Box<dyn Error>` from trait boundaries to typed `AcqError`.
//!
//! The traits in `transducer_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `transducer_hardware::HwError` downcasting.

use transducer_traits::BoxError;

use crate::error::AcqError;

/// Which collaborator produced the error; used when no typed mapping applies.
#[derive(Debug, Clone, Copy)]
pub enum Origin {
    Adc,
    Link,
    Storage,
}

/// Map a trait-boundary error to a typed `AcqError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static), origin: Origin) -> AcqError {
    #[cfg(feature = "hardware-errors")]
    {
        use transducer_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::InputClosed => AcqError::InputClosed,
                HwError::Serial(s) => AcqError::Link(s.clone()),
                HwError::Spi(_) | HwError::InvalidPin(_) => AcqError::Adc(hw.to_string()),
                HwError::AddressOutOfRange { .. } => AcqError::Storage(hw.to_string()),
                HwError::Io(io) => AcqError::Io(io.to_string()),
            };
        }
    }

    // Fallback: string-based detection
    let s = e.to_string();
    if s.to_lowercase().contains("closed") {
        return AcqError::InputClosed;
    }
    match origin {
        Origin::Adc => AcqError::Adc(s),
        Origin::Link => AcqError::Link(s),
        Origin::Storage => AcqError::Storage(s),
    }
}

/// `?`-friendly conversion for results coming straight from a device trait.
pub trait HwResultExt<T> {
    fn or_hw(self, origin: Origin) -> Result<T, AcqError>;
}

impl<T> HwResultExt<T> for Result<T, BoxError> {
    fn or_hw(self, origin: Origin) -> Result<T, AcqError> {
        self.map_err(|e| map_hw_error(e.as_ref(), origin))
    }
}
