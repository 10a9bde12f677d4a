#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Acquisition and calibration core for displacement transducers (hardware-agnostic).
//!
//! All device access goes through `transducer_traits::{Adc, SerialLink,
//! NvStorage, Clock}`; nothing here knows about SPI, UARTs or files.
//!
//! ## Architecture
//!
//! - **Filter**: per-channel moving average over raw ADC codes (`filter`)
//! - **Converter**: filtered code to millimeters, clamped to the range (`convert`)
//! - **Calibrator**: mode/mean estimator and validity check (`calibration`),
//!   operator session state machine (`session`)
//! - **Store**: versioned fixed-layout record in EEPROM-like storage (`store`)
//! - **Dispatcher**: single-byte command protocol (`command`, `station`)
//! - **Scheduler**: wraparound-safe fixed-interval tick (`scheduler`)
//!
//! `Station` ties these together and owns the `ChannelSet`; there is no
//! global state and exactly one executor.
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use transducer_core::{Station, StationCfg};
//! use transducer_hardware::{MemEeprom, SimulatedAdc, StdioLink};
//!
//! # fn main() -> eyre::Result<()> {
//! let mut station = Station::builder()
//!     .with_adc(SimulatedAdc::new(5))
//!     .with_link(StdioLink::spawn())
//!     .with_storage(MemEeprom::new(1024))
//!     .with_config(StationCfg::default())
//!     .build()?;
//! station.startup()?;
//! station.run(&AtomicBool::new(false))?;
//! # Ok(())
//! # }
//! ```

pub mod calibration;
pub mod channel;
pub mod command;
pub mod config;
pub mod conversions;
pub mod convert;
pub mod error;
pub mod filter;
pub mod hw_error;
pub mod import;
pub mod mocks;
pub mod scheduler;
pub mod session;
pub mod station;
pub mod store;
pub mod telemetry;
pub mod util;

pub use calibration::{Estimate, PositionStats, analyze_samples, validate, validate_set};
pub use channel::{Channel, ChannelSet};
pub use command::CommandKind;
pub use config::{Bounds, StationCfg};
pub use error::{AcqError, BuildError, CalibrationFault, Report, Result};
pub use filter::MovingAverage;
pub use session::{SessionReport, SessionState};
pub use station::{Poll, StartupReport, Station, StationBuilder};
pub use store::{CalibrationStore, LoadOutcome};
pub use telemetry::Reading;
