//! Simulated transducers for running the station without an ADC attached.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;
use transducer_traits::{Adc, BoxError};

use crate::error::HwError;

/// Full-scale count of the simulated 10-bit converter.
pub const SIM_FULL_SCALE: u16 = 1023;

/// Simulated ADC: every pin holds a level, reads return the level plus
/// bounded pseudo-random noise. Levels are shared with `SimHandle`s so a test
/// or the CLI can move a "wiper" while the station owns the ADC.
pub struct SimulatedAdc {
    levels: Rc<RefCell<Vec<u16>>>,
    noise: u16,
    state: u32,
}

/// Shared handle to the levels of a `SimulatedAdc`.
#[derive(Clone)]
pub struct SimHandle {
    levels: Rc<RefCell<Vec<u16>>>,
}

impl SimHandle {
    pub fn set_level(&self, pin: u8, level: u16) {
        if let Some(slot) = self.levels.borrow_mut().get_mut(usize::from(pin)) {
            *slot = level.min(SIM_FULL_SCALE);
        }
    }

    pub fn level(&self, pin: u8) -> Option<u16> {
        self.levels.borrow().get(usize::from(pin)).copied()
    }
}

impl SimulatedAdc {
    /// `pins` channels, all parked at mid-scale, no noise.
    pub fn new(pins: usize) -> Self {
        Self::with_levels(vec![SIM_FULL_SCALE / 2; pins])
    }

    pub fn with_levels(levels: Vec<u16>) -> Self {
        Self {
            levels: Rc::new(RefCell::new(levels)),
            noise: 0,
            state: 0x9E37_79B9,
        }
    }

    /// Add uniform noise in `[-amplitude, +amplitude]` counts to every read.
    pub fn with_noise(mut self, amplitude: u16) -> Self {
        self.noise = amplitude;
        self
    }

    pub fn handle(&self) -> SimHandle {
        SimHandle {
            levels: self.levels.clone(),
        }
    }

    // xorshift32
    fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }
}

impl Adc for SimulatedAdc {
    fn read(&mut self, pin: u8) -> Result<u16, BoxError> {
        let level = self
            .levels
            .borrow()
            .get(usize::from(pin))
            .copied()
            .ok_or(HwError::InvalidPin(pin))?;
        let value = if self.noise == 0 {
            level
        } else {
            let span = u32::from(self.noise) * 2 + 1;
            let delta = (self.next_u32() % span) as i32 - i32::from(self.noise);
            (i32::from(level) + delta).clamp(0, i32::from(SIM_FULL_SCALE)) as u16
        };
        trace!(pin, raw = value, "simulated adc read");
        Ok(value)
    }
}
