//! Fixed-interval acquisition tick.

use std::time::Duration;

use tracing::trace;
use transducer_traits::{Adc, Clock};

use crate::channel::ChannelSet;
use crate::error::Result;
use crate::hw_error::{HwResultExt, Origin};
use crate::telemetry::Reading;

/// Decides when the next tick is due on a wrapping 32-bit millisecond clock.
#[derive(Debug, Clone)]
pub struct Scheduler {
    interval_ms: u32,
    previous_ms: u32,
}

impl Scheduler {
    pub fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms,
            previous_ms: 0,
        }
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    /// True (and re-armed) once `interval_ms` has elapsed since the last due
    /// tick. The unsigned subtraction stays correct across counter wrap.
    pub fn due(&mut self, now_ms: u32) -> bool {
        if now_ms.wrapping_sub(self.previous_ms) >= self.interval_ms {
            self.previous_ms = now_ms;
            true
        } else {
            false
        }
    }
}

/// Sample, filter and convert every enabled channel in ascending order.
///
/// Each enabled channel gets exactly one raw read followed by a `settle`
/// pause. Disabled channels are not read and their filters do not advance.
pub fn sample_enabled(
    channels: &mut ChannelSet,
    adc: &mut dyn Adc,
    clock: &dyn Clock,
    settle: Duration,
) -> Result<Vec<Reading>> {
    let mut readings = Vec::new();
    for ch in channels.iter_mut().filter(|c| c.enabled) {
        let raw = adc.read(ch.pin()).or_hw(Origin::Adc)?;
        clock.sleep(settle);
        let filtered = ch.filter_sample(i32::from(raw));
        let mm = ch.to_millimeters(filtered);
        trace!(channel = ch.number(), raw, filtered, mm, "tick sample");
        readings.push(Reading {
            channel: ch.number(),
            filtered,
            mm,
        });
    }
    Ok(readings)
}

#[cfg(test)]
mod tests {
    use super::Scheduler;

    #[test]
    fn fires_on_interval_boundaries() {
        let mut s = Scheduler::new(100);
        assert!(!s.due(50));
        assert!(s.due(100));
        assert!(!s.due(199));
        assert!(s.due(200));
    }

    #[test]
    fn survives_counter_wraparound() {
        let mut s = Scheduler::new(100);
        assert!(s.due(u32::MAX - 20));
        assert!(!s.due(u32::MAX));
        // 79 ms after the wrap is 100 ms after the last tick
        assert!(s.due(79));
    }
}
