//! Calibration math: bound validation and the per-position estimator.
//!
//! The estimator takes a burst of raw samples at one physical position and
//! picks a single ADC code for it. The statistical mode is preferred; the mean
//! is used instead when the two disagree by more than two standard deviations.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, warn};
use transducer_traits::{Adc, Clock};

use crate::channel::{Channel, ChannelSet};
use crate::error::{AcqError, CalibrationFault, Result};
use crate::hw_error::{HwResultExt, Origin};

/// Check a channel's bounds against the converter resolution.
///
/// Fails when either bound is outside `[0, resolution)` or when
/// `adc_max <= adc_min`. The first failing condition is reported.
pub fn validate(ch: &Channel, resolution: i32) -> std::result::Result<(), CalibrationFault> {
    let channel = ch.number();
    if ch.adc_min < 0 || ch.adc_min >= resolution {
        return Err(CalibrationFault::MinOutOfRange {
            channel,
            value: ch.adc_min,
            resolution,
        });
    }
    if ch.adc_max < 0 || ch.adc_max >= resolution {
        return Err(CalibrationFault::MaxOutOfRange {
            channel,
            value: ch.adc_max,
            resolution,
        });
    }
    if ch.adc_max <= ch.adc_min {
        return Err(CalibrationFault::NotIncreasing {
            channel,
            adc_min: ch.adc_min,
            adc_max: ch.adc_max,
        });
    }
    Ok(())
}

/// Every fault in `set`: bounds via `validate`, plus non-positive ranges.
///
/// Used wherever a whole record is adopted at once (storage load, table
/// import), so a partially valid record is never taken.
pub fn validate_set(set: &ChannelSet) -> Vec<CalibrationFault> {
    let mut faults = Vec::new();
    for ch in set {
        if let Err(fault) = validate(ch, set.resolution()) {
            faults.push(fault);
        }
        if !(ch.range_mm.is_finite() && ch.range_mm > 0.0) {
            faults.push(CalibrationFault::RangeNotPositive {
                channel: ch.number(),
                value: ch.range_mm,
            });
        }
    }
    faults
}

/// Which statistic ended up representing the position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Estimate {
    Mode,
    Mean,
}

/// Summary of one calibration burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionStats {
    /// Truncated arithmetic mean
    pub mean: i32,
    /// Truncated population standard deviation around `mean`
    pub std_dev: i32,
    /// Most frequent code; earliest wins ties
    pub mode: i32,
    /// Code chosen for the position
    pub value: i32,
    pub estimate: Estimate,
    /// `std_dev` exceeded the instability threshold
    pub unstable: bool,
}

/// Reduce a burst of raw samples to one calibration code.
///
/// Returns `None` for an empty burst.
pub fn analyze_samples(samples: &[i32], unstable_std_dev: i32) -> Option<PositionStats> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len() as i64;

    let sum: i64 = samples.iter().map(|&s| i64::from(s)).sum();
    let mean = (sum / n) as i32;

    // Deviations are taken from the truncated mean; the variance is an
    // integer quotient before the square root, and the root is truncated.
    let sum_sq: i64 = samples
        .iter()
        .map(|&s| {
            let d = i64::from(s) - i64::from(mean);
            d * d
        })
        .sum();
    let std_dev = ((sum_sq / n) as f64).sqrt() as i32;

    let mode = first_mode(samples);

    let (value, estimate) = if i64::from(mode - mean).abs() > 2 * i64::from(std_dev) {
        (mean, Estimate::Mean)
    } else {
        (mode, Estimate::Mode)
    };

    Some(PositionStats {
        mean,
        std_dev,
        mode,
        value,
        estimate,
        unstable: std_dev > unstable_std_dev,
    })
}

/// Most frequent value; among equal counts the value seen first wins.
fn first_mode(samples: &[i32]) -> i32 {
    let mut counts: HashMap<i32, u32> = HashMap::with_capacity(samples.len());
    for &s in samples {
        *counts.entry(s).or_insert(0) += 1;
    }
    let mut mode = 0;
    let mut best = 0;
    for &s in samples {
        let c = counts.get(&s).copied().unwrap_or(0);
        if c > best {
            best = c;
            mode = s;
        }
    }
    mode
}

/// Take `count` raw samples from `pin`, pausing `delay` after each one.
///
/// This is its own dense sampling pass; the channel's moving average is not
/// touched.
pub fn sample_position(
    adc: &mut dyn Adc,
    clock: &dyn Clock,
    pin: u8,
    count: usize,
    delay: Duration,
) -> Result<Vec<i32>> {
    let mut samples = Vec::with_capacity(count);
    for _ in 0..count {
        let raw = adc.read(pin).or_hw(Origin::Adc)?;
        samples.push(i32::from(raw));
        clock.sleep(delay);
    }
    Ok(samples)
}

/// Sample a position and reduce it to a `PositionStats`.
pub fn calibrate_position(
    adc: &mut dyn Adc,
    clock: &dyn Clock,
    pin: u8,
    count: usize,
    delay: Duration,
    unstable_std_dev: i32,
) -> Result<PositionStats> {
    let samples = sample_position(adc, clock, pin, count, delay)?;
    let stats = analyze_samples(&samples, unstable_std_dev)
        .ok_or_else(|| AcqError::State("calibration burst produced no samples".into()))?;
    debug!(
        pin,
        mean = stats.mean,
        std_dev = stats.std_dev,
        mode = stats.mode,
        value = stats.value,
        "calibration burst analyzed"
    );
    if stats.unstable {
        warn!(pin, std_dev = stats.std_dev, "unstable calibration readings");
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Bounds;

    fn ch(adc_min: i32, adc_max: i32) -> Channel {
        Channel::new(1, 1, 25.0, Bounds { adc_min, adc_max }, 1)
    }

    #[test]
    fn validate_boundaries() {
        assert!(matches!(
            validate(&ch(-1, 950), 1024),
            Err(CalibrationFault::MinOutOfRange { value: -1, .. })
        ));
        assert!(matches!(
            validate(&ch(100, 1024), 1024),
            Err(CalibrationFault::MaxOutOfRange { value: 1024, .. })
        ));
        assert!(matches!(
            validate(&ch(500, 500), 1024),
            Err(CalibrationFault::NotIncreasing { .. })
        ));
        assert!(validate(&ch(100, 950), 1024).is_ok());
        assert!(validate(&ch(0, 1023), 1024).is_ok());
    }

    #[test]
    fn fault_messages_name_the_channel() {
        let err = validate(&ch(600, 200), 1024).unwrap_err();
        assert_eq!(
            err.to_string(),
            "channel 2: adc_max (200) must be greater than adc_min (600)"
        );
    }

    #[test]
    fn constant_burst_has_zero_spread() {
        let s = analyze_samples(&[512; 100], 10).unwrap();
        assert_eq!((s.mean, s.std_dev, s.mode, s.value), (512, 0, 512, 512));
        assert_eq!(s.estimate, Estimate::Mode);
        assert!(!s.unstable);
    }

    #[test]
    fn mode_tie_keeps_first_seen() {
        assert_eq!(first_mode(&[7, 3, 3, 7]), 7);
        assert_eq!(first_mode(&[3, 7, 7, 3]), 3);
    }

    #[test]
    fn empty_burst_is_none() {
        assert!(analyze_samples(&[], 10).is_none());
    }
}
