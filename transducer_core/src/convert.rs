//! Filtered ADC counts to millimeters.

use crate::channel::Channel;

/// Linear map from the calibrated span `[adc_min, adc_max]` onto
/// `[0, range_mm]`, clamped at both ends. Equal bounds map everything to 0.
pub fn to_millimeters(filtered: i32, ch: &Channel) -> f32 {
    if ch.adc_max == ch.adc_min {
        return 0.0;
    }

    let normalized = (filtered - ch.adc_min) as f32 / (ch.adc_max - ch.adc_min) as f32;
    let mm = normalized * ch.range_mm;

    if mm < 0.0 {
        0.0
    } else if mm > ch.range_mm {
        ch.range_mm
    } else {
        mm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Bounds;

    fn channel(adc_min: i32, adc_max: i32, range_mm: f32) -> Channel {
        Channel::new(0, 0, range_mm, Bounds { adc_min, adc_max }, 1)
    }

    #[test]
    fn midpoint_maps_to_half_range() {
        let ch = channel(100, 900, 50.0);
        assert!((to_millimeters(500, &ch) - 25.0).abs() < 1e-4);
    }

    #[test]
    fn clamps_outside_calibrated_travel() {
        let ch = channel(100, 900, 50.0);
        assert_eq!(to_millimeters(0, &ch), 0.0);
        assert_eq!(to_millimeters(1023, &ch), 50.0);
    }

    #[test]
    fn degenerate_bounds_report_zero() {
        let ch = channel(500, 500, 25.0);
        assert_eq!(to_millimeters(0, &ch), 0.0);
        assert_eq!(to_millimeters(500, &ch), 0.0);
        assert_eq!(to_millimeters(1023, &ch), 0.0);
    }
}
