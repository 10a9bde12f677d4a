//! Channel state and the `ChannelSet` aggregate owned by the station.

use crate::config::{Bounds, StationCfg};
use crate::filter::MovingAverage;

/// One transducer: identity, calibration, output flag and filter state.
#[derive(Debug, Clone)]
pub struct Channel {
    index: usize,
    pin: u8,
    pub enabled: bool,
    pub range_mm: f32,
    pub adc_min: i32,
    pub adc_max: i32,
    filter: MovingAverage,
}

impl Channel {
    pub fn new(index: usize, pin: u8, range_mm: f32, bounds: Bounds, depth: usize) -> Self {
        Self {
            index,
            pin,
            enabled: false,
            range_mm,
            adc_min: bounds.adc_min,
            adc_max: bounds.adc_max,
            filter: MovingAverage::new(depth),
        }
    }

    /// 0-based position in the set.
    pub fn index(&self) -> usize {
        self.index
    }

    /// 1-based number used on the wire and in operator messages.
    pub fn number(&self) -> usize {
        self.index + 1
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            adc_min: self.adc_min,
            adc_max: self.adc_max,
        }
    }

    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.adc_min = bounds.adc_min;
        self.adc_max = bounds.adc_max;
    }

    /// Feed a raw sample through the moving average.
    pub fn filter_sample(&mut self, raw: i32) -> i32 {
        self.filter.update(raw)
    }

    pub fn filtered(&self) -> i32 {
        self.filter.average()
    }

    /// Millimeters for a filtered ADC value under this channel's calibration.
    pub fn to_millimeters(&self, filtered: i32) -> f32 {
        crate::convert::to_millimeters(filtered, self)
    }
}

/// All channels of the station, fixed in number for the process lifetime.
#[derive(Debug, Clone)]
pub struct ChannelSet {
    channels: Vec<Channel>,
    resolution: i32,
    safe_bounds: Bounds,
    default_range_mm: f32,
}

impl ChannelSet {
    pub fn new(cfg: &StationCfg) -> Self {
        let bounds = cfg.calibration.safe_bounds;
        let channels = cfg
            .channels
            .pins
            .iter()
            .enumerate()
            .map(|(i, &pin)| {
                Channel::new(
                    i,
                    pin,
                    cfg.channels.default_range_mm,
                    bounds,
                    cfg.filter.num_samples,
                )
            })
            .collect();
        Self {
            channels,
            resolution: cfg.adc_resolution,
            safe_bounds: bounds,
            default_range_mm: cfg.channels.default_range_mm,
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn resolution(&self) -> i32 {
        self.resolution
    }

    pub fn safe_bounds(&self) -> Bounds {
        self.safe_bounds
    }

    pub fn default_range_mm(&self) -> f32 {
        self.default_range_mm
    }

    pub fn get(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Channel> {
        self.channels.get_mut(index)
    }

    /// Look a channel up by its 1-based wire number; anything outside
    /// `[1, len]` yields `None`.
    pub fn by_number_mut(&mut self, number: i64) -> Option<&mut Channel> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        self.channels.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Channel> {
        self.channels.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Channel> {
        self.channels.iter_mut()
    }

    /// Put one channel back on the safe bounds; its range is kept.
    pub fn reset_bounds(&mut self, index: usize) {
        let safe = self.safe_bounds;
        if let Some(ch) = self.channels.get_mut(index) {
            ch.set_bounds(safe);
        }
    }

    /// Put every channel back on the safe bounds and the configured range.
    pub fn reset_all(&mut self) {
        let (safe, range) = (self.safe_bounds, self.default_range_mm);
        for ch in &mut self.channels {
            ch.set_bounds(safe);
            ch.range_mm = range;
        }
    }

    pub fn any_enabled(&self) -> bool {
        self.channels.iter().any(|c| c.enabled)
    }
}

impl<'a> IntoIterator for &'a ChannelSet {
    type Item = &'a Channel;
    type IntoIter = std::slice::Iter<'a, Channel>;

    fn into_iter(self) -> Self::IntoIter {
        self.channels.iter()
    }
}
