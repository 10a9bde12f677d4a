//! Conversions from `transducer_config` types into core runtime config.

use crate::config::{Bounds, CalibrationCfg, ChannelsCfg, FilterCfg, StationCfg};

impl From<&transducer_config::ChannelsCfg> for ChannelsCfg {
    fn from(c: &transducer_config::ChannelsCfg) -> Self {
        Self {
            pins: c.pins.iter().copied().take(c.count).collect(),
            default_range_mm: c.default_range_mm,
        }
    }
}

impl From<&transducer_config::FilterCfg> for FilterCfg {
    fn from(f: &transducer_config::FilterCfg) -> Self {
        Self {
            num_samples: f.num_samples.max(1),
            settle_ms: f.settle_ms,
        }
    }
}

impl From<&transducer_config::CalibrationCfg> for CalibrationCfg {
    fn from(c: &transducer_config::CalibrationCfg) -> Self {
        Self {
            samples: c.samples.max(1),
            sample_delay_ms: c.sample_delay_ms,
            unstable_std_dev: c.unstable_std_dev,
            prompt_window_ms: c.prompt_window_ms,
            safe_bounds: Bounds {
                adc_min: c.safe_adc_min,
                adc_max: c.safe_adc_max,
            },
        }
    }
}

impl From<&transducer_config::Config> for StationCfg {
    fn from(c: &transducer_config::Config) -> Self {
        Self {
            channels: (&c.channels).into(),
            filter: (&c.filter).into(),
            calibration: (&c.calibration).into(),
            interval_ms: c.scheduler.interval_ms.max(1),
            adc_resolution: c.adc.resolution,
            record_version: c.storage.record_version,
        }
    }
}
