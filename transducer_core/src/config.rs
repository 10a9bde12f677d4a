//! Runtime configuration consumed by the core, decoupled from the TOML schema.

/// Calibration bounds written into a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub adc_min: i32,
    pub adc_max: i32,
}

/// Bounds substituted for a rejected calibration.
pub const SAFE_BOUNDS: Bounds = Bounds {
    adc_min: 100,
    adc_max: 950,
};

/// Number of codes of the stock 10-bit converter.
pub const ADC_RESOLUTION: i32 = 1024;

/// Schema version of the persisted calibration record.
pub const RECORD_VERSION: u8 = 0x03;

#[derive(Debug, Clone)]
pub struct ChannelsCfg {
    /// One entry per channel, in channel order
    pub pins: Vec<u8>,
    pub default_range_mm: f32,
}

impl Default for ChannelsCfg {
    fn default() -> Self {
        Self {
            pins: vec![0, 1, 2, 3, 4],
            default_range_mm: 25.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterCfg {
    pub num_samples: usize,
    pub settle_ms: u64,
}

impl Default for FilterCfg {
    fn default() -> Self {
        Self {
            num_samples: 10,
            settle_ms: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CalibrationCfg {
    pub samples: usize,
    pub sample_delay_ms: u64,
    pub unstable_std_dev: i32,
    pub prompt_window_ms: u64,
    pub safe_bounds: Bounds,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            samples: 100,
            sample_delay_ms: 20,
            unstable_std_dev: 10,
            prompt_window_ms: 5000,
            safe_bounds: SAFE_BOUNDS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StationCfg {
    pub channels: ChannelsCfg,
    pub filter: FilterCfg,
    pub calibration: CalibrationCfg,
    pub interval_ms: u32,
    pub adc_resolution: i32,
    pub record_version: u8,
}

impl Default for StationCfg {
    fn default() -> Self {
        Self {
            channels: ChannelsCfg::default(),
            filter: FilterCfg::default(),
            calibration: CalibrationCfg::default(),
            interval_ms: 100,
            adc_resolution: ADC_RESOLUTION,
            record_version: RECORD_VERSION,
        }
    }
}
