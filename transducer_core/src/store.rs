//! Versioned calibration record in non-volatile storage.
//!
//! Layout, little-endian, no length prefix and no checksum:
//!
//! ```text
//! [u8 version][N x i16 adc_min][N x i16 adc_max][N x f32 range_mm]
//! ```
//!
//! Fields are grouped by kind across channels, not interleaved per channel.
//! A version byte of `0xFF` is an erased part: "no calibration", never corrupt.

use tracing::{debug, info, warn};
use transducer_config::{
    RECORD_FLOAT_WIDTH as FLOAT_WIDTH, RECORD_INT_WIDTH as INT_WIDTH,
    RECORD_VERSION_WIDTH as VERSION_WIDTH,
};
use transducer_traits::NvStorage;

pub use transducer_config::record_len;

use crate::calibration::validate_set;
use crate::channel::ChannelSet;
use crate::error::{AcqError, CalibrationFault, Result};
use crate::hw_error::{HwResultExt, Origin};

/// Version byte of a never-written part.
pub const ERASED_VERSION: u8 = 0xFF;

/// Result of reading the record back.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Record present, current schema, every channel valid; adopted.
    Loaded,
    /// Version byte is the erased marker; channels untouched.
    Erased,
    /// Some other schema; nothing past the version byte was read.
    VersionMismatch { found: u8, expected: u8 },
    /// Current schema but at least one channel failed validation; every
    /// channel was reset to the safe defaults.
    Invalid(Vec<CalibrationFault>),
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded)
    }
}

/// Decoded record fields, one entry per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub version: u8,
    pub adc_min: Vec<i32>,
    pub adc_max: Vec<i32>,
    pub range_mm: Vec<f32>,
}

/// Stored bounds are 16-bit; anything wider saturates.
#[inline]
fn to_i16(v: i32) -> i16 {
    v.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

/// Serialize the current calibration of `set` under `version`.
pub fn encode(set: &ChannelSet, version: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(record_len(set.len()));
    out.push(version);
    for ch in set {
        out.extend_from_slice(&to_i16(ch.adc_min).to_le_bytes());
    }
    for ch in set {
        out.extend_from_slice(&to_i16(ch.adc_max).to_le_bytes());
    }
    for ch in set {
        out.extend_from_slice(&ch.range_mm.to_le_bytes());
    }
    out
}

/// Parse a record for `channels` channels from `bytes`.
///
/// Only the layout is checked; the version byte is returned as found.
pub fn decode(bytes: &[u8], channels: usize) -> std::result::Result<Record, AcqError> {
    let need = record_len(channels);
    if bytes.len() < need {
        return Err(AcqError::Record(format!(
            "need {need} bytes for {channels} channels, got {}",
            bytes.len()
        )));
    }
    let version = bytes[0];
    let ints = |start: usize| -> Vec<i32> {
        bytes[start..start + channels * INT_WIDTH]
            .chunks_exact(INT_WIDTH)
            .map(|c| i32::from(i16::from_le_bytes([c[0], c[1]])))
            .collect()
    };
    let adc_min = ints(VERSION_WIDTH);
    let adc_max = ints(VERSION_WIDTH + channels * INT_WIDTH);
    let floats_at = VERSION_WIDTH + 2 * channels * INT_WIDTH;
    let range_mm = bytes[floats_at..floats_at + channels * FLOAT_WIDTH]
        .chunks_exact(FLOAT_WIDTH)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok(Record {
        version,
        adc_min,
        adc_max,
        range_mm,
    })
}

/// Read the raw record region for `channels` channels.
pub fn read_record(storage: &mut dyn NvStorage, channels: usize) -> Result<Record> {
    let len = record_len(channels);
    check_capacity(storage, len)?;
    let mut bytes = Vec::with_capacity(len);
    for addr in 0..len {
        bytes.push(storage.read(addr).or_hw(Origin::Storage)?);
    }
    Ok(decode(&bytes, channels)?)
}

fn check_capacity(storage: &dyn NvStorage, len: usize) -> Result<()> {
    if storage.capacity() < len {
        return Err(AcqError::Storage(format!(
            "record needs {len} bytes, storage holds {}",
            storage.capacity()
        ))
        .into());
    }
    Ok(())
}

/// Persists and restores the calibration of a `ChannelSet`.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationStore {
    version: u8,
}

impl CalibrationStore {
    pub fn new(version: u8) -> Self {
        Self { version }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Write the whole record. Unchanged bytes are skipped by the medium; the
    /// result is still a full overwrite of the record region.
    pub fn save(&self, storage: &mut dyn NvStorage, set: &ChannelSet) -> Result<()> {
        let bytes = encode(set, self.version);
        check_capacity(storage, bytes.len())?;
        for (addr, &b) in bytes.iter().enumerate() {
            storage.update(addr, b).or_hw(Origin::Storage)?;
        }
        storage.flush().or_hw(Origin::Storage)?;
        info!(
            version = self.version,
            bytes = bytes.len(),
            "calibration saved"
        );
        Ok(())
    }

    /// Restore calibration into `set`.
    ///
    /// A record is adopted all-or-nothing: if any channel fails validation the
    /// whole set is reset to the safe defaults.
    pub fn load(&self, storage: &mut dyn NvStorage, set: &mut ChannelSet) -> Result<LoadOutcome> {
        check_capacity(storage, record_len(set.len()))?;
        let version = storage.read(0).or_hw(Origin::Storage)?;
        if version == ERASED_VERSION {
            info!("calibration storage erased, keeping defaults");
            return Ok(LoadOutcome::Erased);
        }
        if version != self.version {
            warn!(
                found = version,
                expected = self.version,
                "calibration record version mismatch, keeping defaults"
            );
            return Ok(LoadOutcome::VersionMismatch {
                found: version,
                expected: self.version,
            });
        }

        let record = read_record(storage, set.len())?;
        for (i, ch) in set.iter_mut().enumerate() {
            ch.adc_min = record.adc_min[i];
            ch.adc_max = record.adc_max[i];
            ch.range_mm = record.range_mm[i];
        }

        let faults = validate_set(set);
        if faults.is_empty() {
            debug!(channels = set.len(), "calibration record verified");
            Ok(LoadOutcome::Loaded)
        } else {
            for f in &faults {
                warn!(fault = %f, "stored calibration rejected");
            }
            set.reset_all();
            Ok(LoadOutcome::Invalid(faults))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StationCfg;

    #[test]
    fn record_len_matches_five_channel_image() {
        assert_eq!(record_len(5), 41);
        assert_eq!(record_len(4), 33);
    }

    #[test]
    fn encoded_record_fills_what_config_validation_reserves() {
        let set = ChannelSet::new(&StationCfg::default());
        assert_eq!(set.len(), transducer_config::MAX_CHANNELS);
        assert_eq!(
            encode(&set, 1).len(),
            transducer_config::record_len(transducer_config::MAX_CHANNELS)
        );
    }

    #[test]
    fn encode_groups_fields_by_kind() {
        let mut set = ChannelSet::new(&StationCfg {
            channels: crate::config::ChannelsCfg {
                pins: vec![0, 1],
                default_range_mm: 25.0,
            },
            ..StationCfg::default()
        });
        set.get_mut(0).unwrap().adc_min = 0x0102;
        set.get_mut(1).unwrap().adc_min = 0x0304;
        let bytes = encode(&set, 3);
        assert_eq!(bytes.len(), record_len(2));
        assert_eq!(&bytes[..5], &[3, 0x02, 0x01, 0x04, 0x03]);
        // 950 = 0x03B6, both maxima follow the minima
        assert_eq!(&bytes[5..9], &[0xB6, 0x03, 0xB6, 0x03]);
        assert_eq!(&bytes[9..13], &25.0f32.to_le_bytes());
    }

    #[test]
    fn decode_rejects_short_input() {
        let err = decode(&[3, 0, 0], 5).unwrap_err();
        assert!(err.to_string().contains("need 41 bytes"));
    }
}
