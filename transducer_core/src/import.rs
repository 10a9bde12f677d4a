//! Applying externally prepared calibration tables.

use tracing::{info, warn};
use transducer_config::CalibrationRow;

use crate::calibration::validate_set;
use crate::channel::ChannelSet;
use crate::error::CalibrationFault;

/// Apply `rows` to `set`, all-or-nothing.
///
/// Rows are staged on a copy of the set and every channel of the copy is
/// validated, including channels the table does not mention. The set is only
/// updated when no channel faults. Rows naming a channel the set does not have
/// are skipped.
pub fn apply_rows(set: &mut ChannelSet, rows: &[CalibrationRow]) -> Result<(), Vec<CalibrationFault>> {
    let mut staged = set.clone();
    for row in rows {
        let Some(ch) = row
            .channel
            .checked_sub(1)
            .and_then(|i| staged.get_mut(i))
        else {
            warn!(channel = row.channel, "calibration row for unknown channel skipped");
            continue;
        };
        ch.adc_min = row.adc_min;
        ch.adc_max = row.adc_max;
        ch.range_mm = row.range_mm;
    }

    let faults = validate_set(&staged);
    if !faults.is_empty() {
        return Err(faults);
    }

    info!(rows = rows.len(), "calibration table applied");
    *set = staged;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StationCfg;

    fn row(channel: usize, adc_min: i32, adc_max: i32, range_mm: f32) -> CalibrationRow {
        CalibrationRow {
            channel,
            adc_min,
            adc_max,
            range_mm,
        }
    }

    #[test]
    fn applies_valid_table() {
        let mut set = ChannelSet::new(&StationCfg::default());
        apply_rows(&mut set, &[row(2, 12, 1000, 40.0)]).unwrap();
        let ch = set.get(1).unwrap();
        assert_eq!((ch.adc_min, ch.adc_max, ch.range_mm), (12, 1000, 40.0));
        assert_eq!(set.get(0).unwrap().adc_min, 100);
    }

    #[test]
    fn one_bad_row_changes_nothing() {
        let mut set = ChannelSet::new(&StationCfg::default());
        let faults = apply_rows(&mut set, &[row(1, 10, 900, 30.0), row(3, 800, 200, 25.0)])
            .unwrap_err();
        assert_eq!(faults.len(), 1);
        assert!(matches!(
            faults[0],
            CalibrationFault::NotIncreasing { channel: 3, .. }
        ));
        assert_eq!(set.get(0).unwrap().adc_min, 100);
        assert_eq!(set.get(0).unwrap().range_mm, 25.0);
    }
}
