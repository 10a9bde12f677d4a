//! Periodic output line: formatting on the station side, parsing for host tools.
//!
//! Wire format (byte-exact, consumed by existing client tooling):
//!
//! ```text
//! Pot1:12.345,Pot3:0.000\n
//! ```
//!
//! One field per enabled channel, ascending channel order, three decimals,
//! comma separated, newline terminated. No enabled channel means no line.

use std::fmt::Write as _;

use crate::error::AcqError;

/// Label prefix of every field.
pub const LABEL: &str = "Pot";

/// Decimals per value.
pub const DECIMALS: u32 = 3;

/// Largest magnitude printed as a number; beyond it the field reads `ovf`.
const PRINT_LIMIT: f32 = 4_294_967_040.0;

/// One channel's value at one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// 1-based channel number
    pub channel: usize,
    /// Filtered ADC counts; not transmitted
    pub filtered: i32,
    pub mm: f32,
}

/// Render readings as one output line, or `None` when there are none.
pub fn format_line(readings: &[Reading]) -> Option<String> {
    if readings.is_empty() {
        return None;
    }
    let mut line = String::with_capacity(readings.len() * 12);
    for (i, r) in readings.iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        // writing into a String cannot fail
        let _ = write!(line, "{LABEL}{}:", r.channel);
        push_decimal(&mut line, r.mm, DECIMALS);
    }
    line.push('\n');
    Some(line)
}

/// Append `value` with `digits` decimals the way the station firmware prints
/// floats: add half a unit of the last digit, then truncate digit by digit,
/// all in `f32`. Exact ties therefore round up, unlike `{:.3}`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn push_decimal(out: &mut String, value: f32, digits: u32) {
    if value.is_nan() {
        out.push_str("nan");
        return;
    }
    if value.is_infinite() {
        out.push_str("inf");
        return;
    }
    if value > PRINT_LIMIT || value < -PRINT_LIMIT {
        out.push_str("ovf");
        return;
    }

    let mut number = value;
    if number < 0.0 {
        out.push('-');
        number = -number;
    }
    let mut rounding = 0.5_f32;
    for _ in 0..digits {
        rounding /= 10.0;
    }
    number += rounding;

    let int_part = number as u32;
    let mut remainder = number - int_part as f32;
    let _ = write!(out, "{int_part}");
    if digits > 0 {
        out.push('.');
    }
    for _ in 0..digits {
        remainder *= 10.0;
        let digit = remainder as u32;
        let _ = write!(out, "{digit}");
        remainder -= digit as f32;
    }
}

/// Parse a line produced by `format_line` into `(channel, mm)` pairs.
///
/// Trailing `\r`/`\n` are ignored. Lines that are not telemetry (operator
/// prompts, menus) fail with `AcqError::Record`.
pub fn parse_line(line: &str) -> Result<Vec<(usize, f32)>, AcqError> {
    let body = line.trim_end_matches(['\r', '\n']);
    if body.is_empty() {
        return Err(AcqError::Record("empty telemetry line".into()));
    }
    body.split(',')
        .map(|field| {
            let rest = field
                .strip_prefix(LABEL)
                .ok_or_else(|| AcqError::Record(format!("field {field:?} lacks {LABEL} label")))?;
            let (num, value) = rest
                .split_once(':')
                .ok_or_else(|| AcqError::Record(format!("field {field:?} lacks ':'")))?;
            let channel: usize = num
                .parse()
                .map_err(|_| AcqError::Record(format!("bad channel number in {field:?}")))?;
            let mm: f32 = value
                .parse()
                .map_err(|_| AcqError::Record(format!("bad value in {field:?}")))?;
            if channel == 0 {
                return Err(AcqError::Record(format!("channel 0 in {field:?}")));
            }
            Ok((channel, mm))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use crate::config::Bounds;
    use rstest::rstest;

    fn r(channel: usize, mm: f32) -> Reading {
        Reading {
            channel,
            filtered: 0,
            mm,
        }
    }

    #[test]
    fn formats_three_decimals_in_given_order() {
        let line = format_line(&[r(1, 12.3456), r(3, 0.0)]).unwrap();
        assert_eq!(line, "Pot1:12.346,Pot3:0.000\n");
    }

    #[test]
    fn exact_ties_round_up_like_the_firmware() {
        // bounds 100/500, range 25, filtered 101: exactly 0.0625 mm
        let ch = Channel::new(0, 0, 25.0, Bounds { adc_min: 100, adc_max: 500 }, 1);
        let mm = ch.to_millimeters(101);
        assert_eq!(mm, 0.0625);
        assert_eq!(format_line(&[r(1, mm)]).unwrap(), "Pot1:0.063\n");
    }

    #[rstest]
    #[case(0.0625, "0.063")]
    #[case(0.0, "0.000")]
    #[case(12.5, "12.500")]
    #[case(24.9999, "25.000")]
    #[case(-1.25, "-1.250")]
    // 2.5625 + 0.0005 lands just below 2.563 in f32
    #[case(2.5625, "2.562")]
    #[case(f32::NAN, "nan")]
    #[case(f32::INFINITY, "inf")]
    #[case(5.0e9, "ovf")]
    fn renders_like_serial_print(#[case] value: f32, #[case] expected: &str) {
        let mut out = String::new();
        push_decimal(&mut out, value, DECIMALS);
        assert_eq!(out, expected);
    }

    #[test]
    fn no_readings_no_line() {
        assert!(format_line(&[]).is_none());
    }

    #[test]
    fn parses_formatted_line() {
        let parsed = parse_line("Pot2:25.000,Pot5:3.142\r\n").unwrap();
        assert_eq!(parsed, vec![(2, 25.0), (5, 3.142)]);
    }

    #[test]
    fn rejects_operator_chatter() {
        assert!(parse_line("Press ENTER to continue...\n").is_err());
        assert!(parse_line("\n").is_err());
        assert!(parse_line("Pot0:1.000\n").is_err());
    }
}
