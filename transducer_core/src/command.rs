//! Single-byte command protocol read from the serial link.
//!
//! | byte    | action                                  |
//! |---------|-----------------------------------------|
//! | `C` `c` | interactive calibration session         |
//! | `R` `r` | `<index>,<range>` line: set range, save |
//! | `E`     | `<index>`: enable channel output        |
//! | `D`     | `<index>`: disable channel output       |
//!
//! Everything else is ignored. `E`/`D` are uppercase only.

use thiserror::Error;

/// Usage hint printed after a rejected range command.
pub const RANGE_USAGE: &str = "Format: R<index>,<range> (e.g. R1,50.0)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Calibrate,
    SetRange,
    Enable,
    Disable,
}

impl CommandKind {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'C' | b'c' => Some(Self::Calibrate),
            b'R' | b'r' => Some(Self::SetRange),
            b'E' => Some(Self::Enable),
            b'D' => Some(Self::Disable),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeCommandError {
    /// No comma, or nothing before it.
    #[error("Error: bad format")]
    Format,
    /// Index outside `[1, channels]` or range not strictly positive.
    #[error("Error: invalid index or range")]
    InvalidValue,
}

/// Parse the argument line of an `R` command.
///
/// Returns the 0-based channel index and the new range. Numbers are read
/// leniently: a leading numeric prefix is taken and trailing junk ignored,
/// and a field with no numeric prefix reads as zero (and is then rejected by
/// the range check).
pub fn parse_range_args(line: &str, channels: usize) -> Result<(usize, f32), RangeCommandError> {
    let line = line.trim();
    let comma = match line.find(',') {
        Some(i) if i > 0 => i,
        _ => return Err(RangeCommandError::Format),
    };
    let number = lenient_int(&line[..comma]);
    let range = lenient_float(&line[comma + 1..]);

    let index = usize::try_from(number)
        .ok()
        .and_then(|n| n.checked_sub(1))
        .filter(|&i| i < channels)
        .ok_or(RangeCommandError::InvalidValue)?;
    if !(range.is_finite() && range > 0.0) {
        return Err(RangeCommandError::InvalidValue);
    }
    Ok((index, range))
}

/// Longest prefix of `s` (after leading whitespace) that `accept` keeps
/// growing, parsed with `parse`.
fn numeric_prefix<T: std::str::FromStr + Default>(s: &str, accept: impl Fn(&str) -> bool) -> T {
    let s = s.trim_start();
    let mut end = 0;
    for (i, c) in s.char_indices() {
        let next = i + c.len_utf8();
        if !accept(&s[..next]) {
            break;
        }
        end = next;
    }
    s[..end].parse().unwrap_or_default()
}

fn lenient_int(s: &str) -> i64 {
    numeric_prefix(s, |p| {
        let digits = p.strip_prefix(['-', '+']).unwrap_or(p);
        digits.bytes().all(|b| b.is_ascii_digit())
    })
}

fn lenient_float(s: &str) -> f32 {
    numeric_prefix(s, |p| {
        let body = p.strip_prefix(['-', '+']).unwrap_or(p);
        let mut dot = false;
        body.bytes().all(|b| match b {
            b'0'..=b'9' => true,
            b'.' if !dot => {
                dot = true;
                true
            }
            _ => false,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(b'C', Some(CommandKind::Calibrate))]
    #[case(b'c', Some(CommandKind::Calibrate))]
    #[case(b'r', Some(CommandKind::SetRange))]
    #[case(b'E', Some(CommandKind::Enable))]
    #[case(b'e', None)]
    #[case(b'd', None)]
    #[case(b'\n', None)]
    fn command_bytes(#[case] b: u8, #[case] expected: Option<CommandKind>) {
        assert_eq!(CommandKind::from_byte(b), expected);
    }

    #[rstest]
    #[case("2,50.0", Ok((1, 50.0)))]
    #[case(" 1,12.5 \r", Ok((0, 12.5)))]
    #[case("5,3", Ok((4, 3.0)))]
    #[case("3,7.5mm", Ok((2, 7.5)))]
    #[case("0,50.0", Err(RangeCommandError::InvalidValue))]
    #[case("6,50.0", Err(RangeCommandError::InvalidValue))]
    #[case("2,-5", Err(RangeCommandError::InvalidValue))]
    #[case("2,0", Err(RangeCommandError::InvalidValue))]
    #[case("2,abc", Err(RangeCommandError::InvalidValue))]
    #[case("x,10", Err(RangeCommandError::InvalidValue))]
    #[case(",10", Err(RangeCommandError::Format))]
    #[case("250", Err(RangeCommandError::Format))]
    #[case("", Err(RangeCommandError::Format))]
    fn range_arguments(#[case] line: &str, #[case] expected: Result<(usize, f32), RangeCommandError>) {
        assert_eq!(parse_range_args(line, 5), expected);
    }
}
