//! Small timing helpers shared by the station and the session.

use std::time::Duration;

use transducer_traits::{Clock, SerialLink};

use crate::error::Result;
use crate::hw_error::{HwResultExt, Origin};

/// Poll granularity of bounded waits.
pub const POLL_SLICE: Duration = Duration::from_millis(1);

/// Wait at most `window` for an inbound byte accepted by `accept`.
///
/// Bytes that arrive but are not accepted are consumed and dropped. The
/// window is measured on `clock`, so a manual clock makes this deterministic.
pub fn wait_for_byte(
    link: &mut dyn SerialLink,
    clock: &dyn Clock,
    window: Duration,
    accept: impl Fn(u8) -> bool,
) -> Result<Option<u8>> {
    let start = clock.now();
    let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
    loop {
        if link.available().or_hw(Origin::Link)? {
            if let Some(b) = link.read_byte().or_hw(Origin::Link)? {
                if accept(b) {
                    return Ok(Some(b));
                }
                continue;
            }
        }
        if clock.ms_since(start) >= window_ms {
            return Ok(None);
        }
        clock.sleep(POLL_SLICE);
    }
}

/// Write one line of operator text.
pub fn say(link: &mut dyn SerialLink, line: &str) -> Result<()> {
    link.write_line(line).or_hw(Origin::Link)?;
    Ok(())
}
