//! Scripted collaborators for driving the station without hardware.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use transducer_traits::{Adc, BoxError, SerialLink};

/// Serial link fed from a script of operator "bursts".
///
/// A burst is what the operator types in one go. Only the current burst is
/// visible to non-blocking reads, so draining input discards the rest of
/// what was just typed but never what the operator types next. The next
/// burst is released when the current one is exhausted and the station
/// either polls `available()` or blocks in `wait_byte()`.
///
/// Everything the station writes is captured and shared between clones.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLink {
    current: VecDeque<u8>,
    pending: VecDeque<Vec<u8>>,
    output: Arc<Mutex<Vec<u8>>>,
}

impl ScriptedLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one operator burst.
    #[must_use]
    pub fn burst(mut self, text: &str) -> Self {
        self.push_burst(text);
        self
    }

    pub fn push_burst(&mut self, text: &str) {
        self.pending.push_back(text.as_bytes().to_vec());
    }

    /// Handle that keeps seeing the captured output after the link is moved.
    pub fn output_handle(&self) -> OutputHandle {
        OutputHandle(Arc::clone(&self.output))
    }

    /// Bursts not yet released, plus the unread part of the current one.
    pub fn unread(&self) -> usize {
        self.current.len() + self.pending.iter().map(Vec::len).sum::<usize>()
    }

    fn release_next(&mut self) -> bool {
        while self.current.is_empty() {
            match self.pending.pop_front() {
                Some(next) => self.current.extend(next),
                None => return false,
            }
        }
        true
    }
}

impl SerialLink for ScriptedLink {
    fn available(&mut self) -> Result<bool, BoxError> {
        Ok(self.release_next())
    }

    fn read_byte_timeout(&mut self, _timeout: Duration) -> Result<Option<u8>, BoxError> {
        Ok(self.current.pop_front())
    }

    fn peek_byte_timeout(&mut self, _timeout: Duration) -> Result<Option<u8>, BoxError> {
        Ok(self.current.front().copied())
    }

    fn wait_byte(&mut self) -> Result<u8, BoxError> {
        self.release_next();
        self.current
            .pop_front()
            .ok_or_else(|| "scripted input closed".into())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), BoxError> {
        self.output
            .lock()
            .map_err(|_| "output buffer poisoned")?
            .extend_from_slice(bytes);
        Ok(())
    }
}

/// Shared view of what a `ScriptedLink` has written.
#[derive(Debug, Clone)]
pub struct OutputHandle(Arc<Mutex<Vec<u8>>>);

impl OutputHandle {
    pub fn text(&self) -> String {
        self.0
            .lock()
            .map(|g| String::from_utf8_lossy(&g).into_owned())
            .unwrap_or_default()
    }

    /// Output lines that parse as telemetry.
    pub fn telemetry_lines(&self) -> Vec<String> {
        self.text()
            .lines()
            .filter(|l| crate::telemetry::parse_line(l).is_ok())
            .map(str::to_owned)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut g) = self.0.lock() {
            g.clear();
        }
    }
}

#[derive(Debug, Default)]
struct AdcScript {
    queued: HashMap<u8, VecDeque<u16>>,
    levels: HashMap<u8, u16>,
    reads: HashMap<u8, usize>,
}

/// ADC that returns queued samples per pin, then a steady level.
///
/// Clones share the script, so a test can keep queueing samples after the
/// ADC has been handed to the station.
#[derive(Debug, Clone, Default)]
pub struct ScriptedAdc {
    script: Arc<Mutex<AdcScript>>,
}

impl ScriptedAdc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Steady value returned once the queue for `pin` is empty.
    #[must_use]
    pub fn level(self, pin: u8, value: u16) -> Self {
        self.set_level(pin, value);
        self
    }

    pub fn set_level(&self, pin: u8, value: u16) {
        if let Ok(mut s) = self.script.lock() {
            s.levels.insert(pin, value);
        }
    }

    pub fn queue(&self, pin: u8, samples: impl IntoIterator<Item = u16>) {
        if let Ok(mut s) = self.script.lock() {
            s.queued.entry(pin).or_default().extend(samples);
        }
    }

    /// Number of conversions performed on `pin`.
    pub fn reads(&self, pin: u8) -> usize {
        self.script
            .lock()
            .map(|s| s.reads.get(&pin).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl Adc for ScriptedAdc {
    fn read(&mut self, pin: u8) -> Result<u16, BoxError> {
        let mut s = self.script.lock().map_err(|_| "adc script poisoned")?;
        *s.reads.entry(pin).or_insert(0) += 1;
        if let Some(v) = s.queued.get_mut(&pin).and_then(VecDeque::pop_front) {
            return Ok(v);
        }
        s.levels
            .get(&pin)
            .copied()
            .ok_or_else(|| format!("no scripted sample for pin {pin}").into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_stops_at_burst_boundary() {
        let mut link = ScriptedLink::new().burst("1\n").burst("\n");
        assert_eq!(link.wait_byte().unwrap(), b'1');
        link.drain().unwrap();
        assert_eq!(link.unread(), 1);
        assert_eq!(link.wait_byte().unwrap(), b'\n');
        assert!(link.wait_byte().is_err());
    }

    #[test]
    fn adc_falls_back_to_level() {
        let mut adc = ScriptedAdc::new().level(0, 500);
        adc.queue(0, [1, 2]);
        let got: Vec<u16> = (0..3).map(|_| adc.read(0).unwrap()).collect();
        assert_eq!(got, vec![1, 2, 500]);
        assert_eq!(adc.reads(0), 3);
        assert!(adc.read(7).is_err());
    }
}
