//! Operator-driven calibration session.
//!
//! The session is an explicit state machine so that every prompt, wait and
//! measurement is a separate step:
//!
//! ```text
//! Menu -> AwaitZero -> MeasureZero -> AwaitFull -> MeasureFull -> Validate -> Menu
//! Menu -> Persist -> Done
//! ```
//!
//! Waits for the operator are unbounded (`SerialLink::wait_byte`); there is
//! no timeout and no way out of a started channel except finishing it. The
//! only exit is the menu's `S` option, after which the whole calibration is
//! persisted whether or not any channel succeeded.

use std::time::Duration;

use tracing::{debug, info, warn};
use transducer_traits::{Adc, Clock, NvStorage, SerialLink};

use crate::calibration::{Estimate, PositionStats, calibrate_position, validate};
use crate::channel::ChannelSet;
use crate::config::{Bounds, CalibrationCfg};
use crate::error::{CalibrationFault, Result};
use crate::hw_error::{HwResultExt, Origin};
use crate::store::CalibrationStore;
use crate::util::say;

const RULE: &str = "========================================";
const MENU_SETTLE: Duration = Duration::from_millis(50);
const AFTER_ZERO_PAUSE: Duration = Duration::from_millis(1000);
const AFTER_CHANNEL_PAUSE: Duration = Duration::from_millis(1500);
const AFTER_SESSION_PAUSE: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Menu,
    AwaitZero(usize),
    MeasureZero(usize),
    AwaitFull(usize),
    MeasureFull(usize),
    Validate(usize),
    Persist,
    Done,
}

/// What happened to one channel during the session.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelOutcome {
    /// 1-based channel number
    pub channel: usize,
    pub zero: PositionStats,
    pub full: PositionStats,
    /// Endpoints arrived reversed and were exchanged
    pub swapped: bool,
    /// Accepted bounds, or the reason they were replaced by the safe ones
    pub result: std::result::Result<Bounds, CalibrationFault>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionReport {
    /// In the order the operator ran them; a channel may appear more than once
    pub outcomes: Vec<ChannelOutcome>,
    pub menu_errors: usize,
}

impl SessionReport {
    pub fn accepted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }
}

/// Borrowed view of everything a session touches.
pub struct Calibrator<'a> {
    channels: &'a mut ChannelSet,
    adc: &'a mut dyn Adc,
    link: &'a mut dyn SerialLink,
    clock: &'a dyn Clock,
    storage: &'a mut dyn NvStorage,
    store: CalibrationStore,
    cfg: &'a CalibrationCfg,
    state: SessionState,
    zero: Option<PositionStats>,
    full: Option<PositionStats>,
    report: SessionReport,
}

impl<'a> Calibrator<'a> {
    pub fn new(
        channels: &'a mut ChannelSet,
        adc: &'a mut dyn Adc,
        link: &'a mut dyn SerialLink,
        clock: &'a dyn Clock,
        storage: &'a mut dyn NvStorage,
        store: CalibrationStore,
        cfg: &'a CalibrationCfg,
    ) -> Self {
        Self {
            channels,
            adc,
            link,
            clock,
            storage,
            store,
            cfg,
            state: SessionState::Menu,
            zero: None,
            full: None,
            report: SessionReport::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the session to completion.
    pub fn run(mut self) -> Result<SessionReport> {
        info!(channels = self.channels.len(), "calibration session started");
        while self.state != SessionState::Done {
            self.step()?;
        }
        info!(
            accepted = self.report.accepted(),
            attempted = self.report.outcomes.len(),
            "calibration session finished"
        );
        Ok(self.report)
    }

    /// Execute the current state and move to the next one.
    pub fn step(&mut self) -> Result<SessionState> {
        debug!(state = ?self.state, "session step");
        let next = match self.state {
            SessionState::Menu => self.menu()?,
            SessionState::AwaitZero(i) => {
                let number = i + 1;
                let pin = self.pin(i);
                self.say("")?;
                self.say(&format!("TRANSDUCER {number} (pin {pin})"))?;
                self.say("")?;
                self.say(&format!("STEP 1: Place TRANSDUCER {number} at 0mm"))?;
                self.wait_for_enter()?;
                SessionState::MeasureZero(i)
            }
            SessionState::MeasureZero(i) => {
                let stats = self.measure(i, "0mm")?;
                if let Some(ch) = self.channels.get_mut(i) {
                    ch.adc_min = stats.value;
                }
                self.zero = Some(stats);
                self.say(&format!("T{} minimum (0mm): ADC = {}", i + 1, stats.value))?;
                self.say("")?;
                self.clock.sleep(AFTER_ZERO_PAUSE);
                SessionState::AwaitFull(i)
            }
            SessionState::AwaitFull(i) => {
                let range = self.range(i);
                self.say(&format!(
                    "STEP 2: Place TRANSDUCER {} at {range:.2}mm (full range)",
                    i + 1
                ))?;
                self.wait_for_enter()?;
                SessionState::MeasureFull(i)
            }
            SessionState::MeasureFull(i) => {
                let label = format!("{:.1}mm", self.range(i));
                let stats = self.measure(i, &label)?;
                if let Some(ch) = self.channels.get_mut(i) {
                    ch.adc_max = stats.value;
                }
                self.full = Some(stats);
                self.say(&format!("T{} maximum: ADC = {}", i + 1, stats.value))?;
                self.say("")?;
                SessionState::Validate(i)
            }
            SessionState::Validate(i) => {
                self.finish_channel(i)?;
                self.clock.sleep(AFTER_CHANNEL_PAUSE);
                SessionState::Menu
            }
            SessionState::Persist => {
                self.store.save(self.storage, self.channels)?;
                self.say("Calibration saved to non-volatile storage.")?;
                self.print_summary()?;
                self.clock.sleep(AFTER_SESSION_PAUSE);
                SessionState::Done
            }
            SessionState::Done => SessionState::Done,
        };
        self.state = next;
        Ok(next)
    }

    fn menu(&mut self) -> Result<SessionState> {
        self.say("")?;
        self.say(RULE)?;
        self.say("   CALIBRATION MENU")?;
        self.say(RULE)?;
        self.say("Choose an option:")?;
        for n in 1..=self.channels.len() {
            self.say(&format!("  {n} - Calibrate transducer {n}"))?;
        }
        self.say("  S - Exit and save")?;
        self.link.write_str("Option: ").or_hw(Origin::Link)?;

        let choice = self.link.wait_byte().or_hw(Origin::Link)?;
        self.link.write_all(&[choice, b'\n']).or_hw(Origin::Link)?;
        self.clock.sleep(MENU_SETTLE);
        self.link.drain().or_hw(Origin::Link)?;

        let next = match choice {
            b'S' | b's' => SessionState::Persist,
            b'1'..=b'9' if usize::from(choice - b'1') < self.channels.len() => {
                SessionState::AwaitZero(usize::from(choice - b'1'))
            }
            _ => {
                self.report.menu_errors += 1;
                self.say("Invalid option. Try again.")?;
                SessionState::Menu
            }
        };
        Ok(next)
    }

    /// Unbounded wait for an end-of-line byte; input around it is discarded.
    fn wait_for_enter(&mut self) -> Result<()> {
        self.link.drain().or_hw(Origin::Link)?;
        self.say("Press ENTER to continue...")?;
        loop {
            let b = self.link.wait_byte().or_hw(Origin::Link)?;
            if b == b'\n' || b == b'\r' {
                break;
            }
        }
        self.link.drain().or_hw(Origin::Link)?;
        Ok(())
    }

    fn measure(&mut self, index: usize, position: &str) -> Result<PositionStats> {
        self.say(&format!("Measuring {position}..."))?;
        let pin = self.pin(index);
        let stats = calibrate_position(
            self.adc,
            self.clock,
            pin,
            self.cfg.samples,
            Duration::from_millis(self.cfg.sample_delay_ms),
            self.cfg.unstable_std_dev,
        )?;
        self.say(&format!(
            "Mean ADC value: {} (deviation: +/-{})",
            stats.mean, stats.std_dev
        ))?;
        if stats.unstable {
            self.say("Warning: unstable readings. Reposition the transducer.")?;
        }
        match stats.estimate {
            Estimate::Mean => self.say("Mode inconsistent, using the mean for safety.")?,
            Estimate::Mode => self.say(&format!("Most stable value (mode): {}", stats.mode))?,
        }
        Ok(stats)
    }

    fn finish_channel(&mut self, index: usize) -> Result<()> {
        let resolution = self.channels.resolution();
        let Some(ch) = self.channels.get_mut(index) else {
            return Ok(());
        };
        let number = ch.number();

        let swapped = ch.adc_min > ch.adc_max;
        let mut notes = Vec::new();
        if swapped {
            std::mem::swap(&mut ch.adc_min, &mut ch.adc_max);
            notes.push("Inverted values detected. Correcting automatically...".to_string());
            notes.push(format!(
                "New values: Min={}, Max={}",
                ch.adc_min, ch.adc_max
            ));
        }

        let result = validate(ch, resolution).map(|()| ch.bounds());
        let (span, range_mm) = (ch.adc_max - ch.adc_min, ch.range_mm);
        for line in notes {
            self.say(&line)?;
        }

        match &result {
            Ok(bounds) => {
                info!(
                    channel = number,
                    adc_min = bounds.adc_min,
                    adc_max = bounds.adc_max,
                    "channel calibrated"
                );
                self.say(&format!("ADC span: {span}"))?;
                self.say(&format!(
                    "Resolution: {:.3} ADC points/mm",
                    span as f32 / range_mm
                ))?;
            }
            Err(fault) => {
                warn!(channel = number, %fault, "calibration rejected, safe bounds restored");
                self.channels.reset_bounds(index);
                self.say(&format!("! {fault}"))?;
                self.say("Invalid calibration. Repeat the procedure.")?;
            }
        }

        if let (Some(zero), Some(full)) = (self.zero.take(), self.full.take()) {
            self.report.outcomes.push(ChannelOutcome {
                channel: number,
                zero,
                full,
                swapped,
                result,
            });
        }
        Ok(())
    }

    fn print_summary(&mut self) -> Result<()> {
        self.say(RULE)?;
        self.say("   CALIBRATION COMPLETE")?;
        self.say(RULE)?;
        self.say("")?;
        self.say("Calibration values:")?;
        self.say("")?;
        let rows: Vec<String> = self
            .channels
            .iter()
            .map(|ch| {
                format!(
                    "Transducer {}: Min={}, Max={}, Range={:.2}mm",
                    ch.number(),
                    ch.adc_min,
                    ch.adc_max,
                    ch.range_mm
                )
            })
            .collect();
        for row in rows {
            self.say(&row)?;
        }
        self.say("")?;
        self.say("Values stored. No need to recalibrate after a restart.")?;
        self.say(RULE)?;
        self.say("")
    }

    fn pin(&self, index: usize) -> u8 {
        self.channels.get(index).map_or(0, |c| c.pin())
    }

    fn range(&self, index: usize) -> f32 {
        self.channels
            .get(index)
            .map_or(self.channels.default_range_mm(), |c| c.range_mm)
    }

    fn say(&mut self, line: &str) -> Result<()> {
        say(self.link, line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StationCfg;
    use crate::mocks::{ScriptedAdc, ScriptedLink};
    use transducer_hardware::MemEeprom;
    use transducer_traits::ManualClock;

    fn cfg() -> StationCfg {
        StationCfg::default()
    }

    #[test]
    fn exit_only_still_persists() {
        let cfg = cfg();
        let mut set = ChannelSet::new(&cfg);
        let mut adc = ScriptedAdc::new();
        let mut link = ScriptedLink::new().burst("S\n");
        let out = link.output_handle();
        let clock = ManualClock::new();
        let mut eeprom = MemEeprom::new(64);

        let report = Calibrator::new(
            &mut set,
            &mut adc,
            &mut link,
            &clock,
            &mut eeprom,
            CalibrationStore::new(cfg.record_version),
            &cfg.calibration,
        )
        .run()
        .unwrap();

        assert!(report.outcomes.is_empty());
        assert_eq!(eeprom.image()[0], cfg.record_version);
        assert!(out.text().contains("Option: S\n"));
        assert!(out.text().contains("Transducer 5: Min=100, Max=950, Range=25.00mm"));
    }

    #[test]
    fn unknown_option_returns_to_menu() {
        let cfg = cfg();
        let mut set = ChannelSet::new(&cfg);
        let mut adc = ScriptedAdc::new();
        let mut link = ScriptedLink::new().burst("9\n").burst("s");
        let out = link.output_handle();
        let clock = ManualClock::new();
        let mut eeprom = MemEeprom::new(64);

        let report = Calibrator::new(
            &mut set,
            &mut adc,
            &mut link,
            &clock,
            &mut eeprom,
            CalibrationStore::new(cfg.record_version),
            &cfg.calibration,
        )
        .run()
        .unwrap();

        assert_eq!(report.menu_errors, 1);
        assert_eq!(out.text().matches("CALIBRATION MENU").count(), 2);
    }
}
