//! The acquisition station: channel state plus the devices it talks to.
//!
//! `Station` owns the `ChannelSet` and the boxed collaborators and runs the
//! single-threaded poll loop. Each iteration performs at most one scheduler
//! tick and then handles at most one inbound command. A calibration session
//! blocks the loop until the operator leaves the menu.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use transducer_traits::{Adc, Clock, MonotonicClock, NvStorage, SerialLink};

use crate::channel::ChannelSet;
use crate::command::{CommandKind, RANGE_USAGE, parse_range_args};
use crate::config::StationCfg;
use crate::error::{AcqError, BuildError, Result};
use crate::hw_error::{HwResultExt, Origin};
use crate::scheduler::{Scheduler, sample_enabled};
use crate::session::{Calibrator, SessionReport};
use crate::store::{CalibrationStore, LoadOutcome, record_len};
use crate::telemetry::{Reading, format_line};
use crate::util::{POLL_SLICE, say, wait_for_byte};

/// How long argument reads after `R`, `E` and `D` wait for the next byte.
pub const ARG_TIMEOUT: Duration = Duration::from_millis(1000);
const RANGE_SETTLE: Duration = Duration::from_millis(50);
const PROMPT_LEAD_IN: Duration = Duration::from_millis(1000);
const BANNER_PAUSE: Duration = Duration::from_millis(500);
const RULE: &str = "========================================";

/// What one pass of the poll loop did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Poll {
    /// Telemetry line written this pass, if a tick was due and any channel enabled
    pub line: Option<String>,
    pub command: Option<CommandKind>,
}

impl Poll {
    pub fn is_idle(&self) -> bool {
        self.line.is_none() && self.command.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartupReport {
    pub load: LoadOutcome,
    /// Present when the operator took the startup calibration offer
    pub session: Option<SessionReport>,
}

pub struct Station {
    channels: ChannelSet,
    adc: Box<dyn Adc>,
    link: Box<dyn SerialLink>,
    storage: Box<dyn NvStorage>,
    clock: Box<dyn Clock>,
    cfg: StationCfg,
    store: CalibrationStore,
    scheduler: Scheduler,
    epoch: Instant,
    last: Vec<Reading>,
}

impl core::fmt::Debug for Station {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Station")
            .field("channels", &self.channels.len())
            .field("interval_ms", &self.scheduler.interval_ms())
            .field("record_version", &self.store.version())
            .finish_non_exhaustive()
    }
}

impl Station {
    pub fn builder() -> StationBuilder {
        StationBuilder::default()
    }

    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    pub fn config(&self) -> &StationCfg {
        &self.cfg
    }

    /// Readings produced by the most recent due tick.
    pub fn last_readings(&self) -> &[Reading] {
        &self.last
    }

    pub fn storage_mut(&mut self) -> &mut dyn NvStorage {
        self.storage.as_mut()
    }

    /// Restore calibration from storage.
    pub fn load(&mut self) -> Result<LoadOutcome> {
        self.store.load(self.storage.as_mut(), &mut self.channels)
    }

    /// Persist the calibration of every channel.
    pub fn save(&mut self) -> Result<()> {
        self.store.save(self.storage.as_mut(), &self.channels)?;
        self.say("Calibration saved to non-volatile storage.")
    }

    /// Load, report, and offer calibration when nothing usable was stored.
    ///
    /// The offer waits at most `calibration.prompt_window_ms` for a `C`/`c`;
    /// other bytes arriving in that window are discarded.
    pub fn startup(&mut self) -> Result<StartupReport> {
        let load = self.load()?;
        self.report_load(&load)?;

        let mut session = None;
        if load.is_loaded() {
            self.say("")?;
            self.say("Loaded calibration values:")?;
            let rows: Vec<String> = self
                .channels
                .iter()
                .map(|ch| {
                    format!(
                        "T{}: Min={} Max={} Range={:.2}mm",
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
        } else {
            self.say("")?;
            self.clock.sleep(PROMPT_LEAD_IN);
            let window = Duration::from_millis(self.cfg.calibration.prompt_window_ms);
            self.say(&format!(
                "Calibrate now? (send 'C' within {} seconds)",
                window.as_secs()
            ))?;
            let choice = wait_for_byte(self.link.as_mut(), self.clock.as_ref(), window, |b| {
                b == b'C' || b == b'c'
            })?;
            if choice.is_some() {
                session = Some(self.calibrate()?);
            } else {
                info!("startup calibration offer expired, continuing with defaults");
            }
        }

        self.say("")?;
        self.say("System started - streaming data in mm...")?;
        self.say(RULE)?;
        self.say("")?;
        self.clock.sleep(BANNER_PAUSE);
        Ok(StartupReport { load, session })
    }

    fn report_load(&mut self, load: &LoadOutcome) -> Result<()> {
        match load {
            LoadOutcome::Erased => self.say("! Storage empty. Using default values."),
            LoadOutcome::VersionMismatch { .. } => {
                self.say("! No valid calibration found in storage. Using default values.")
            }
            LoadOutcome::Loaded => {
                self.say("Calibration version compatible")?;
                self.say("Calibration loaded and verified")
            }
            LoadOutcome::Invalid(faults) => {
                self.say("Calibration version compatible")?;
                for fault in faults {
                    self.say(&format!("! {fault}"))?;
                }
                self.say("! Stored calibration invalid. Using default values.")
            }
        }
    }

    /// Run one scheduler tick if it is due; returns the line written.
    pub fn tick(&mut self) -> Result<Option<String>> {
        let now = self.clock.millis(self.epoch);
        if !self.scheduler.due(now) {
            return Ok(None);
        }
        let settle = Duration::from_millis(self.cfg.filter.settle_ms);
        self.last = sample_enabled(
            &mut self.channels,
            self.adc.as_mut(),
            self.clock.as_ref(),
            settle,
        )?;
        let Some(line) = format_line(&self.last) else {
            return Ok(None);
        };
        self.link.write_str(&line).or_hw(Origin::Link)?;
        Ok(Some(line))
    }

    /// Consume and execute at most one inbound command byte.
    pub fn handle_command(&mut self) -> Result<Option<CommandKind>> {
        if !self.link.available().or_hw(Origin::Link)? {
            return Ok(None);
        }
        let Some(byte) = self.link.read_byte().or_hw(Origin::Link)? else {
            return Ok(None);
        };
        let Some(kind) = CommandKind::from_byte(byte) else {
            debug!(byte, "ignored input byte");
            return Ok(None);
        };
        debug!(?kind, "command");
        match kind {
            CommandKind::Calibrate => {
                self.calibrate()?;
            }
            CommandKind::SetRange => self.range_command()?,
            CommandKind::Enable | CommandKind::Disable => {
                let number = self.link.parse_int(ARG_TIMEOUT).or_hw(Origin::Link)?;
                let on = kind == CommandKind::Enable;
                if !self.set_enabled(number, on) {
                    debug!(number, "enable/disable index out of range, ignored");
                }
            }
        }
        Ok(Some(kind))
    }

    fn range_command(&mut self) -> Result<()> {
        self.clock.sleep(RANGE_SETTLE);
        let line = self.link.read_line(ARG_TIMEOUT).or_hw(Origin::Link)?;
        match parse_range_args(&line, self.channels.len()) {
            Ok((index, range)) => self.set_range(index, range),
            Err(e) => {
                warn!(input = %line.trim(), error = %e, "range command rejected");
                self.say(&e.to_string())?;
                self.say(RANGE_USAGE)
            }
        }
    }

    /// Set the range of channel `index` (0-based) and persist everything.
    pub fn set_range(&mut self, index: usize, range_mm: f32) -> Result<()> {
        let ch = self
            .channels
            .get_mut(index)
            .ok_or_else(|| AcqError::State(format!("no channel at index {index}")))?;
        ch.range_mm = range_mm;
        let number = ch.number();
        info!(channel = number, range_mm, "range updated");
        self.save()?;
        self.say(&format!("Range T{number} updated to {range_mm:.2}mm"))
    }

    /// Enable or disable a channel by its 1-based number. Returns `false`
    /// (and changes nothing) when the number is out of range.
    pub fn set_enabled(&mut self, number: i64, on: bool) -> bool {
        match self.channels.by_number_mut(number) {
            Some(ch) => {
                ch.enabled = on;
                debug!(channel = number, enabled = on, "channel output toggled");
                true
            }
            None => false,
        }
    }

    /// Run an interactive calibration session to completion.
    pub fn calibrate(&mut self) -> Result<SessionReport> {
        Calibrator::new(
            &mut self.channels,
            self.adc.as_mut(),
            self.link.as_mut(),
            self.clock.as_ref(),
            self.storage.as_mut(),
            self.store,
            &self.cfg.calibration,
        )
        .run()
    }

    /// One loop iteration: at most one tick, then at most one command.
    pub fn poll_once(&mut self) -> Result<Poll> {
        let line = self.tick()?;
        let command = self.handle_command()?;
        Ok(Poll { line, command })
    }

    /// Poll until `stop` is set.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<()> {
        info!(
            channels = self.channels.len(),
            interval_ms = self.scheduler.interval_ms(),
            "acquisition loop started"
        );
        while !stop.load(Ordering::Relaxed) {
            if self.poll_once()?.is_idle() {
                self.clock.sleep(POLL_SLICE);
            }
        }
        info!("acquisition loop stopped");
        Ok(())
    }

    fn say(&mut self, line: &str) -> Result<()> {
        say(self.link.as_mut(), line)
    }
}

#[derive(Default)]
pub struct StationBuilder {
    adc: Option<Box<dyn Adc>>,
    link: Option<Box<dyn SerialLink>>,
    storage: Option<Box<dyn NvStorage>>,
    clock: Option<Box<dyn Clock>>,
    cfg: StationCfg,
}

impl StationBuilder {
    pub fn with_adc(mut self, adc: impl Adc + 'static) -> Self {
        self.adc = Some(Box::new(adc));
        self
    }

    pub fn with_link(mut self, link: impl SerialLink + 'static) -> Self {
        self.link = Some(Box::new(link));
        self
    }

    pub fn with_storage(mut self, storage: impl NvStorage + 'static) -> Self {
        self.storage = Some(Box::new(storage));
        self
    }

    /// Defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    pub fn with_config(mut self, cfg: StationCfg) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn build(self) -> std::result::Result<Station, BuildError> {
        let adc = self.adc.ok_or(BuildError::MissingAdc)?;
        let link = self.link.ok_or(BuildError::MissingLink)?;
        let storage = self.storage.ok_or(BuildError::MissingStorage)?;
        let clock = self.clock.unwrap_or_else(|| Box::new(MonotonicClock::new()));
        let cfg = self.cfg;

        check_config(&cfg)?;
        let need = record_len(cfg.channels.pins.len());
        if storage.capacity() < need {
            return Err(BuildError::InvalidConfig(format!(
                "storage holds {} bytes, calibration record needs {need}",
                storage.capacity()
            )));
        }

        let epoch = clock.now();
        Ok(Station {
            channels: ChannelSet::new(&cfg),
            adc,
            link,
            storage,
            clock,
            store: CalibrationStore::new(cfg.record_version),
            scheduler: Scheduler::new(cfg.interval_ms),
            epoch,
            last: Vec::new(),
            cfg,
        })
    }
}

fn check_config(cfg: &StationCfg) -> std::result::Result<(), BuildError> {
    let invalid = |msg: String| Err(BuildError::InvalidConfig(msg));
    let n = cfg.channels.pins.len();
    if n == 0 || n > transducer_config::MAX_CHANNELS {
        return invalid(format!(
            "channel count {n} outside [1, {}]",
            transducer_config::MAX_CHANNELS
        ));
    }
    if !(cfg.channels.default_range_mm.is_finite() && cfg.channels.default_range_mm > 0.0) {
        return invalid("default range must be > 0".into());
    }
    if cfg.filter.num_samples == 0 {
        return invalid("filter depth must be >= 1".into());
    }
    if cfg.interval_ms == 0 {
        return invalid("scheduler interval must be >= 1 ms".into());
    }
    if cfg.calibration.samples == 0 {
        return invalid("calibration sample count must be >= 1".into());
    }
    if cfg.record_version == crate::store::ERASED_VERSION {
        return invalid("record version 0xFF is the erased marker".into());
    }
    let safe = cfg.calibration.safe_bounds;
    if safe.adc_min < 0 || safe.adc_max >= cfg.adc_resolution || safe.adc_max <= safe.adc_min {
        return invalid(format!(
            "safe bounds {}..{} invalid for resolution {}",
            safe.adc_min, safe.adc_max, cfg.adc_resolution
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{ScriptedAdc, ScriptedLink};
    use transducer_hardware::MemEeprom;

    #[test]
    fn build_reports_missing_parts() {
        let err = Station::builder()
            .with_link(ScriptedLink::new())
            .with_storage(MemEeprom::new(64))
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::MissingAdc));

        let err = Station::builder()
            .with_adc(ScriptedAdc::new())
            .with_link(ScriptedLink::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::MissingStorage));
    }

    #[test]
    fn build_rejects_small_storage() {
        let err = Station::builder()
            .with_adc(ScriptedAdc::new())
            .with_link(ScriptedLink::new())
            .with_storage(MemEeprom::new(16))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("needs 41"));
    }
}
