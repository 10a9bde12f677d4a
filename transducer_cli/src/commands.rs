//! Subcommand implementations.

use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::{WrapErr, eyre};
use serde_json::json;
use tracing::{debug, info, warn};
use transducer_config::Config;
use transducer_core::import::apply_rows;
use transducer_core::telemetry::parse_line;
use transducer_core::{CalibrationStore, ChannelSet, LoadOutcome, Station, StationCfg};
use transducer_traits::{Adc, SerialLink};

use crate::backend::{make_adc, make_link, open_storage};

fn build_station(cfg: &Config, port: Option<&str>) -> eyre::Result<Station> {
    let station = Station::builder()
        .with_adc(make_adc(cfg)?)
        .with_link(make_link(cfg, port)?)
        .with_storage(open_storage(cfg)?)
        .with_config(StationCfg::from(cfg))
        .build()?;
    debug!(?station, "station assembled");
    Ok(station)
}

/// First Ctrl-C asks the loop to stop; a second one exits immediately
/// (a calibration session blocks on operator input and never polls the flag).
fn install_ctrlc(stop: Arc<AtomicBool>) -> eyre::Result<()> {
    ctrlc::set_handler(move || {
        if stop.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
    })
    .wrap_err("install Ctrl-C handler")
}

pub fn run(
    cfg: &Config,
    port: Option<&str>,
    duration_ms: Option<u64>,
    enable: &[i64],
) -> eyre::Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    install_ctrlc(stop.clone())?;

    let mut station = build_station(cfg, port)?;
    let report = station.startup()?;
    info!(
        loaded = report.load.is_loaded(),
        calibrated = report.session.is_some(),
        "startup complete"
    );

    for &n in enable {
        if !station.set_enabled(n, true) {
            warn!(channel = n, "--enable ignored, no such channel");
        }
    }

    if let Some(ms) = duration_ms {
        let stop = stop.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(ms));
            stop.store(true, Ordering::SeqCst);
        });
    }

    station.run(&stop)?;
    Ok(())
}

pub fn calibrate(cfg: &Config, port: Option<&str>) -> eyre::Result<()> {
    let mut station = build_station(cfg, port)?;
    // channels the operator skips keep their stored calibration
    let load = station.load()?;
    debug!(?load, "stored calibration before session");
    let report = station.calibrate()?;
    info!(
        accepted = report.accepted(),
        attempted = report.outcomes.len(),
        menu_errors = report.menu_errors,
        "calibration session finished"
    );
    Ok(())
}

fn load_set(cfg: &Config) -> eyre::Result<(transducer_hardware::FileEeprom, ChannelSet, LoadOutcome)> {
    let mut storage = open_storage(cfg)?;
    let mut set = ChannelSet::new(&StationCfg::from(cfg));
    let store = CalibrationStore::new(cfg.storage.record_version);
    let outcome = store.load(&mut storage, &mut set)?;
    Ok((storage, set, outcome))
}

fn status_name(outcome: &LoadOutcome) -> &'static str {
    match outcome {
        LoadOutcome::Loaded => "loaded",
        LoadOutcome::Erased => "erased",
        LoadOutcome::VersionMismatch { .. } => "version_mismatch",
        LoadOutcome::Invalid(_) => "invalid",
    }
}

fn channels_json(set: &ChannelSet) -> serde_json::Value {
    set.iter()
        .map(|ch| {
            json!({
                "channel": ch.number(),
                "pin": ch.pin(),
                "adc_min": ch.adc_min,
                "adc_max": ch.adc_max,
                "range_mm": ch.range_mm,
            })
        })
        .collect()
}

fn print_table(set: &ChannelSet) {
    println!("{:<4} {:>4} {:>8} {:>8} {:>10}", "T", "pin", "adc_min", "adc_max", "range_mm");
    for ch in set.iter() {
        println!(
            "T{:<3} {:>4} {:>8} {:>8} {:>10.2}",
            ch.number(),
            ch.pin(),
            ch.adc_min,
            ch.adc_max,
            ch.range_mm
        );
    }
}

/// Print what the station would start with, and why.
pub fn show(cfg: &Config, json: bool) -> eyre::Result<()> {
    let (_, set, outcome) = load_set(cfg)?;
    let faults: Vec<String> = match &outcome {
        LoadOutcome::Invalid(faults) => faults.iter().map(ToString::to_string).collect(),
        _ => Vec::new(),
    };

    if json {
        let mut obj = json!({
            "status": status_name(&outcome),
            "storage": cfg.storage.path,
            "channels": channels_json(&set),
        });
        if let LoadOutcome::VersionMismatch { found, expected } = outcome {
            obj["found_version"] = json!(found);
            obj["expected_version"] = json!(expected);
        }
        if !faults.is_empty() {
            obj["faults"] = json!(faults);
        }
        println!("{obj}");
        return Ok(());
    }

    match &outcome {
        LoadOutcome::Loaded => println!("Calibration record: loaded ({})", cfg.storage.path),
        LoadOutcome::Erased => println!("Calibration record: none, storage erased (defaults shown)"),
        LoadOutcome::VersionMismatch { found, expected } => println!(
            "Calibration record: version 0x{found:02X}, expected 0x{expected:02X} (defaults shown)"
        ),
        LoadOutcome::Invalid(_) => println!("Calibration record: rejected (defaults shown)"),
    }
    for f in &faults {
        println!("  ! {f}");
    }
    print_table(&set);
    Ok(())
}

/// Apply a CSV calibration table on top of the stored record.
pub fn import(cfg: &Config, file: &Path, dry_run: bool, json: bool) -> eyre::Result<()> {
    let rows = transducer_config::load_calibration_csv(file, cfg.channels.count)?;
    let (mut storage, mut set, outcome) = load_set(cfg)?;
    debug!(status = status_name(&outcome), "record before import");

    if let Err(faults) = apply_rows(&mut set, &rows) {
        for f in &faults {
            warn!(fault = %f, "calibration table rejected");
        }
        let count = faults.len();
        let first = faults
            .into_iter()
            .next()
            .ok_or_else(|| eyre!("calibration table rejected"))?;
        return Err(eyre::Report::new(first).wrap_err(format!(
            "calibration table {} rejected ({count} fault(s))",
            file.display()
        )));
    }

    if !dry_run {
        CalibrationStore::new(cfg.storage.record_version).save(&mut storage, &set)?;
    }

    if json {
        println!(
            "{}",
            json!({
                "imported": rows.len(),
                "written": !dry_run,
                "channels": channels_json(&set),
            })
        );
    } else {
        if dry_run {
            println!("Dry run: {} row(s) valid, storage not written", rows.len());
        } else {
            println!("Imported {} row(s) into {}", rows.len(), cfg.storage.path);
        }
        print_table(&set);
    }
    Ok(())
}

/// Parse telemetry lines from `lines`, writing one JSON object per line to
/// `out`. Non-telemetry lines (prompts, banners) are skipped. Returns how many
/// lines were parsed.
pub fn monitor_lines<I, W>(lines: I, count: Option<usize>, out: &mut W) -> eyre::Result<usize>
where
    I: IntoIterator<Item = std::io::Result<String>>,
    W: Write,
{
    let mut parsed = 0usize;
    for line in lines {
        if count.is_some_and(|limit| parsed >= limit) {
            break;
        }
        let line = line.wrap_err("read telemetry")?;
        match parse_line(&line) {
            Ok(fields) => {
                let readings: Vec<_> = fields
                    .iter()
                    .map(|&(channel, mm)| json!({ "channel": channel, "mm": mm }))
                    .collect();
                writeln!(out, "{}", json!({ "readings": readings })).wrap_err("write output")?;
                parsed += 1;
            }
            Err(e) => debug!(line = %line.trim_end(), error = %e, "not a telemetry line"),
        }
    }
    Ok(parsed)
}

pub fn monitor(cfg: &Config, port: Option<&str>, count: Option<usize>) -> eyre::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let parsed = match port {
        None => monitor_lines(std::io::stdin().lock().lines(), count, &mut out)?,
        Some(_) => {
            let mut link = make_link(cfg, port)?;
            let lines = std::iter::from_fn(move || {
                loop {
                    match link.read_line(Duration::from_secs(1)) {
                        Ok(l) if l.is_empty() => continue,
                        Ok(l) => return Some(Ok(l)),
                        Err(e) => return Some(Err(std::io::Error::other(e.to_string()))),
                    }
                }
            });
            monitor_lines(lines, count, &mut out)?
        }
    };
    info!(lines = parsed, "monitor finished");
    Ok(())
}

/// Check config, storage and one read on every configured pin.
pub fn self_check(cfg: &Config) -> eyre::Result<()> {
    println!(
        "OK: config valid ({} channel(s), interval {} ms)",
        cfg.channels.count, cfg.scheduler.interval_ms
    );

    let (_, _, outcome) = load_set(cfg)?;
    println!(
        "OK: storage {} ({} bytes), record {}",
        cfg.storage.path,
        cfg.storage.capacity,
        status_name(&outcome)
    );

    let mut adc = make_adc(cfg)?;
    for (i, &pin) in cfg.channels.pins.iter().take(cfg.channels.count).enumerate() {
        let raw = adc
            .read(pin)
            .map_err(|e| eyre!("adc read on pin {pin} (T{}) failed: {e}", i + 1))?;
        println!("OK: T{} pin {pin} raw={raw}", i + 1);
    }

    #[cfg(feature = "serial")]
    {
        let ports = transducer_hardware::SerialPortLink::list_available_ports()
            .wrap_err("enumerate serial ports")?;
        println!("OK: serial ports [{}]", ports.join(", "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<std::io::Result<String>> {
        text.lines().map(|l| Ok(l.to_string())).collect()
    }

    #[test]
    fn monitor_skips_prompts_and_emits_json() {
        let input = "System started - streaming data in mm...\nPot1:12.500,Pot3:0.000\n\nPot2:1.250\n";
        let mut out = Vec::new();
        let n = monitor_lines(lines(input), None, &mut out).unwrap();
        assert_eq!(n, 2);
        let text = String::from_utf8(out).unwrap();
        let first: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(first["readings"][0]["channel"], 1);
        assert_eq!(first["readings"][0]["mm"], 12.5);
        assert_eq!(first["readings"][1]["channel"], 3);
    }

    #[test]
    fn monitor_stops_after_count() {
        let mut out = Vec::new();
        let n = monitor_lines(lines("Pot1:1.000\nPot1:2.000\nPot1:3.000\n"), Some(2), &mut out).unwrap();
        assert_eq!(n, 2);
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);
    }
}
