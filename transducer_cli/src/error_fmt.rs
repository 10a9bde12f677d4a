//! Human-readable error descriptions, stable exit codes and JSON error output.

use thiserror::Error;
use transducer_core::error::{AcqError, BuildError, CalibrationFault};
use transducer_hardware::HwError;

/// The config file could not be read, parsed or validated.
#[derive(Debug, Error)]
#[error("invalid configuration {path}: {msg}")]
pub struct ConfigError {
    pub path: String,
    pub msg: String,
}

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;
pub const EXIT_INPUT_CLOSED: i32 = 3;
pub const EXIT_STORAGE: i32 = 4;
pub const EXIT_REJECTED: i32 = 5;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(ce) = err.downcast_ref::<ConfigError>() {
        return format!(
            "What happened: The configuration in {} is unusable ({}).\nLikely causes: Missing file, TOML syntax error, or an out-of-range value.\nHow to fix: Pass --config <FILE> or edit the file, then rerun.",
            ce.path, ce.msg
        );
    }

    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingAdc | BuildError::MissingLink | BuildError::MissingStorage => format!(
                "What happened: The station was assembled without a device ({be}).\nLikely causes: A backend failed to initialise.\nHow to fix: Re-run with --log-level=debug to see which backend failed."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Channel, storage or calibration values out of range.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(fault) = err.downcast_ref::<CalibrationFault>() {
        return format!(
            "What happened: The calibration table was rejected ({fault}). Nothing was written.\nLikely causes: adc_max not above adc_min, or a value outside the converter range.\nHow to fix: Correct the CSV row and import again."
        );
    }

    if let Some(ae) = err.downcast_ref::<AcqError>() {
        return match ae {
            AcqError::InputClosed => "What happened: Operator input closed while the station was waiting for a key.\nLikely causes: stdin reached end of file, or the serial peer went away.\nHow to fix: Run interactively (or keep the pipe open) until the calibration menu is left with S.".to_string(),
            AcqError::Storage(msg) => format!(
                "What happened: Calibration storage failed ({msg}).\nLikely causes: storage.capacity too small or the image file is not writable.\nHow to fix: Check [storage] in the config and the file permissions."
            ),
            AcqError::Adc(msg) => format!(
                "What happened: ADC read failed ({msg}).\nLikely causes: Wrong pin in channels.pins, SPI wiring or permissions.\nHow to fix: Run `transducer self-check` and verify [hardware] and [channels]."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(he) = err.downcast_ref::<HwError>() {
        return format!(
            "What happened: Device error ({he}).\nLikely causes: Device path, permissions, or a missing build feature.\nHow to fix: Check the device settings in the config; see `transducer --help` for features."
        );
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    // Calibration CSV header special-case
    if lower.contains("calibration csv must have headers") {
        return "Invalid headers in calibration CSV. Expected 'channel,adc_min,adc_max,range_mm'."
            .to_string();
    }

    if lower.contains("`serial` feature") {
        return format!(
            "What happened: {msg}.\nHow to fix: Rebuild with `--features serial`, or drop --port to use stdin/stdout."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable process exit codes per error class.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<ConfigError>().is_some() {
        return EXIT_CONFIG;
    }
    if let Some(BuildError::InvalidConfig(_)) = err.downcast_ref::<BuildError>() {
        return EXIT_CONFIG;
    }
    if err.downcast_ref::<CalibrationFault>().is_some() {
        return EXIT_REJECTED;
    }
    match err.downcast_ref::<AcqError>() {
        Some(AcqError::InputClosed) => return EXIT_INPUT_CLOSED,
        Some(AcqError::Storage(_)) => return EXIT_STORAGE,
        _ => {}
    }
    if let Some(HwError::Io(_) | HwError::AddressOutOfRange { .. }) = err.downcast_ref::<HwError>()
    {
        return EXIT_STORAGE;
    }
    EXIT_FAILURE
}

fn reason_name(err: &eyre::Report) -> &'static str {
    match exit_code_for_error(err) {
        EXIT_CONFIG => "Config",
        EXIT_INPUT_CLOSED => "InputClosed",
        EXIT_STORAGE => "Storage",
        EXIT_REJECTED => "Rejected",
        _ => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_closed_maps_to_its_own_code() {
        let err = eyre::Report::new(AcqError::InputClosed);
        assert_eq!(exit_code_for_error(&err), EXIT_INPUT_CLOSED);
        assert!(humanize(&err).contains("Operator input closed"));
    }

    #[test]
    fn wrapped_fault_is_still_recognised() {
        let fault = CalibrationFault::NotIncreasing {
            channel: 2,
            adc_min: 600,
            adc_max: 500,
        };
        let err = eyre::Report::new(fault).wrap_err("calibration table rejected");
        assert_eq!(exit_code_for_error(&err), EXIT_REJECTED);
    }

    #[test]
    fn json_error_carries_reason_and_code() {
        let err = eyre::Report::new(ConfigError {
            path: "x.toml".into(),
            msg: "channels.count must be in [1, 5]".into(),
        });
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "Config");
        assert_eq!(v["exit_code"], EXIT_CONFIG);
        assert!(v["message"].as_str().unwrap().contains("x.toml"));
    }

    #[test]
    fn csv_header_message_is_specific() {
        let err = eyre::eyre!(
            "calibration CSV must have headers 'channel,adc_min,adc_max,range_mm', got: raw,grams"
        );
        assert!(humanize(&err).starts_with("Invalid headers in calibration CSV"));
        assert_eq!(exit_code_for_error(&err), EXIT_FAILURE);
    }
}
