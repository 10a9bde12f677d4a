use rstest::rstest;
use transducer_config::{MAX_CHANNELS, load_toml, record_len};

#[rstest]
fn empty_file_yields_stock_five_channel_setup() {
    let cfg = load_toml("").expect("parse TOML");
    cfg.validate().expect("defaults must validate");
    assert_eq!(cfg.channels.count, MAX_CHANNELS);
    assert_eq!(cfg.filter.num_samples, 10);
    assert_eq!(cfg.scheduler.interval_ms, 100);
    assert_eq!(cfg.calibration.samples, 100);
    assert_eq!(cfg.calibration.sample_delay_ms, 20);
    assert_eq!(cfg.calibration.prompt_window_ms, 5000);
    assert_eq!(cfg.storage.record_version, 0x03);
    assert!(cfg.serial.port.is_none());
}

#[rstest]
fn shipped_sample_config_validates() {
    let cfg = load_toml(include_str!("../../etc/transducer.toml")).expect("parse TOML");
    cfg.validate().expect("sample config must validate");
    assert_eq!(cfg.channels.pins, vec![0, 1, 2, 3, 4]);
    assert_eq!(cfg.logging.rotation.as_deref(), Some("never"));
}

#[rstest]
fn accepts_four_channel_layout() {
    let toml = r#"
[channels]
count = 4
pins = [0, 1, 2, 3]
default_range_mm = 50.0

[storage]
path = "/tmp/cal.eeprom"
capacity = 64
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(record_len(4), 33);
}

#[rstest]
#[case("[channels]\ncount = 6\npins = [0,1,2,3,4,5]\n", "channels.count must be in [1, 5]")]
#[case("[channels]\ncount = 2\npins = [0]\n", "channels.pins must list exactly 2 pins")]
#[case("[channels]\ndefault_range_mm = 0.0\n", "default_range_mm must be > 0")]
#[case("[filter]\nnum_samples = 0\n", "filter.num_samples must be >= 1")]
#[case("[scheduler]\ninterval_ms = 0\n", "scheduler.interval_ms must be >= 1")]
#[case("[calibration]\nsamples = 0\n", "calibration.samples must be >= 1")]
#[case("[calibration]\nsafe_adc_min = 950\nsafe_adc_max = 100\n", "safe_adc_min/safe_adc_max")]
#[case("[calibration]\nsafe_adc_max = 1024\n", "safe_adc_min/safe_adc_max")]
#[case("[storage]\nrecord_version = 255\n", "must not be 0xff")]
#[case("[storage]\ncapacity = 40\n", "storage.capacity must be >= 41")]
#[case("[serial]\nbaud = 0\n", "serial.baud must be > 0")]
#[case("[logging]\nrotation = \"weekly\"\n", "logging.rotation must be one of")]
fn rejects_invalid_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    let msg = format!("{err}").to_lowercase();
    assert!(msg.contains(&needle.to_lowercase()), "{msg}");
}

#[rstest]
fn unknown_serial_port_is_kept_verbatim() {
    let cfg = load_toml("[serial]\nport = \"/dev/ttyACM0\"\nbaud = 115200\n").unwrap();
    assert_eq!(cfg.serial.port.as_deref(), Some("/dev/ttyACM0"));
    assert_eq!(cfg.serial.baud, 115_200);
}
