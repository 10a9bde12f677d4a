use rstest::rstest;
use transducer_core::config::{ChannelsCfg, StationCfg};
use transducer_core::store::{decode, encode, record_len};
use transducer_core::{CalibrationFault, CalibrationStore, ChannelSet, LoadOutcome};
use transducer_hardware::MemEeprom;

const VERSION: u8 = 0x03;

fn set() -> ChannelSet {
    ChannelSet::new(&StationCfg::default())
}

fn calibrated() -> ChannelSet {
    let mut s = set();
    for (i, ch) in s.iter_mut().enumerate() {
        let i = i as i32;
        ch.adc_min = 10 + i;
        ch.adc_max = 1000 - i;
        ch.range_mm = 20.0 + i as f32 * 2.5;
    }
    s
}

fn snapshot(s: &ChannelSet) -> Vec<(i32, i32, f32)> {
    s.iter().map(|c| (c.adc_min, c.adc_max, c.range_mm)).collect()
}

#[test]
fn save_then_load_reproduces_every_field() {
    let store = CalibrationStore::new(VERSION);
    let mut eeprom = MemEeprom::new(1024);
    let original = calibrated();
    store.save(&mut eeprom, &original).unwrap();

    let mut restored = set();
    let outcome = store.load(&mut eeprom, &mut restored).unwrap();
    assert_eq!(outcome, LoadOutcome::Loaded);
    assert!(outcome.is_loaded());
    assert_eq!(snapshot(&restored), snapshot(&original));
}

#[test]
fn image_layout_is_grouped_little_endian() {
    let store = CalibrationStore::new(VERSION);
    let mut eeprom = MemEeprom::new(64);
    store.save(&mut eeprom, &calibrated()).unwrap();
    let img = eeprom.image();
    assert_eq!(img[0], VERSION);
    // adc_min[0..5] = 10..14, then adc_max[0..5] = 1000..996
    assert_eq!(&img[1..3], &10i16.to_le_bytes());
    assert_eq!(&img[9..11], &14i16.to_le_bytes());
    assert_eq!(&img[11..13], &1000i16.to_le_bytes());
    assert_eq!(&img[21..25], &20.0f32.to_le_bytes());
    assert_eq!(img[record_len(5)], 0xFF);
}

#[test]
fn unchanged_save_rewrites_nothing() {
    let store = CalibrationStore::new(VERSION);
    let mut eeprom = MemEeprom::new(64);
    let s = calibrated();
    store.save(&mut eeprom, &s).unwrap();
    let writes = eeprom.write_count();
    store.save(&mut eeprom, &s).unwrap();
    assert_eq!(eeprom.write_count(), writes);
}

#[test]
fn erased_storage_leaves_state_untouched() {
    let store = CalibrationStore::new(VERSION);
    let mut eeprom = MemEeprom::new(64);
    let mut s = calibrated();
    let before = snapshot(&s);
    assert_eq!(store.load(&mut eeprom, &mut s).unwrap(), LoadOutcome::Erased);
    assert!(!LoadOutcome::Erased.is_loaded());
    assert_eq!(snapshot(&s), before);
}

#[test]
fn foreign_version_is_not_read_further() {
    let mut image = encode(&calibrated(), 0x02);
    image.resize(64, 0xFF);
    let mut eeprom = MemEeprom::from_image(image);
    let mut s = set();
    let before = snapshot(&s);

    let outcome = CalibrationStore::new(VERSION).load(&mut eeprom, &mut s).unwrap();
    assert_eq!(
        outcome,
        LoadOutcome::VersionMismatch {
            found: 0x02,
            expected: VERSION
        }
    );
    assert_eq!(snapshot(&s), before);
}

#[test]
fn one_invalid_channel_resets_all() {
    let mut bad = calibrated();
    // channel 2 has adc_max <= adc_min
    bad.get_mut(1).unwrap().adc_max = bad.get(1).unwrap().adc_min;
    let mut image = encode(&bad, VERSION);
    image.resize(64, 0xFF);
    let mut eeprom = MemEeprom::from_image(image);

    let mut s = calibrated();
    let outcome = CalibrationStore::new(VERSION).load(&mut eeprom, &mut s).unwrap();

    let LoadOutcome::Invalid(faults) = outcome else {
        panic!("expected Invalid, got {outcome:?}");
    };
    assert_eq!(faults.len(), 1);
    assert!(matches!(
        faults[0],
        CalibrationFault::NotIncreasing { channel: 2, .. }
    ));
    for ch in &s {
        assert_eq!((ch.adc_min, ch.adc_max, ch.range_mm), (100, 950, 25.0));
    }
}

#[rstest]
#[case::min_negative(-1, 900, 25.0)]
#[case::max_at_resolution(100, 1024, 25.0)]
#[case::zero_range(100, 900, 0.0)]
#[case::nan_range(100, 900, f32::NAN)]
fn rejected_records(#[case] adc_min: i32, #[case] adc_max: i32, #[case] range_mm: f32) {
    let mut bad = calibrated();
    let ch = bad.get_mut(4).unwrap();
    ch.adc_min = adc_min;
    ch.adc_max = adc_max;
    ch.range_mm = range_mm;
    let mut image = encode(&bad, VERSION);
    image.resize(64, 0xFF);
    let mut eeprom = MemEeprom::from_image(image);

    let mut s = set();
    let outcome = CalibrationStore::new(VERSION).load(&mut eeprom, &mut s).unwrap();
    assert!(matches!(outcome, LoadOutcome::Invalid(_)));
}

#[test]
fn record_width_follows_channel_count() {
    let cfg = StationCfg {
        channels: ChannelsCfg {
            pins: vec![3, 4, 5, 6],
            default_range_mm: 10.0,
        },
        ..StationCfg::default()
    };
    let s = ChannelSet::new(&cfg);
    let bytes = encode(&s, VERSION);
    assert_eq!(bytes.len(), 33);
    let rec = decode(&bytes, 4).unwrap();
    assert_eq!(rec.range_mm, vec![10.0; 4]);
}

#[test]
fn storage_too_small_is_an_error() {
    let mut eeprom = MemEeprom::new(8);
    let err = CalibrationStore::new(VERSION)
        .save(&mut eeprom, &set())
        .unwrap_err();
    assert!(err.to_string().contains("storage error"));
}
