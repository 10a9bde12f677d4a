use std::fs::File;
use std::io::Write;

use rstest::rstest;
use tempfile::tempdir;
use transducer_config::{CalibrationRow, load_calibration_csv};

fn write_csv(lines: &[&str]) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cal.csv");
    let mut f = File::create(&path).unwrap();
    for l in lines {
        writeln!(f, "{l}").unwrap();
    }
    (dir, path)
}

#[rstest]
fn loads_rows_in_file_order() {
    let (_dir, path) = write_csv(&[
        "channel,adc_min,adc_max,range_mm",
        "3,87,1001,50.0",
        "1, 102, 948, 25.0",
    ]);
    let rows = load_calibration_csv(&path, 5).unwrap();
    assert_eq!(
        rows,
        vec![
            CalibrationRow {
                channel: 3,
                adc_min: 87,
                adc_max: 1001,
                range_mm: 50.0
            },
            CalibrationRow {
                channel: 1,
                adc_min: 102,
                adc_max: 948,
                range_mm: 25.0
            },
        ]
    );
}

#[rstest]
fn csv_with_wrong_headers_errors() {
    let (_dir, path) = write_csv(&["ch,min,max,range", "1,100,900,25.0"]);
    let err = load_calibration_csv(&path, 5).expect_err("should error on bad headers");
    assert!(format!("{err}").contains("headers 'channel,adc_min,adc_max,range_mm'"));
}

#[rstest]
fn csv_with_non_numeric_errors() {
    let (_dir, path) = write_csv(&["channel,adc_min,adc_max,range_mm", "1,abc,900,25.0"]);
    let err = load_calibration_csv(&path, 5).expect_err("should error on non-numeric");
    assert!(format!("{err}").contains("invalid CSV row 2"));
}

#[rstest]
#[case("0,100,900,25.0", "outside 1..=4")]
#[case("5,100,900,25.0", "outside 1..=4")]
#[case("2,100,900,0.0", "range_mm must be > 0")]
#[case("2,100,900,-3.5", "range_mm must be > 0")]
fn csv_rejects_bad_rows(#[case] row: &str, #[case] needle: &str) {
    let (_dir, path) = write_csv(&["channel,adc_min,adc_max,range_mm", row]);
    let err = load_calibration_csv(&path, 4).expect_err("row should be rejected");
    assert!(format!("{err}").contains(needle), "{err}");
}

#[rstest]
fn csv_rejects_duplicate_channel() {
    let (_dir, path) = write_csv(&[
        "channel,adc_min,adc_max,range_mm",
        "2,100,900,25.0",
        "2,110,910,25.0",
    ]);
    let err = load_calibration_csv(&path, 5).expect_err("duplicate channel");
    assert!(format!("{err}").contains("duplicate channel 2"));
}

#[rstest]
fn csv_without_rows_errors() {
    let (_dir, path) = write_csv(&["channel,adc_min,adc_max,range_mm"]);
    let err = load_calibration_csv(&path, 5).expect_err("empty table");
    assert!(format!("{err}").contains("no rows"));
}
