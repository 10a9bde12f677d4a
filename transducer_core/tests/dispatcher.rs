use rstest::rstest;
use transducer_core::command::RANGE_USAGE;
use transducer_core::mocks::{OutputHandle, ScriptedAdc, ScriptedLink};
use transducer_core::store::read_record;
use transducer_core::{CommandKind, Station};
use transducer_hardware::MemEeprom;
use transducer_traits::ManualClock;

fn station(link: ScriptedLink) -> (Station, OutputHandle) {
    let out = link.output_handle();
    let station = Station::builder()
        .with_adc(ScriptedAdc::new())
        .with_link(link)
        .with_storage(MemEeprom::new(64))
        .with_clock(ManualClock::new())
        .build()
        .unwrap();
    (station, out)
}

fn ranges(s: &Station) -> Vec<f32> {
    s.channels().iter().map(|c| c.range_mm).collect()
}

#[test]
fn range_command_updates_channel_and_persists() {
    let (mut s, out) = station(ScriptedLink::new().burst("R2,50.0\n"));

    assert_eq!(s.handle_command().unwrap(), Some(CommandKind::SetRange));

    assert_eq!(ranges(&s), vec![25.0, 50.0, 25.0, 25.0, 25.0]);
    let rec = read_record(s.storage_mut(), 5).unwrap();
    assert_eq!(rec.version, 0x03);
    assert_eq!(rec.range_mm[1], 50.0);
    assert!(out.text().contains("Range T2 updated to 50.00mm"));
}

#[test]
fn lowercase_range_command_is_accepted() {
    let (mut s, _) = station(ScriptedLink::new().burst("r5,7.25\r\n"));
    s.handle_command().unwrap();
    assert_eq!(ranges(&s)[4], 7.25);
}

#[rstest]
#[case::index_zero("R0,50.0\n", "Error: invalid index or range")]
#[case::negative_range("R2,-5\n", "Error: invalid index or range")]
#[case::index_past_end("R6,10\n", "Error: invalid index or range")]
#[case::no_comma("R250\n", "Error: bad format")]
#[case::leading_comma("R,5\n", "Error: bad format")]
fn rejected_range_commands_change_nothing(#[case] input: &str, #[case] message: &str) {
    let (mut s, out) = station(ScriptedLink::new().burst(input));

    s.handle_command().unwrap();

    assert_eq!(ranges(&s), vec![25.0; 5]);
    assert_eq!(s.storage_mut().read(0).unwrap(), 0xFF, "nothing persisted");
    let text = out.text();
    assert!(text.contains(message), "{text}");
    assert!(text.contains(RANGE_USAGE));
}

#[test]
fn enable_and_disable_by_number() {
    let (mut s, _) = station(
        ScriptedLink::new()
            .burst("E1")
            .burst("E3")
            .burst("D1"),
    );
    s.handle_command().unwrap();
    s.handle_command().unwrap();
    let enabled: Vec<bool> = s.channels().iter().map(|c| c.enabled).collect();
    assert_eq!(enabled, vec![true, false, true, false, false]);

    assert_eq!(s.handle_command().unwrap(), Some(CommandKind::Disable));
    assert!(!s.channels().get(0).unwrap().enabled);
    assert!(s.channels().get(2).unwrap().enabled);
}

#[rstest]
#[case("E0")]
#[case("E6")]
#[case("E-2")]
#[case("E")]
fn out_of_range_enable_is_ignored(#[case] input: &str) {
    let (mut s, out) = station(ScriptedLink::new().burst(input));
    assert_eq!(s.handle_command().unwrap(), Some(CommandKind::Enable));
    assert!(!s.channels().any_enabled());
    assert_eq!(out.text(), "");
}

#[test]
fn lowercase_enable_and_unknown_bytes_are_ignored() {
    let (mut s, out) = station(ScriptedLink::new().burst("e1x?"));
    for _ in 0..4 {
        assert_eq!(s.handle_command().unwrap(), None);
    }
    assert!(!s.channels().any_enabled());
    assert_eq!(out.text(), "");
}

#[test]
fn no_input_no_command() {
    let (mut s, _) = station(ScriptedLink::new());
    assert_eq!(s.handle_command().unwrap(), None);
}
