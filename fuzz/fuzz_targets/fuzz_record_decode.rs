#![no_main]
use libfuzzer_sys::fuzz_target;
use transducer_core::store::{decode, record_len};

fuzz_target!(|input: (u8, &[u8])| {
    let (n, bytes) = input;
    let channels = usize::from(n % 6);
    match decode(bytes, channels) {
        Ok(rec) => {
            assert!(bytes.len() >= record_len(channels));
            assert_eq!(rec.adc_min.len(), channels);
            assert_eq!(rec.adc_max.len(), channels);
            assert_eq!(rec.range_mm.len(), channels);
        }
        Err(_) => assert!(bytes.len() < record_len(channels)),
    }
});
