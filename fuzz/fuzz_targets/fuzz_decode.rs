#![no_main]
use libfuzzer_sys::fuzz_target;
use zenmbm::*;

fuzz_target!(|data: &[u8]| {
    // Parsing and decoding every bitmap must never panic
    let Ok(file) = MbmFile::from_bytes(data) else {
        return;
    };
    let limits = Limits {
        max_pixels: Some(1 << 24),
        ..Limits::default()
    };
    for index in 0..file.bitmap_count() {
        let _ = DecodeRequest::new(data)
            .with_index(index)
            .with_limits(&limits)
            .decode(enough::Unstoppable);
        let _ = DecodeRequest::new(data)
            .with_index(index)
            .with_limits(&limits)
            .with_permissiveness(Permissiveness::Strict)
            .decode(enough::Unstoppable);
    }
});
