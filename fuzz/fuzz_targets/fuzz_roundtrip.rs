#![no_main]
use libfuzzer_sys::fuzz_target;
use zenmbm::*;

fuzz_target!(|data: &[u8]| {
    // If we can decode it, re-encoding and decoding again must produce identical pixels
    let limits = Limits {
        max_pixels: Some(1 << 22),
        ..Limits::default()
    };
    let Ok(decoded) = DecodeRequest::new(data)
        .with_limits(&limits)
        .decode(enough::Unstoppable)
    else {
        return;
    };

    // Colour modes the writer cannot pick compression for are rejected
    let Ok(reencoded) = encode_image(
        decoded.width,
        decoded.height,
        decoded.bits_per_pixel,
        decoded.color_mode,
        decoded.pixels(),
        enough::Unstoppable,
    ) else {
        return;
    };
    let Ok(decoded2) = decode(&reencoded, enough::Unstoppable) else {
        panic!("re-encoded data failed to decode");
    };

    assert_eq!(decoded.pixels(), decoded2.pixels(), "roundtrip pixel mismatch");
    assert_eq!(decoded.width, decoded2.width);
    assert_eq!(decoded.height, decoded2.height);
    assert_eq!(decoded.color_mode, decoded2.color_mode);
});
