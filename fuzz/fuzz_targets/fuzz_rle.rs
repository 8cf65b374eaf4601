#![no_main]
use libfuzzer_sys::fuzz_target;
use zenmbm::rle;

fuzz_target!(|data: &[u8]| {
    // Arbitrary input as a packed stream: bounded output, no panics
    let mut out = vec![0u8; data.len().saturating_mul(4)];
    if let Ok(written) = rle::decompress(&mut out, data, data.len() as u64, &enough::Unstoppable) {
        assert!(written <= out.len());
    }

    // Arbitrary input as pixels: must expand back exactly
    let src = &data[..data.len() - data.len() % 3];
    let packed = rle::compress_to_vec(src, &enough::Unstoppable).expect("whole triplets");
    let mut back = vec![0u8; src.len()];
    let written = rle::decompress(&mut back, &packed[..], packed.len() as u64, &enough::Unstoppable)
        .expect("own output decodes");
    assert_eq!(written, src.len());
    assert_eq!(back, src, "rle roundtrip mismatch");
});
