use std::borrow::Cow;

use enough::Stop;

use crate::error::MbmError;
use crate::limits::Limits;
use crate::mbm::{BITMAP_HEADER_LEN, ColorMode, Compression, MbmFile};
use crate::rle;

/// Controls how strictly the decoder validates input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Permissiveness {
    /// Additionally reject: a UID checksum that does not match UID3, a
    /// bitmap header length other than 40, an uncompressed payload whose
    /// size differs from `stride * height`, and RLE data that does not fill
    /// the bitmap.
    Strict,

    /// Default behavior, accepting what the legacy reader accepts. The UID
    /// checksum is not verified and short RLE data leaves the remaining rows
    /// zeroed.
    #[default]
    Standard,
}

/// Decoded bitmap rows. Uncompressed payloads are borrowed from the input.
///
/// Rows are `stride` bytes apart; each row holds `width * bits_per_pixel / 8`
/// pixel bytes followed by padding.
#[derive(Clone, Debug)]
pub struct DecodeOutput<'a> {
    pixels: Cow<'a, [u8]>,
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub bits_per_pixel: u32,
    pub color_mode: ColorMode,
    /// Compression of the payload this output was decoded from.
    pub compression: Compression,
}

impl<'a> DecodeOutput<'a> {
    /// Row-major pixel data, `stride * height` bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Take ownership of the pixel data (copies if borrowed).
    pub fn into_owned(self) -> DecodeOutput<'static> {
        DecodeOutput {
            pixels: Cow::Owned(self.pixels.into_owned()),
            width: self.width,
            height: self.height,
            stride: self.stride,
            bits_per_pixel: self.bits_per_pixel,
            color_mode: self.color_mode,
            compression: self.compression,
        }
    }

    /// Whether the pixel data is borrowed (zero-copy from input).
    pub fn is_borrowed(&self) -> bool {
        matches!(self.pixels, Cow::Borrowed(_))
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.bits_per_pixel as usize / 8
    }

    /// Pixel bytes of row `y`, without the stride padding.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.stride;
        let len = self.width as usize * self.bytes_per_pixel();
        self.pixels.get(start..start + len)
    }
}

/// Builder for decoding one bitmap of an MBM file.
#[derive(Clone, Debug)]
pub struct DecodeRequest<'a> {
    data: &'a [u8],
    index: usize,
    limits: Option<&'a Limits>,
    permissiveness: Permissiveness,
}

impl<'a> DecodeRequest<'a> {
    /// Decode the first bitmap of `data` with default settings.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            index: 0,
            limits: None,
            permissiveness: Permissiveness::default(),
        }
    }

    /// Select which bitmap to decode (trailer order).
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn with_limits(mut self, limits: &'a Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn with_permissiveness(mut self, permissiveness: Permissiveness) -> Self {
        self.permissiveness = permissiveness;
        self
    }

    pub fn decode(self, stop: impl Stop) -> Result<DecodeOutput<'a>, MbmError> {
        let file = MbmFile::from_bytes(self.data)?;
        decode_bitmap(
            &file,
            self.index,
            self.data,
            self.limits,
            self.permissiveness,
            &stop,
        )
    }
}

/// Decode the first bitmap of an MBM file.
pub fn decode(data: &[u8], stop: impl Stop) -> Result<DecodeOutput<'_>, MbmError> {
    DecodeRequest::new(data).decode(stop)
}

/// Decode bitmap `index` of an already parsed file.
///
/// `data` must be the bytes `file` was parsed from.
pub fn decode_image<'a>(
    file: &MbmFile,
    index: usize,
    data: &'a [u8],
    stop: impl Stop,
) -> Result<DecodeOutput<'a>, MbmError> {
    decode_bitmap(file, index, data, None, Permissiveness::Standard, &stop)
}

fn decode_bitmap<'a>(
    file: &MbmFile,
    index: usize,
    data: &'a [u8],
    limits: Option<&Limits>,
    permissiveness: Permissiveness,
    stop: &dyn Stop,
) -> Result<DecodeOutput<'a>, MbmError> {
    let header = file
        .bitmap_header(index)
        .ok_or(MbmError::IndexOutOfRange {
            index,
            count: file.bitmap_count(),
        })?;
    let strict = permissiveness == Permissiveness::Strict;

    if strict {
        let file_header = file.header();
        if !file_header.checksum_matches() {
            return Err(MbmError::InvalidHeader(format!(
                "uid checksum {:#010x} does not match uid3 {:#010x}",
                file_header.checksum, file_header.uid3
            )));
        }
        if header.header_length != BITMAP_HEADER_LEN {
            return Err(MbmError::InvalidHeader(format!(
                "bitmap header length {} (expected {BITMAP_HEADER_LEN})",
                header.header_length
            )));
        }
    }

    let bits_per_pixel = header.bits_per_pixel;
    if !matches!(bits_per_pixel, 8 | 16 | 24 | 32) {
        return Err(MbmError::UnsupportedVariant(format!(
            "{bits_per_pixel} bits per pixel cannot be unpacked to whole bytes"
        )));
    }

    let (width, height) = (header.width(), header.height());
    if let Some(limits) = limits {
        limits.check(width, height)?;
    }
    let stride = header.stride()?;
    let expected = header.decompressed_len()?;
    if let Some(limits) = limits {
        limits.check_memory(expected)?;
    }

    let payload = data
        .get(file.payload_range(index)?)
        .ok_or(MbmError::UnexpectedEof)?;
    log::debug!(
        "mbm: decoding bitmap {index}: {width}x{height} {bits_per_pixel}bpp {:?}, {} payload bytes",
        header.compression,
        payload.len()
    );
    stop.check()?;

    let pixels = match header.compression {
        Compression::None => {
            if payload.len() < expected || (strict && payload.len() != expected) {
                return Err(MbmError::InvalidData(format!(
                    "uncompressed payload is {} bytes, bitmap needs {expected}",
                    payload.len()
                )));
            }
            Cow::Borrowed(&payload[..expected])
        }
        Compression::TwentyFourBitsRle => {
            let mut buf = Vec::new();
            if buf.try_reserve_exact(expected).is_err() {
                return Err(MbmError::LimitExceeded(format!(
                    "cannot allocate {expected} bytes for a {width}x{height} bitmap"
                )));
            }
            buf.resize(expected, 0);
            let written = rle::decompress(&mut buf, payload, payload.len() as u64, stop)?;
            if written != expected {
                if strict {
                    return Err(MbmError::InvalidData(format!(
                        "RLE data filled {written} of {expected} bytes"
                    )));
                }
                log::debug!("mbm: RLE data filled {written} of {expected} bytes");
            }
            Cow::Owned(buf)
        }
        other => {
            return Err(MbmError::UnsupportedVariant(format!(
                "no decoder for {other:?} compression"
            )));
        }
    };

    Ok(DecodeOutput {
        pixels,
        width,
        height,
        stride,
        bits_per_pixel,
        color_mode: header.color_mode,
        compression: header.compression,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mbm::{BitmapHeader, write_mbm_to_vec};
    use enough::{StopReason, Unstoppable};

    struct AlreadyCancelled;

    impl Stop for AlreadyCancelled {
        fn check(&self) -> Result<(), StopReason> {
            Err(StopReason::Cancelled)
        }
    }

    fn file_with(bitmap: &BitmapHeader, payload: &[u8], uid3: Option<u32>) -> Vec<u8> {
        write_mbm_to_vec(bitmap, payload, uid3).unwrap()
    }

    #[test]
    fn uncompressed_is_borrowed() {
        let payload: Vec<u8> = (0..24).collect();
        let h = BitmapHeader::new(2, 2, 24, ColorMode::Color, Compression::None, 24).unwrap();
        let data = file_with(&h, &payload, None);
        let out = decode(&data, Unstoppable).unwrap();
        assert!(out.is_borrowed());
        assert_eq!(out.pixels(), &payload[..]);
        assert_eq!(out.stride, 12);
        assert_eq!(out.row(1), Some(&payload[12..18]));
        assert_eq!(out.row(2), None);
        assert!(!out.into_owned().is_borrowed());
    }

    #[test]
    fn rle_payload_decodes() {
        // 4x1 at 24bpp: stride 12, one run of four triplets.
        let payload = [3u8, 9, 8, 7];
        let h = BitmapHeader::new(4, 1, 24, ColorMode::Color, Compression::TwentyFourBitsRle, 4)
            .unwrap();
        let data = file_with(&h, &payload, None);
        let out = decode(&data, Unstoppable).unwrap();
        assert!(!out.is_borrowed());
        assert_eq!(out.pixels(), &[9u8, 8, 7].repeat(4)[..]);
    }

    #[test]
    fn short_rle_standard_vs_strict() {
        let payload = [0u8, 9, 8, 7];
        let h = BitmapHeader::new(4, 1, 24, ColorMode::Color, Compression::TwentyFourBitsRle, 4)
            .unwrap();
        let data = file_with(&h, &payload, Some(0x1000_0001));
        let out = decode(&data, Unstoppable).unwrap();
        assert_eq!(&out.pixels()[..3], &[9, 8, 7]);
        assert_eq!(&out.pixels()[3..], &[0u8; 9]);

        let strict = DecodeRequest::new(&data)
            .with_permissiveness(Permissiveness::Strict)
            .decode(Unstoppable);
        assert!(matches!(strict, Err(MbmError::InvalidData(_))));
    }

    #[test]
    fn strict_checks_checksum() {
        let h = BitmapHeader::new(1, 1, 8, ColorMode::NoColor, Compression::None, 4).unwrap();
        let legacy = file_with(&h, &[1, 2, 3, 4], None);
        assert!(decode(&legacy, Unstoppable).is_ok());
        let strict = DecodeRequest::new(&legacy)
            .with_permissiveness(Permissiveness::Strict)
            .decode(Unstoppable);
        assert!(matches!(strict, Err(MbmError::InvalidHeader(_))));

        let stamped = file_with(&h, &[1, 2, 3, 4], Some(0x1000_ABCD));
        let out = DecodeRequest::new(&stamped)
            .with_permissiveness(Permissiveness::Strict)
            .decode(Unstoppable)
            .unwrap();
        assert_eq!(out.pixels(), &[1, 2, 3, 4]);
    }

    #[test]
    fn other_rle_variants_unsupported() {
        let h = BitmapHeader::new(2, 1, 32, ColorMode::Color, Compression::ThirtyTwoUBitsRle, 4)
            .unwrap();
        let data = file_with(&h, &[0, 1, 2, 3], None);
        assert!(matches!(
            decode(&data, Unstoppable),
            Err(MbmError::UnsupportedVariant(_))
        ));
    }

    #[test]
    fn sub_byte_depths_unsupported() {
        let h = BitmapHeader::new(8, 1, 1, ColorMode::NoColor, Compression::None, 4).unwrap();
        let data = file_with(&h, &[0xAA; 4], None);
        assert!(matches!(
            decode(&data, Unstoppable),
            Err(MbmError::UnsupportedVariant(_))
        ));
    }

    #[test]
    fn short_uncompressed_payload() {
        let h = BitmapHeader::new(2, 2, 32, ColorMode::Color, Compression::None, 8).unwrap();
        let data = file_with(&h, &[0u8; 8], None);
        assert!(matches!(
            decode(&data, Unstoppable),
            Err(MbmError::InvalidData(_))
        ));
    }

    #[test]
    fn huge_rle_bitmap_is_an_error() {
        // i32::MAX x i32::MAX at 32bpp, 24-bit RLE, one 4-byte record.
        let mut data = Vec::new();
        for v in [
            0x1000_0037u32,
            0x1000_0042,
            0,
            0,
            64,
            44,
            40,
            i32::MAX as u32,
            i32::MAX as u32,
            0,
            0,
            32,
            1,
            0,
            4,
            0,
            1,
            20,
        ] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(data.len(), 72);
        assert!(matches!(
            decode(&data, Unstoppable),
            Err(MbmError::LimitExceeded(_) | MbmError::DimensionsTooLarge { .. })
        ));
    }

    #[test]
    fn cancelled_decode_and_encode() {
        let rows = vec![0x42u8; crate::mbm::stride(100, 24).unwrap() * 100];
        let data = crate::encode::encode_image(100, 100, 24, ColorMode::Color, &rows, Unstoppable)
            .unwrap();
        assert!(matches!(
            decode(&data, AlreadyCancelled),
            Err(MbmError::Cancelled(StopReason::Cancelled))
        ));
        assert!(matches!(
            crate::encode::encode_image(100, 100, 24, ColorMode::Color, &rows, AlreadyCancelled),
            Err(MbmError::Cancelled(_))
        ));
    }

    #[test]
    fn index_out_of_range() {
        let h = BitmapHeader::new(1, 1, 32, ColorMode::Color, Compression::None, 4).unwrap();
        let data = file_with(&h, &[0u8; 4], None);
        let result = DecodeRequest::new(&data).with_index(1).decode(Unstoppable);
        assert!(matches!(
            result,
            Err(MbmError::IndexOutOfRange { index: 1, count: 1 })
        ));
    }

    #[test]
    fn limits_reject_large() {
        let h = BitmapHeader::new(2, 1, 32, ColorMode::Color, Compression::None, 8).unwrap();
        let data = file_with(&h, &[0u8; 8], None);
        let limits = Limits {
            max_pixels: Some(1),
            ..Default::default()
        };
        let result = DecodeRequest::new(&data)
            .with_limits(&limits)
            .decode(Unstoppable);
        assert!(matches!(result, Err(MbmError::LimitExceeded(_))));

        let limits = Limits {
            max_memory_bytes: Some(7),
            ..Default::default()
        };
        let result = DecodeRequest::new(&data)
            .with_limits(&limits)
            .decode(Unstoppable);
        assert!(matches!(result, Err(MbmError::LimitExceeded(_))));
    }

    #[test]
    fn decode_image_on_parsed_file() {
        let h = BitmapHeader::new(1, 2, 16, ColorMode::Color, Compression::None, 8).unwrap();
        let data = file_with(&h, &[1, 2, 0, 0, 3, 4, 0, 0], None);
        let file = MbmFile::from_bytes(&data).unwrap();
        let out = decode_image(&file, 0, &data, Unstoppable).unwrap();
        assert_eq!(out.stride, 4);
        assert_eq!(out.row(0), Some(&[1u8, 2][..]));
        assert_eq!(out.row(1), Some(&[3u8, 4][..]));
    }
}
