use std::borrow::Cow;

use enough::Stop;

use crate::error::MbmError;
use crate::mbm::{BitmapHeader, ColorMode, Compression, stride, write_mbm_to_vec};
use crate::rle;

/// Bitmaps with at most this many pixels are stored uncompressed.
pub const MAX_UNCOMPRESSED_PIXELS: u64 = 4800;

/// Pick the compression the writer records for a bitmap.
///
/// Small bitmaps are not compressed. Otherwise alpha-bearing modes select
/// [`Compression::ThirtyTwoABitsRle`] and plain colour selects by depth.
/// Only [`Compression::TwentyFourBitsRle`] has an encoder; [`EncodeRequest`]
/// stores other selections uncompressed.
pub fn choose_compression(
    width: u32,
    height: u32,
    bits_per_pixel: u32,
    color_mode: ColorMode,
) -> Result<Compression, MbmError> {
    if u64::from(width) * u64::from(height) <= MAX_UNCOMPRESSED_PIXELS {
        return Ok(Compression::None);
    }

    match color_mode {
        ColorMode::ColorWithAlpha | ColorMode::ColorWithAlphaPreMultiplied => {
            return Ok(Compression::ThirtyTwoABitsRle);
        }
        ColorMode::Color => {}
        other => {
            return Err(MbmError::UnsupportedVariant(format!(
                "cannot choose compression for colour mode {other:?}"
            )));
        }
    }

    match bits_per_pixel {
        32 => Ok(Compression::ThirtyTwoUBitsRle),
        24 => Ok(Compression::TwentyFourBitsRle),
        16 => Ok(Compression::SixteenBitsRle),
        12 => Ok(Compression::TwelveBitsRle),
        8 => Ok(Compression::ByteRle),
        other => Err(MbmError::UnsupportedVariant(format!(
            "unsupported bits per pixel to save: {other}"
        ))),
    }
}

/// Builder for writing a single-bitmap MBM file.
#[derive(Clone, Debug)]
pub struct EncodeRequest {
    bits_per_pixel: u32,
    color_mode: ColorMode,
    uid3: Option<u32>,
}

impl EncodeRequest {
    pub fn new(bits_per_pixel: u32, color_mode: ColorMode) -> Self {
        Self {
            bits_per_pixel,
            color_mode,
            uid3: None,
        }
    }

    /// Write `uid3` and its checksum into the file header.
    ///
    /// Without this the header carries zero for both, as legacy files do.
    pub fn with_uid3(mut self, uid3: u32) -> Self {
        self.uid3 = Some(uid3);
        self
    }

    /// Encode row-major pixel bytes laid out at the MBM stride.
    ///
    /// `pixels` must hold at least `stride(width, bpp) * height` bytes; any
    /// bytes past that are ignored.
    pub fn encode(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        stop: impl Stop,
    ) -> Result<Vec<u8>, MbmError> {
        encode_rows(
            pixels,
            width,
            height,
            self.bits_per_pixel,
            self.color_mode,
            self.uid3,
            &stop,
        )
    }

    /// Pack typed pixels at this request's depth, then encode.
    #[cfg(feature = "rgb")]
    pub fn encode_rgba8(
        &self,
        pixels: &[rgb::RGBA8],
        width: u32,
        height: u32,
        stop: impl Stop,
    ) -> Result<Vec<u8>, MbmError> {
        let rows = crate::pixel::pack_rgba8(pixels, width, height, self.bits_per_pixel)?;
        self.encode(&rows, width, height, stop)
    }

    /// Pack an [`imgref::ImgRef`] at this request's depth, then encode.
    #[cfg(feature = "imgref")]
    pub fn encode_imgref(
        &self,
        img: imgref::ImgRef<'_, rgb::RGBA8>,
        stop: impl Stop,
    ) -> Result<Vec<u8>, MbmError> {
        let too_large = || MbmError::DimensionsTooLarge {
            width: img.width() as u32,
            height: img.height() as u32,
        };
        let width = u32::try_from(img.width()).map_err(|_| too_large())?;
        let height = u32::try_from(img.height()).map_err(|_| too_large())?;
        let pixels: Vec<rgb::RGBA8> = img.rows().flatten().copied().collect();
        self.encode_rgba8(&pixels, width, height, stop)
    }
}

/// Encode one bitmap as an MBM file with legacy header values.
///
/// Bytes of `pixels` past `stride(width, bpp) * height` are ignored.
pub fn encode_image(
    width: u32,
    height: u32,
    bits_per_pixel: u32,
    color_mode: ColorMode,
    pixels: &[u8],
    stop: impl Stop,
) -> Result<Vec<u8>, MbmError> {
    EncodeRequest::new(bits_per_pixel, color_mode).encode(pixels, width, height, stop)
}

fn encode_rows(
    pixels: &[u8],
    width: u32,
    height: u32,
    bits_per_pixel: u32,
    color_mode: ColorMode,
    uid3: Option<u32>,
    stop: &dyn Stop,
) -> Result<Vec<u8>, MbmError> {
    let row_stride = stride(width, bits_per_pixel)?;
    let expected = row_stride
        .checked_mul(height as usize)
        .ok_or(MbmError::DimensionsTooLarge { width, height })?;
    if pixels.len() < expected {
        return Err(MbmError::BufferTooSmall {
            needed: expected,
            actual: pixels.len(),
        });
    }
    let raw = &pixels[..expected];

    stop.check()?;

    let chosen = choose_compression(width, height, bits_per_pixel, color_mode)?;
    let compression = if chosen.is_supported() {
        chosen
    } else {
        log::debug!("mbm: no {chosen:?} encoder, storing {bits_per_pixel}bpp bitmap uncompressed");
        Compression::None
    };

    let payload: Cow<'_, [u8]> = match compression {
        Compression::TwentyFourBitsRle => {
            let packed = rle::compress_to_vec(raw, stop)?;
            #[cfg(debug_assertions)]
            verify_rle(raw, &packed);
            log::debug!("mbm: 24-bit RLE packed {} bytes into {}", raw.len(), packed.len());
            Cow::Owned(packed)
        }
        _ => Cow::Borrowed(raw),
    };

    let bitmap = BitmapHeader::new(
        width,
        height,
        bits_per_pixel,
        color_mode,
        compression,
        payload.len(),
    )?;
    write_mbm_to_vec(&bitmap, &payload, uid3)
}

/// Debug builds re-expand freshly packed data and compare it to the source.
#[cfg(debug_assertions)]
fn verify_rle(raw: &[u8], packed: &[u8]) {
    let mut check = vec![0u8; raw.len()];
    let written = rle::decompress(&mut check, packed, packed.len() as u64, &enough::Unstoppable);
    debug_assert!(
        matches!(written, Ok(n) if n == raw.len()) && check == raw,
        "24-bit RLE output does not expand back to its source"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode;
    use crate::mbm::MbmFile;
    use enough::Unstoppable;

    #[test]
    fn compression_choice() {
        assert_eq!(
            choose_compression(60, 80, 24, ColorMode::Color).unwrap(),
            Compression::None
        );
        assert_eq!(
            choose_compression(100, 100, 24, ColorMode::Color).unwrap(),
            Compression::TwentyFourBitsRle
        );
        assert_eq!(
            choose_compression(100, 100, 32, ColorMode::ColorWithAlpha).unwrap(),
            Compression::ThirtyTwoABitsRle
        );
        assert_eq!(
            choose_compression(100, 100, 24, ColorMode::ColorWithAlphaPreMultiplied).unwrap(),
            Compression::ThirtyTwoABitsRle
        );
        assert_eq!(
            choose_compression(100, 100, 32, ColorMode::Color).unwrap(),
            Compression::ThirtyTwoUBitsRle
        );
        assert_eq!(
            choose_compression(100, 100, 16, ColorMode::Color).unwrap(),
            Compression::SixteenBitsRle
        );
        assert_eq!(
            choose_compression(100, 100, 12, ColorMode::Color).unwrap(),
            Compression::TwelveBitsRle
        );
        assert_eq!(
            choose_compression(100, 100, 8, ColorMode::Color).unwrap(),
            Compression::ByteRle
        );
        assert!(matches!(
            choose_compression(100, 100, 4, ColorMode::Color),
            Err(MbmError::UnsupportedVariant(_))
        ));
        assert!(matches!(
            choose_compression(100, 100, 8, ColorMode::NoColor),
            Err(MbmError::UnsupportedVariant(_))
        ));
        // Below the threshold nothing else is consulted.
        assert_eq!(
            choose_compression(2, 2, 4, ColorMode::NoColor).unwrap(),
            Compression::None
        );
    }

    #[test]
    fn unimplemented_rle_falls_back_to_none() {
        let (w, h) = (100u32, 100u32);
        let pixels = vec![0x11u8; stride(w, 32).unwrap() * h as usize];
        let data = encode_image(w, h, 32, ColorMode::Color, &pixels, Unstoppable).unwrap();
        let file = MbmFile::from_bytes(&data).unwrap();
        assert_eq!(file.bitmap_header(0).unwrap().compression, Compression::None);
        let out = decode(&data, Unstoppable).unwrap();
        assert_eq!(out.pixels(), &pixels[..]);
    }

    #[test]
    fn buffer_too_small() {
        let result = encode_image(4, 4, 24, ColorMode::Color, &[0u8; 47], Unstoppable);
        assert!(matches!(
            result,
            Err(MbmError::BufferTooSmall {
                needed: 48,
                actual: 47
            })
        ));
    }

    #[test]
    fn trailing_bytes_ignored() {
        let mut pixels = vec![7u8; 48];
        pixels.extend_from_slice(&[0xEE; 5]);
        let data = encode_image(4, 4, 24, ColorMode::Color, &pixels, Unstoppable).unwrap();
        let out = decode(&data, Unstoppable).unwrap();
        assert_eq!(out.pixels(), &pixels[..48]);
    }

    #[test]
    fn unsupported_depth_for_stride() {
        let result = encode_image(4, 4, 12, ColorMode::Color, &[0u8; 64], Unstoppable);
        assert!(matches!(result, Err(MbmError::UnsupportedVariant(_))));
    }

    #[test]
    fn uid3_written_with_checksum() {
        let pixels = [0u8; 4];
        let data = EncodeRequest::new(8, ColorMode::NoColor)
            .with_uid3(0x1000_1234)
            .encode(&pixels, 1, 1, Unstoppable)
            .unwrap();
        let file = MbmFile::from_bytes(&data).unwrap();
        assert_eq!(file.header().uid3, 0x1000_1234);
        assert!(file.header().checksum_matches());
    }

    #[test]
    fn twips_recorded() {
        let pixels = vec![0u8; stride(3, 32).unwrap() * 2];
        let data = encode_image(3, 2, 32, ColorMode::Color, &pixels, Unstoppable).unwrap();
        let file = MbmFile::from_bytes(&data).unwrap();
        let h = file.bitmap_header(0).unwrap();
        assert_eq!(h.size_in_twips.width, 45);
        assert_eq!(h.size_in_twips.height, 30);
        assert_eq!(h.header_length, 40);
        assert_eq!(h.palette_size, 0);
    }
}
