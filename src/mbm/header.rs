//! In-memory model of the MBM header, trailer and per-bitmap headers.

use crate::crc32::crc32;
use crate::error::MbmError;

/// UID1: the direct file store type.
pub const DIRECT_FILE_STORE_UID: u32 = 0x1000_0037;
/// UID2: the multi-bitmap file type.
pub const MULTI_BITMAP_UID: u32 = 0x1000_0042;
/// Largest trailer count accepted on load.
pub const MAX_BITMAP_COUNT: u32 = 150;
/// Size of the file header on disk.
pub const FILE_HEADER_LEN: u32 = 20;
/// Size of a bitmap header on disk.
pub const BITMAP_HEADER_LEN: u32 = 40;
/// Twips per pixel used when writing.
pub const TWIPS_PER_PIXEL: i32 = 15;

/// File header: UIDs, UID checksum and trailer offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MbmHeader {
    pub uid1: u32,
    pub uid2: u32,
    pub uid3: u32,
    pub checksum: u32,
    /// Absolute offset of the trailer.
    pub trailer_offset: u32,
}

impl MbmHeader {
    /// Header for `uid3` with a freshly computed UID checksum.
    pub fn new(uid3: u32, trailer_offset: u32) -> Self {
        Self {
            uid1: DIRECT_FILE_STORE_UID,
            uid2: MULTI_BITMAP_UID,
            uid3,
            checksum: Self::uid_checksum(uid3),
            trailer_offset,
        }
    }

    /// Header as the legacy writer emits it: UID3 and checksum both zero.
    pub fn legacy(trailer_offset: u32) -> Self {
        Self {
            uid1: DIRECT_FILE_STORE_UID,
            uid2: MULTI_BITMAP_UID,
            uid3: 0,
            checksum: 0,
            trailer_offset,
        }
    }

    /// CRC-32 over the fixed 12-byte UID pattern.
    ///
    /// Only the marker bytes of UID1 and UID2 are placed in the buffer, and
    /// UID3 goes in big-endian. The layout is identical on every host.
    pub fn uid_checksum(uid3: u32) -> u32 {
        let mut buf = [0u8; 12];
        buf[0] = 0x10;
        buf[3] = 0x37;
        buf[4] = 0x10;
        buf[7] = 0x42;
        buf[8..12].copy_from_slice(&uid3.to_be_bytes());
        crc32(&buf)
    }

    /// Whether the stored checksum matches the one computed from UID3.
    pub fn checksum_matches(&self) -> bool {
        self.checksum == Self::uid_checksum(self.uid3)
    }
}

/// Width and height pair as stored on disk (signed 32-bit).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

/// Colour summary of a bitmap.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorMode {
    /// Monochrome or grayscale.
    NoColor,
    Color,
    ColorWithAlpha,
    ColorWithAlphaPreMultiplied,
    Undefined,
}

impl ColorMode {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::NoColor),
            1 => Some(Self::Color),
            2 => Some(Self::ColorWithAlpha),
            3 => Some(Self::ColorWithAlphaPreMultiplied),
            8 => Some(Self::Undefined),
            _ => None,
        }
    }

    pub fn to_u32(self) -> u32 {
        match self {
            Self::NoColor => 0,
            Self::Color => 1,
            Self::ColorWithAlpha => 2,
            Self::ColorWithAlphaPreMultiplied => 3,
            Self::Undefined => 8,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, Self::ColorWithAlpha | Self::ColorWithAlphaPreMultiplied)
    }
}

/// Pixel payload compression.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    None,
    ByteRle,
    TwelveBitsRle,
    SixteenBitsRle,
    TwentyFourBitsRle,
    ThirtyTwoUBitsRle,
    ThirtyTwoABitsRle,
}

impl Compression {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::ByteRle),
            2 => Some(Self::TwelveBitsRle),
            3 => Some(Self::SixteenBitsRle),
            4 => Some(Self::TwentyFourBitsRle),
            5 => Some(Self::ThirtyTwoUBitsRle),
            6 => Some(Self::ThirtyTwoABitsRle),
            _ => None,
        }
    }

    pub fn to_u32(self) -> u32 {
        match self {
            Self::None => 0,
            Self::ByteRle => 1,
            Self::TwelveBitsRle => 2,
            Self::SixteenBitsRle => 3,
            Self::TwentyFourBitsRle => 4,
            Self::ThirtyTwoUBitsRle => 5,
            Self::ThirtyTwoABitsRle => 6,
        }
    }

    /// Whether this crate carries a codec for the variant.
    pub fn is_supported(self) -> bool {
        matches!(self, Self::None | Self::TwentyFourBitsRle)
    }
}

/// Per-bitmap header, 40 bytes on disk, followed by the pixel payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitmapHeader {
    /// Header plus payload, in bytes.
    pub bitmap_size: u32,
    pub header_length: u32,
    pub size_in_pixels: Size,
    pub size_in_twips: Size,
    pub bits_per_pixel: u32,
    pub color_mode: ColorMode,
    /// Unused for the direct-colour modes; always 0 when written.
    pub palette_size: u32,
    pub compression: Compression,
}

impl BitmapHeader {
    /// Build the header for a payload of `payload_len` bytes.
    pub fn new(
        width: u32,
        height: u32,
        bits_per_pixel: u32,
        color_mode: ColorMode,
        compression: Compression,
        payload_len: usize,
    ) -> Result<Self, MbmError> {
        let too_large = || MbmError::DimensionsTooLarge { width, height };
        let w = i32::try_from(width).map_err(|_| too_large())?;
        let h = i32::try_from(height).map_err(|_| too_large())?;
        let tw = w.checked_mul(TWIPS_PER_PIXEL).ok_or_else(too_large)?;
        let th = h.checked_mul(TWIPS_PER_PIXEL).ok_or_else(too_large)?;
        let bitmap_size = u32::try_from(payload_len)
            .ok()
            .and_then(|len| len.checked_add(BITMAP_HEADER_LEN))
            .ok_or_else(too_large)?;

        Ok(Self {
            bitmap_size,
            header_length: BITMAP_HEADER_LEN,
            size_in_pixels: Size {
                width: w,
                height: h,
            },
            size_in_twips: Size {
                width: tw,
                height: th,
            },
            bits_per_pixel,
            color_mode,
            palette_size: 0,
            compression,
        })
    }

    /// Payload length declared by the header, if the sizes are consistent.
    pub fn payload_len(&self) -> Option<u32> {
        self.bitmap_size.checked_sub(self.header_length)
    }

    /// Pixel width; negative widths are rejected at parse time.
    pub fn width(&self) -> u32 {
        self.size_in_pixels.width.unsigned_abs()
    }

    /// Pixel height; negative heights are rejected at parse time.
    pub fn height(&self) -> u32 {
        self.size_in_pixels.height.unsigned_abs()
    }

    /// Bytes per row for this bitmap.
    pub fn stride(&self) -> Result<usize, MbmError> {
        stride(self.width(), self.bits_per_pixel)
    }

    /// Bytes of decompressed pixel data (`stride * height`).
    pub fn decompressed_len(&self) -> Result<usize, MbmError> {
        self.stride()?
            .checked_mul(self.height() as usize)
            .ok_or(MbmError::DimensionsTooLarge {
                width: self.width(),
                height: self.height(),
            })
    }
}

/// Bytes per scanline, rounded to whole 32-bit words.
///
/// The 24-bit case rounds to a multiple of three words (four pixels) before
/// converting to bytes.
pub fn stride(width: u32, bits_per_pixel: u32) -> Result<usize, MbmError> {
    let w = u64::from(width);
    let words = match bits_per_pixel {
        1 => w.div_ceil(32),
        2 => w.div_ceil(16),
        4 => w.div_ceil(8),
        8 => w.div_ceil(4),
        16 => w.div_ceil(2),
        24 => (w * 3 + 11) / 12 * 3,
        32 => w,
        other => {
            return Err(MbmError::UnsupportedVariant(format!(
                "unsupported bits per pixel for stride: {other}"
            )));
        }
    };
    usize::try_from(words * 4).map_err(|_| MbmError::DimensionsTooLarge { width, height: 1 })
}
