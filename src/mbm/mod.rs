//! MBM container: header, trailer and per-bitmap headers.
//!
//! Layout (all words little-endian):
//!
//! ```text
//! 0                 file header: uid1 uid2 uid3 checksum trailer_offset
//! trailer_offset    trailer: count, then `count` bitmap header offsets
//! offset[i]         bitmap header (40 bytes), then the pixel payload
//! ```

mod header;
mod read;
mod write;

pub use header::{
    BITMAP_HEADER_LEN, BitmapHeader, ColorMode, Compression, DIRECT_FILE_STORE_UID,
    FILE_HEADER_LEN, MAX_BITMAP_COUNT, MULTI_BITMAP_UID, MbmHeader, Size, TWIPS_PER_PIXEL,
    stride,
};
pub use write::{write_mbm, write_mbm_to_vec};

use core::ops::Range;

use crate::error::MbmError;

/// A parsed multi-bitmap file: header, trailer and every bitmap header.
///
/// Pixel payloads are not loaded; see [`crate::decode_image`].
#[derive(Clone, Debug)]
pub struct MbmFile {
    header: MbmHeader,
    trailer: Vec<u32>,
    bitmap_headers: Vec<BitmapHeader>,
}

impl MbmFile {
    pub fn header(&self) -> &MbmHeader {
        &self.header
    }

    /// Number of bitmaps listed in the trailer.
    pub fn bitmap_count(&self) -> usize {
        self.bitmap_headers.len()
    }

    pub fn bitmap_header(&self, index: usize) -> Option<&BitmapHeader> {
        self.bitmap_headers.get(index)
    }

    /// Absolute offset of the bitmap header at `index`.
    pub fn bitmap_header_offset(&self, index: usize) -> Option<u32> {
        self.trailer.get(index).copied()
    }

    pub fn bitmap_headers(&self) -> &[BitmapHeader] {
        &self.bitmap_headers
    }

    /// Trailer offsets, in bitmap order.
    pub fn trailer(&self) -> &[u32] {
        &self.trailer
    }

    /// Byte range of the payload of bitmap `index` within the file.
    pub(crate) fn payload_range(&self, index: usize) -> Result<Range<usize>, MbmError> {
        let (Some(header), Some(offset)) =
            (self.bitmap_header(index), self.bitmap_header_offset(index))
        else {
            return Err(MbmError::IndexOutOfRange {
                index,
                count: self.bitmap_count(),
            });
        };
        let payload_len = header.payload_len().ok_or_else(|| {
            MbmError::InvalidHeader(format!(
                "bitmap size {} is smaller than header length {}",
                header.bitmap_size, header.header_length
            ))
        })?;
        let start = u64::from(offset) + u64::from(header.header_length);
        let end = start + u64::from(payload_len);
        let start = usize::try_from(start).map_err(|_| MbmError::UnexpectedEof)?;
        let end = usize::try_from(end).map_err(|_| MbmError::UnexpectedEof)?;
        Ok(start..end)
    }
}
