//! MBM container parser.

use std::io::{Cursor, Read, Seek};

use super::MbmFile;
use super::header::{
    BitmapHeader, ColorMode, Compression, DIRECT_FILE_STORE_UID, MAX_BITMAP_COUNT,
    MULTI_BITMAP_UID, MbmHeader, Size,
};
use crate::error::MbmError;
use crate::io::MbmReader;

impl MbmFile {
    /// Parse a multi-bitmap file from `stream`.
    ///
    /// The file header is read at the current position; trailer and bitmap
    /// header offsets are absolute. Each detour to an offset restores the
    /// position afterwards, so the stream is left just past the file header.
    ///
    /// The UID checksum is read but not verified; see
    /// [`MbmHeader::checksum_matches`].
    pub fn read<R: Read + Seek>(stream: R) -> Result<Self, MbmError> {
        let mut reader = MbmReader::new(stream)?;
        let header = read_header(&mut reader)?;
        log::debug!(
            "mbm: uid3 {:#010x}, checksum {:#010x}, trailer at {}",
            header.uid3,
            header.checksum,
            header.trailer_offset
        );

        let trailer = read_trailer(&mut reader, header.trailer_offset)?;
        log::debug!("mbm: {} bitmap(s) in trailer", trailer.len());

        let mut bitmap_headers = Vec::with_capacity(trailer.len());
        for (index, &offset) in trailer.iter().enumerate() {
            let bitmap = read_bitmap_header(&mut reader, offset)?;
            check_payload_bounds(&bitmap, offset, reader.len())?;
            log::trace!(
                "mbm: bitmap {index} at {offset}: {}x{} {}bpp {:?} {:?}",
                bitmap.size_in_pixels.width,
                bitmap.size_in_pixels.height,
                bitmap.bits_per_pixel,
                bitmap.color_mode,
                bitmap.compression
            );
            bitmap_headers.push(bitmap);
        }

        Ok(Self {
            header,
            trailer,
            bitmap_headers,
        })
    }

    /// Parse a multi-bitmap file held in memory.
    pub fn from_bytes(data: &[u8]) -> Result<Self, MbmError> {
        Self::read(Cursor::new(data))
    }
}

fn read_header<R: Read + Seek>(r: &mut MbmReader<R>) -> Result<MbmHeader, MbmError> {
    let uid1 = r.read_u32()?;
    let uid2 = r.read_u32()?;
    let uid3 = r.read_u32()?;

    if uid1 != DIRECT_FILE_STORE_UID || uid2 != MULTI_BITMAP_UID {
        return Err(MbmError::UnrecognizedFormat { uid1, uid2 });
    }

    let checksum = r.read_u32()?;
    let trailer_offset = r.read_u32()?;

    Ok(MbmHeader {
        uid1,
        uid2,
        uid3,
        checksum,
        trailer_offset,
    })
}

fn read_trailer<R: Read + Seek>(r: &mut MbmReader<R>, offset: u32) -> Result<Vec<u32>, MbmError> {
    r.detour(u64::from(offset), |r| {
        let count = r.read_u32()?;
        if count == 0 || count > MAX_BITMAP_COUNT {
            return Err(MbmError::InvalidHeader(format!(
                "bitmap count {count} must be between 1 and {MAX_BITMAP_COUNT}"
            )));
        }
        (0..count).map(|_| r.read_u32()).collect()
    })
}

fn read_bitmap_header<R: Read + Seek>(
    r: &mut MbmReader<R>,
    offset: u32,
) -> Result<BitmapHeader, MbmError> {
    r.detour(u64::from(offset), |r| {
        let bitmap_size = r.read_u32()?;
        let header_length = r.read_u32()?;
        let size_in_pixels = Size {
            width: r.read_i32()?,
            height: r.read_i32()?,
        };
        let size_in_twips = Size {
            width: r.read_i32()?,
            height: r.read_i32()?,
        };
        let bits_per_pixel = r.read_u32()?;
        let color_raw = r.read_u32()?;
        let palette_size = r.read_u32()?;
        let compression_raw = r.read_u32()?;

        let color_mode = ColorMode::from_u32(color_raw).ok_or_else(|| {
            MbmError::InvalidHeader(format!("unknown colour mode {color_raw}"))
        })?;
        let compression = Compression::from_u32(compression_raw).ok_or_else(|| {
            MbmError::InvalidHeader(format!("unknown compression {compression_raw}"))
        })?;

        if size_in_pixels.width < 0 || size_in_pixels.height < 0 {
            return Err(MbmError::InvalidHeader(format!(
                "negative bitmap dimensions {}x{}",
                size_in_pixels.width, size_in_pixels.height
            )));
        }

        Ok(BitmapHeader {
            bitmap_size,
            header_length,
            size_in_pixels,
            size_in_twips,
            bits_per_pixel,
            color_mode,
            palette_size,
            compression,
        })
    })
}

/// The declared header-plus-payload span must lie inside the stream.
fn check_payload_bounds(bitmap: &BitmapHeader, offset: u32, stream_len: u64) -> Result<(), MbmError> {
    if bitmap.payload_len().is_none() {
        return Err(MbmError::InvalidHeader(format!(
            "bitmap size {} is smaller than header length {}",
            bitmap.bitmap_size, bitmap.header_length
        )));
    }
    let end = u64::from(offset) + u64::from(bitmap.bitmap_size);
    if end > stream_len {
        return Err(MbmError::InvalidHeader(format!(
            "bitmap at {offset} declares {} bytes but the stream ends at {stream_len}",
            bitmap.bitmap_size
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mbm::header::{BITMAP_HEADER_LEN, FILE_HEADER_LEN};
    use std::io::{Seek, SeekFrom};

    fn word(out: &mut Vec<u8>, v: u32) {
        out.extend_from_slice(&v.to_le_bytes());
    }

    /// File with a 1x1 24bpp uncompressed bitmap and `count` trailer entries
    /// all pointing at it.
    fn synthetic(count: u32) -> Vec<u8> {
        let mut out = Vec::new();
        let payload_len = 12u32;
        let trailer_offset = FILE_HEADER_LEN + BITMAP_HEADER_LEN + payload_len;
        word(&mut out, DIRECT_FILE_STORE_UID);
        word(&mut out, MULTI_BITMAP_UID);
        word(&mut out, 0x1234);
        word(&mut out, 0);
        word(&mut out, trailer_offset);
        // bitmap header
        word(&mut out, BITMAP_HEADER_LEN + payload_len);
        word(&mut out, BITMAP_HEADER_LEN);
        word(&mut out, 1);
        word(&mut out, 1);
        word(&mut out, 15);
        word(&mut out, 15);
        word(&mut out, 24);
        word(&mut out, 1);
        word(&mut out, 0);
        word(&mut out, 0);
        out.extend_from_slice(&[1, 2, 3, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        word(&mut out, count);
        for _ in 0..count {
            word(&mut out, FILE_HEADER_LEN);
        }
        out
    }

    #[test]
    fn parses_synthetic_file() {
        let file = MbmFile::from_bytes(&synthetic(1)).unwrap();
        assert_eq!(file.header().uid3, 0x1234);
        assert_eq!(file.bitmap_count(), 1);
        assert_eq!(file.bitmap_header_offset(0), Some(FILE_HEADER_LEN));
        let h = file.bitmap_header(0).unwrap();
        assert_eq!(h.size_in_pixels, Size { width: 1, height: 1 });
        assert_eq!(h.size_in_twips, Size { width: 15, height: 15 });
        assert_eq!(h.bits_per_pixel, 24);
        assert_eq!(h.color_mode, ColorMode::Color);
        assert_eq!(h.compression, Compression::None);
        assert_eq!(file.payload_range(0).unwrap(), 60..72);
        assert!(file.bitmap_header(1).is_none());
    }

    #[test]
    fn rejects_bad_uids() {
        let mut data = synthetic(1);
        data[0] = 0x38;
        assert!(matches!(
            MbmFile::from_bytes(&data),
            Err(MbmError::UnrecognizedFormat { uid1: 0x1000_0038, .. })
        ));
        let mut data = synthetic(1);
        data[4] = 0x43;
        assert!(matches!(
            MbmFile::from_bytes(&data),
            Err(MbmError::UnrecognizedFormat { .. })
        ));
    }

    #[test]
    fn trailer_count_bounds() {
        assert!(matches!(
            MbmFile::from_bytes(&synthetic(0)),
            Err(MbmError::InvalidHeader(_))
        ));
        assert!(matches!(
            MbmFile::from_bytes(&synthetic(151)),
            Err(MbmError::InvalidHeader(_))
        ));
        let file = MbmFile::from_bytes(&synthetic(150)).unwrap();
        assert_eq!(file.bitmap_count(), 150);
    }

    #[test]
    fn trailer_offset_past_end() {
        let mut data = synthetic(1);
        let bogus = (data.len() as u32 + 1).to_le_bytes();
        data[16..20].copy_from_slice(&bogus);
        assert!(matches!(
            MbmFile::from_bytes(&data),
            Err(MbmError::InvalidHeader(_))
        ));
    }

    #[test]
    fn bitmap_size_past_end() {
        let mut data = synthetic(1);
        data[20..24].copy_from_slice(&1000u32.to_le_bytes());
        assert!(matches!(
            MbmFile::from_bytes(&data),
            Err(MbmError::InvalidHeader(_))
        ));
    }

    #[test]
    fn unknown_compression_rejected() {
        let mut data = synthetic(1);
        data[56..60].copy_from_slice(&9u32.to_le_bytes());
        assert!(matches!(
            MbmFile::from_bytes(&data),
            Err(MbmError::InvalidHeader(_))
        ));
    }

    #[test]
    fn truncated_header_is_io_error() {
        let data = synthetic(1);
        assert!(matches!(
            MbmFile::from_bytes(&data[..10]),
            Err(MbmError::Io(_))
        ));
    }

    #[test]
    fn stream_left_after_file_header() {
        let data = synthetic(3);
        let mut cursor = Cursor::new(&data[..]);
        MbmFile::read(&mut cursor).unwrap();
        assert_eq!(cursor.stream_position().unwrap(), u64::from(FILE_HEADER_LEN));
        cursor.seek(SeekFrom::Start(0)).unwrap();
        MbmFile::read(&mut cursor).unwrap();
        assert_eq!(cursor.position(), u64::from(FILE_HEADER_LEN));
    }
}
