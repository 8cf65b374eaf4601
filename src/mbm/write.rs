//! MBM container writer (single bitmap).

use std::io::{Cursor, Seek, Write};

use super::header::{BitmapHeader, FILE_HEADER_LEN, MbmHeader};
use crate::error::MbmError;
use crate::io::MbmWriter;

/// Write a one-bitmap MBM file to `stream`, starting at offset 0.
///
/// The file header is reserved first and filled in once the trailer offset is
/// known. With `uid3 == None` the header carries UID3 and checksum as zero,
/// matching files produced by the legacy writer; `Some(uid)` writes the UID
/// and its checksum.
///
/// On return the stream is positioned at the end of the file, whose length
/// is returned.
pub fn write_mbm<W: Write + Seek>(
    stream: W,
    bitmap: &BitmapHeader,
    payload: &[u8],
    uid3: Option<u32>,
) -> Result<u64, MbmError> {
    let declared = bitmap.payload_len().map(|len| len as usize);
    if declared != Some(payload.len()) {
        return Err(MbmError::InvalidData(format!(
            "bitmap header declares {declared:?} payload bytes, got {}",
            payload.len()
        )));
    }

    let mut w = MbmWriter::new(stream);
    w.seek(0)?;
    w.write_bytes(&[0u8; FILE_HEADER_LEN as usize])?;

    write_bitmap_header(&mut w, bitmap)?;
    w.write_bytes(payload)?;

    let trailer_offset = u32::try_from(w.tell()?)
        .map_err(|_| MbmError::InvalidData("file exceeds 4 GiB".into()))?;
    w.write_u32(1)?;
    w.write_u32(FILE_HEADER_LEN)?;
    let end = w.tell()?;

    let header = match uid3 {
        Some(uid) => MbmHeader::new(uid, trailer_offset),
        None => MbmHeader::legacy(trailer_offset),
    };
    w.seek(0)?;
    w.write_u32(header.uid1)?;
    w.write_u32(header.uid2)?;
    w.write_u32(header.uid3)?;
    w.write_u32(header.checksum)?;
    w.write_u32(header.trailer_offset)?;
    w.seek(end)?;

    log::debug!(
        "mbm: wrote {end} bytes, payload {} bytes {:?}, trailer at {trailer_offset}",
        payload.len(),
        bitmap.compression
    );
    Ok(end)
}

/// [`write_mbm`] into a fresh buffer.
pub fn write_mbm_to_vec(
    bitmap: &BitmapHeader,
    payload: &[u8],
    uid3: Option<u32>,
) -> Result<Vec<u8>, MbmError> {
    let mut out = Cursor::new(Vec::with_capacity(
        FILE_HEADER_LEN as usize + bitmap.bitmap_size as usize + 8,
    ));
    write_mbm(&mut out, bitmap, payload, uid3)?;
    Ok(out.into_inner())
}

fn write_bitmap_header<W: Write + Seek>(
    w: &mut MbmWriter<W>,
    bitmap: &BitmapHeader,
) -> Result<(), MbmError> {
    w.write_u32(bitmap.bitmap_size)?;
    w.write_u32(bitmap.header_length)?;
    w.write_i32(bitmap.size_in_pixels.width)?;
    w.write_i32(bitmap.size_in_pixels.height)?;
    w.write_i32(bitmap.size_in_twips.width)?;
    w.write_i32(bitmap.size_in_twips.height)?;
    w.write_u32(bitmap.bits_per_pixel)?;
    w.write_u32(bitmap.color_mode.to_u32())?;
    w.write_u32(bitmap.palette_size)?;
    w.write_u32(bitmap.compression.to_u32())
}
