//! Conversions between MBM rows and typed `RGBA8` pixels.
//!
//! Each pixel's bytes map in order onto R, G, B, A: 8bpp carries R only,
//! 16bpp R and G, 24bpp R, G and B, 32bpp all four. Missing colour channels
//! read as 0 and a missing alpha as 255.

use rgb::RGBA8;

use crate::decode::DecodeOutput;
use crate::error::MbmError;
use crate::mbm::stride;

fn bytes_per_pixel(bits_per_pixel: u32) -> Result<usize, MbmError> {
    match bits_per_pixel {
        8 | 16 | 24 | 32 => Ok(bits_per_pixel as usize / 8),
        other => Err(MbmError::UnsupportedVariant(format!(
            "cannot convert {other} bits per pixel to RGBA8"
        ))),
    }
}

impl DecodeOutput<'_> {
    /// Expand the rows to one `RGBA8` per pixel, dropping stride padding.
    pub fn to_rgba8(&self) -> Result<Vec<RGBA8>, MbmError> {
        let bpp = bytes_per_pixel(self.bits_per_pixel)?;
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize);
        for y in 0..self.height {
            let row = self.row(y).ok_or(MbmError::UnexpectedEof)?;
            out.extend(row.chunks_exact(bpp).map(|px| RGBA8 {
                r: px[0],
                g: px.get(1).copied().unwrap_or(0),
                b: px.get(2).copied().unwrap_or(0),
                a: px.get(3).copied().unwrap_or(255),
            }));
        }
        Ok(out)
    }

    /// Convert to an [`imgref::ImgVec`] of `RGBA8`.
    #[cfg(feature = "imgref")]
    pub fn to_imgvec(&self) -> Result<imgref::ImgVec<RGBA8>, MbmError> {
        Ok(imgref::ImgVec::new(
            self.to_rgba8()?,
            self.width as usize,
            self.height as usize,
        ))
    }
}

/// Pack `RGBA8` pixels into rows at the MBM stride, padding with `0xFF`.
pub(crate) fn pack_rgba8(
    pixels: &[RGBA8],
    width: u32,
    height: u32,
    bits_per_pixel: u32,
) -> Result<Vec<u8>, MbmError> {
    let bpp = bytes_per_pixel(bits_per_pixel)?;
    let w = width as usize;
    let row_stride = stride(width, bits_per_pixel)?;
    let needed = w
        .checked_mul(height as usize)
        .ok_or(MbmError::DimensionsTooLarge { width, height })?;
    if pixels.len() < needed {
        return Err(MbmError::BufferTooSmall {
            needed,
            actual: pixels.len(),
        });
    }
    let total = row_stride
        .checked_mul(height as usize)
        .ok_or(MbmError::DimensionsTooLarge { width, height })?;

    let mut out = vec![0xFFu8; total];
    if w == 0 {
        return Ok(out);
    }
    for (src_row, dst_row) in pixels[..needed]
        .chunks_exact(w)
        .zip(out.chunks_exact_mut(row_stride))
    {
        for (px, dst) in src_row.iter().zip(dst_row.chunks_exact_mut(bpp)) {
            let channels = [px.r, px.g, px.b, px.a];
            dst.copy_from_slice(&channels[..bpp]);
        }
    }
    Ok(out)
}
