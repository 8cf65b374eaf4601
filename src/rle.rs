//! Run-length codec for 24-bit component triplets.
//!
//! Each record starts with a signed count byte:
//!
//! - `n >= 0`: a run. One triplet follows and is repeated `n + 1` times.
//! - `n < 0`: a literal. `-n` triplets (`-n * 3` bytes) follow verbatim.
//!
//! Runs and literals are both capped at 128 triplets per record.

use std::io::{Read, Write};

use byteorder::ReadBytesExt;
use enough::Stop;

use crate::error::MbmError;

/// Longest run or literal a single record can describe, in triplets.
const MAX_RECORD_TRIPLETS: usize = 128;

/// Check for cancellation every this many records.
const STOP_CHECK_INTERVAL: usize = 1024;

/// Decompress a 24-bit RLE stream into `dst`.
///
/// Records are read until `source_limit` bytes have been consumed or `dst`
/// is full. Counts that would overrun `dst` are clamped to the space left, so
/// corrupt input can never write past the buffer. No bytes beyond
/// `source_limit` are read.
///
/// Returns the number of bytes written. Callers that need strict validation
/// compare it against the expected `stride * height`.
pub fn decompress<R: Read>(
    dst: &mut [u8],
    src: R,
    source_limit: u64,
    stop: &dyn Stop,
) -> Result<usize, MbmError> {
    let mut src = src.take(source_limit);
    let mut written = 0usize;
    let mut records = 0usize;

    while src.limit() > 0 && written < dst.len() {
        if records % STOP_CHECK_INTERVAL == 0 {
            stop.check()?;
        }
        records += 1;

        let count = src.read_i8()?;
        let remaining = dst.len() - written;

        if count >= 0 {
            let mut triplet = [0u8; 3];
            src.read_exact(&mut triplet)?;
            let repeats = (count as usize + 1).min(remaining / 3);
            let end = written + repeats * 3;
            for chunk in dst[written..end].chunks_exact_mut(3) {
                chunk.copy_from_slice(&triplet);
            }
            written = end;
        } else {
            let len = (usize::from(count.unsigned_abs()) * 3).min(remaining);
            src.read_exact(&mut dst[written..written + len])?;
            written += len;
        }
    }

    log::trace!("rle: decoded {records} records into {written} bytes");
    Ok(written)
}

/// Compress `src` (a whole number of triplets) as 24-bit RLE into `dst`.
///
/// Single greedy pass: a triplet that repeats becomes a run; otherwise
/// triplets are gathered into a literal until the source ends or the next two
/// triplets are equal, which starts the next run.
///
/// Returns the number of bytes written.
pub fn compress<W: Write>(src: &[u8], mut dst: W, stop: &dyn Stop) -> Result<usize, MbmError> {
    if src.len() % 3 != 0 {
        return Err(MbmError::InvalidData(format!(
            "24-bit RLE source length {} is not a multiple of 3",
            src.len()
        )));
    }

    let n = src.len() / 3;
    let mut pos = 0usize;
    let mut written = 0usize;
    let mut records = 0usize;

    while pos < n {
        if records % STOP_CHECK_INTERVAL == 0 {
            stop.check()?;
        }
        records += 1;

        let candidate = triplet(src, pos);
        let mut end = pos + 1;
        while end < n && triplet(src, end) == candidate {
            end += 1;
        }
        let pack_count = end - pos - 1;

        if pack_count > 0 {
            written += write_run(&mut dst, candidate, pack_count)?;
            pos = end;
            continue;
        }

        let start = pos;
        let mut end = pos + 1;
        while end < n {
            if end + 1 < n && triplet(src, end) == triplet(src, end + 1) {
                break;
            }
            end += 1;
        }
        written += write_literal(&mut dst, &src[start * 3..end * 3])?;
        pos = end;
    }

    Ok(written)
}

/// [`compress`] into a fresh buffer.
pub fn compress_to_vec(src: &[u8], stop: &dyn Stop) -> Result<Vec<u8>, MbmError> {
    let mut out = Vec::with_capacity(src.len() / 2);
    compress(src, &mut out, stop)?;
    Ok(out)
}

fn triplet(src: &[u8], index: usize) -> &[u8] {
    &src[index * 3..index * 3 + 3]
}

/// Emit `pack_count + 1` copies of `triplet` as run records.
fn write_run<W: Write>(dst: &mut W, triplet: &[u8], mut pack_count: usize) -> Result<usize, MbmError> {
    let mut written = 0;
    while pack_count >= MAX_RECORD_TRIPLETS {
        dst.write_all(&[(MAX_RECORD_TRIPLETS - 1) as u8])?;
        dst.write_all(triplet)?;
        written += 4;
        pack_count -= MAX_RECORD_TRIPLETS;
    }
    dst.write_all(&[pack_count as u8])?;
    dst.write_all(triplet)?;
    Ok(written + 4)
}

/// Emit `bytes` (whole triplets, at least one) as literal records.
fn write_literal<W: Write>(dst: &mut W, mut bytes: &[u8]) -> Result<usize, MbmError> {
    let mut written = 0;
    while bytes.len() / 3 > MAX_RECORD_TRIPLETS {
        let (head, tail) = bytes.split_at(MAX_RECORD_TRIPLETS * 3);
        dst.write_all(&[(MAX_RECORD_TRIPLETS as u8).wrapping_neg()])?;
        dst.write_all(head)?;
        written += 1 + head.len();
        bytes = tail;
    }
    let count = (bytes.len() / 3) as u8;
    dst.write_all(&[count.wrapping_neg()])?;
    dst.write_all(bytes)?;
    Ok(written + 1 + bytes.len())
}
