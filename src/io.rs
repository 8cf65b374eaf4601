//! Little-endian primitive I/O over seekable streams.
//!
//! MBM stores every field as a 32-bit little-endian word. The reader and
//! writer here go through `byteorder`, so the host byte order never leaks
//! into the on-disk representation.

use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::MbmError;

/// Reads MBM words from a seekable stream.
///
/// Positions are absolute byte offsets from the start of the stream.
pub struct MbmReader<R> {
    inner: R,
    len: u64,
}

impl<R: Read + Seek> MbmReader<R> {
    /// Wrap a stream. The current position is preserved.
    pub fn new(mut inner: R) -> Result<Self, MbmError> {
        let pos = inner.stream_position()?;
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(pos))?;
        Ok(Self { inner, len })
    }

    /// Total stream length in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn tell(&mut self) -> Result<u64, MbmError> {
        Ok(self.inner.stream_position()?)
    }

    /// Move to an absolute offset and return the new position.
    ///
    /// Offsets beyond the end of the stream are rejected; every offset in an
    /// MBM file points at data that must exist.
    pub fn seek(&mut self, offset: u64) -> Result<u64, MbmError> {
        if offset > self.len {
            return Err(MbmError::InvalidHeader(format!(
                "offset {offset} lies beyond the {}-byte stream",
                self.len
            )));
        }
        Ok(self.inner.seek(SeekFrom::Start(offset))?)
    }

    pub fn read_u32(&mut self) -> Result<u32, MbmError> {
        Ok(self.inner.read_u32::<LittleEndian>()?)
    }

    pub fn read_i32(&mut self) -> Result<i32, MbmError> {
        Ok(self.inner.read_i32::<LittleEndian>()?)
    }

    /// Run `f` at `offset`, then return to the position held before the call.
    ///
    /// The position is restored whether `f` succeeds or fails. A failure from
    /// `f` takes precedence over a failure to restore.
    pub fn detour<T>(
        &mut self,
        offset: u64,
        f: impl FnOnce(&mut Self) -> Result<T, MbmError>,
    ) -> Result<T, MbmError> {
        let saved = self.tell()?;
        let result = self.seek(offset).and_then(|_| f(self));
        let restored = self.inner.seek(SeekFrom::Start(saved));
        let value = result?;
        restored?;
        Ok(value)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Writes MBM words to a seekable stream.
pub struct MbmWriter<W> {
    inner: W,
}

impl<W: Write + Seek> MbmWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn tell(&mut self) -> Result<u64, MbmError> {
        Ok(self.inner.stream_position()?)
    }

    /// Move to an absolute offset and return the new position.
    pub fn seek(&mut self, offset: u64) -> Result<u64, MbmError> {
        Ok(self.inner.seek(SeekFrom::Start(offset))?)
    }

    /// Move to the end of the stream and return the new position.
    pub fn seek_end(&mut self) -> Result<u64, MbmError> {
        Ok(self.inner.seek(SeekFrom::End(0))?)
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), MbmError> {
        Ok(self.inner.write_u32::<LittleEndian>(value)?)
    }

    pub fn write_i32(&mut self, value: i32) -> Result<(), MbmError> {
        Ok(self.inner.write_i32::<LittleEndian>(value)?)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), MbmError> {
        Ok(self.inner.write_all(bytes)?)
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
