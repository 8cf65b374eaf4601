//! # zenmbm
//!
//! Symbian MBM (multi-bitmap) container decoder and encoder.
//!
//! An MBM file holds a 20-byte header, one 40-byte header per bitmap
//! followed by its pixel payload, and a trailer listing where each bitmap
//! header lives. Payloads are stored raw or run-length encoded.
//!
//! ## Supported
//!
//! - Parsing any MBM container (up to 150 bitmaps), all header fields
//! - Decoding 8, 16, 24 and 32 bits-per-pixel bitmaps, uncompressed or
//!   24-bit RLE
//! - Encoding single-bitmap files, choosing compression the way the legacy
//!   Symbian tooling does
//! - The 24-bit RLE codec on its own ([`rle`])
//!
//! ## Non-Goals
//!
//! - Sub-byte and palettized depths (1, 2, 4 bpp) for pixel output
//! - RLE variants other than 24-bit; files using them are parsed, but their
//!   pixels are rejected with [`MbmError::UnsupportedVariant`], and the encoder
//!   stores such bitmaps uncompressed instead
//!
//! ## Usage
//!
//! ```
//! use zenmbm::{ColorMode, DecodeRequest, EncodeRequest, Unstoppable};
//!
//! let (width, height) = (100, 100);
//! let stride = zenmbm::mbm::stride(width, 24)?;
//! let rows = vec![0x40u8; stride * height as usize];
//!
//! let file = EncodeRequest::new(24, ColorMode::Color)
//!     .encode(&rows, width, height, Unstoppable)?;
//!
//! let decoded = DecodeRequest::new(&file).decode(Unstoppable)?;
//! assert_eq!(decoded.width, 100);
//! assert_eq!(decoded.pixels(), &rows[..]);
//! # Ok::<(), zenmbm::MbmError>(())
//! ```

#![forbid(unsafe_code)]

mod crc32;
mod error;
mod limits;

pub mod io;
pub mod mbm;
pub mod rle;

mod decode;
mod encode;

#[cfg(feature = "rgb")]
mod pixel;

// Re-exports
pub use decode::{DecodeOutput, DecodeRequest, Permissiveness, decode, decode_image};
pub use encode::{EncodeRequest, MAX_UNCOMPRESSED_PIXELS, choose_compression, encode_image};
pub use enough::{Stop, Unstoppable};
pub use error::MbmError;
pub use limits::Limits;
pub use mbm::{BitmapHeader, ColorMode, Compression, MbmFile, MbmHeader};
