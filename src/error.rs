use enough::StopReason;

/// Errors from MBM decoding and encoding.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum MbmError {
    /// UID1/UID2 are not the direct-file-store / multi-bitmap magic.
    #[error("unrecognized format: uid1 {uid1:#010x}, uid2 {uid2:#010x}")]
    UnrecognizedFormat { uid1: u32, uid2: u32 },

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("unsupported format variant: {0}")]
    UnsupportedVariant(String),

    #[error("invalid pixel data: {0}")]
    InvalidData(String),

    #[error("dimensions too large: {width}x{height}")]
    DimensionsTooLarge { width: u32, height: u32 },

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("buffer too small: need {needed} bytes, got {actual}")]
    BufferTooSmall { needed: usize, actual: usize },

    #[error("bitmap index {index} out of range (file holds {count})")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation cancelled")]
    Cancelled(StopReason),
}

impl From<StopReason> for MbmError {
    fn from(r: StopReason) -> Self {
        MbmError::Cancelled(r)
    }
}
