use alloc::string::String;
use enough::StopReason;

/// Errors from native bitmap sessions and the reader/writer adapters.
///
/// Format negotiation never produces these; it answers `false` instead.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CodecError {
    #[error("native codec library unavailable: {0}")]
    LibraryUnavailable(String),

    #[error("not implemented: {0}")]
    Unsupported(String),

    #[error("{format} decode failed: {reason}")]
    Decode { format: String, reason: String },

    #[error("{format} encode failed: {reason}")]
    Encode { format: String, reason: String },

    #[error("bitmap session is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: crate::SessionState,
        actual: crate::SessionState,
    },

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("dimensions too large: {width}x{height}")]
    DimensionsTooLarge { width: u32, height: u32 },

    #[error("pixel buffer is {width}x{height}, bitmap is {bitmap_width}x{bitmap_height}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        bitmap_width: u32,
        bitmap_height: u32,
    },

    #[error("buffer too small: need {needed} bytes, got {actual}")]
    BufferTooSmall { needed: usize, actual: usize },

    #[error("pixel layout {0:?} is not supported by this codec")]
    UnsupportedLayout(crate::PixelLayout),

    #[error("pixel layout mismatch: expected {expected:?}, got {actual:?}")]
    LayoutMismatch {
        expected: crate::PixelLayout,
        actual: crate::PixelLayout,
    },

    #[error("request has no input bytes")]
    NoInput,

    #[error("request has no encoded output yet")]
    NoOutput,

    #[error("bitmap handle {0} is not open")]
    UnknownHandle(u64),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation cancelled")]
    Cancelled(StopReason),
}

impl From<StopReason> for CodecError {
    fn from(r: StopReason) -> Self {
        CodecError::Cancelled(r)
    }
}

impl CodecError {
    /// Decode failure for the named format.
    pub fn decode(format: &str, reason: impl Into<String>) -> Self {
        CodecError::Decode {
            format: format.into(),
            reason: reason.into(),
        }
    }

    /// Encode failure for the named format.
    pub fn encode(format: &str, reason: impl Into<String>) -> Self {
        CodecError::Encode {
            format: format.into(),
            reason: reason.into(),
        }
    }
}
