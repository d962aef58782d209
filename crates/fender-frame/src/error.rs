/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame header contains an invalid magic number.
    #[error("invalid frame magic (expected 0x4644 \"FD\")")]
    InvalidMagic,

    /// The frame kind byte is not one this version understands.
    #[error("unknown frame kind {0:#04x}")]
    UnknownKind(u8),

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The route does not fit the 2-byte length prefix.
    #[error("route too long ({len} bytes, max {max})")]
    RouteTooLong { len: usize, max: usize },

    /// The route bytes are not valid UTF-8.
    #[error("route is not valid UTF-8")]
    InvalidRoute,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
