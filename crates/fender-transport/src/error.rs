use std::path::PathBuf;

/// Errors that can occur while moving calls over a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the specified address.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame could not be encoded or decoded.
    #[error("framing error: {0}")]
    Frame(#[from] fender_frame::FrameError),

    /// The connection dropped while calls were outstanding.
    #[error("peer disconnected: {0}")]
    Disconnected(String),

    /// The peer answered the call with an error reply.
    #[error("remote error: {0}")]
    Remote(String),

    /// Another sink already receives this transport's replies.
    #[error("a response sink is already attached")]
    AlreadyAttached,

    /// The transport has been shut down.
    #[error("transport shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, TransportError>;
