//! Correlation-tagged, length-prefixed framing for RPC traffic.
//!
//! Every frame carries:
//! - A 2-byte magic number ("FD") for stream synchronization
//! - A 1-byte frame kind (request, response, error, abandon)
//! - An 8-byte little-endian correlation id tying replies to requests
//! - A length-prefixed route (`/pkg.Service/Method`) and payload
//!
//! With the `async` feature, [`FrameCodec`] plugs the format into
//! `tokio_util::codec::Framed`.

pub mod codec;
pub mod error;
#[cfg(feature = "async")]
pub mod framed;

pub use codec::{
    decode_frame, encode_frame, Frame, FrameConfig, FrameKind, DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
    MAGIC, MAX_ROUTE_LEN,
};
pub use error::{FrameError, Result};
#[cfg(feature = "async")]
pub use framed::FrameCodec;
